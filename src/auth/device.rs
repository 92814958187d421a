//! TOTP device registry.
//!
//! Each user owns at most one device slot. The record is created unconfirmed
//! on the first setup request and flips to confirmed exactly once, when the
//! user proves they scanned the secret by submitting a valid code. It never
//! reverts except through an explicit administrative reset.

use crate::auth::totp::TotpEngine;
use crate::auth::verifier::Identity;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// A user's single TOTP enrollment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpDevice {
    pub user_id: String,
    /// Display label, e.g. "notegate-alice".
    pub label: String,
    /// Base32-encoded 160-bit shared secret.
    pub secret: String,
    pub confirmed: bool,
}

/// Storage for TOTP devices, keyed by user id — one slot per user, not a list.
///
/// `create_if_absent` must be atomic: two concurrent first-setup requests for
/// the same user must resolve to a single stored secret, never a
/// read-then-write race.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find(&self, user_id: &str) -> Result<Option<TotpDevice>>;

    /// Insert `device` unless the user already has one; returns the stored
    /// device and whether this call created it.
    async fn create_if_absent(&self, device: TotpDevice) -> Result<(TotpDevice, bool)>;

    /// Flip the user's device to confirmed. No-op if already confirmed.
    async fn set_confirmed(&self, user_id: &str) -> Result<()>;

    /// Administrative MFA reset: drop the device record entirely.
    async fn delete(&self, user_id: &str) -> Result<()>;
}

/// Enrollment state and code checks for a user's device.
pub struct DeviceRegistry<S> {
    store: S,
    totp: TotpEngine,
}

impl<S: DeviceStore> DeviceRegistry<S> {
    pub fn new(store: S, totp: TotpEngine) -> Self {
        Self { store, totp }
    }

    pub fn totp(&self) -> &TotpEngine {
        &self.totp
    }

    /// The user's device, creating an unconfirmed one with a fresh secret if
    /// none exists.
    ///
    /// Idempotent before confirmation: a second setup request returns the same
    /// secret, so a QR code the user already scanned stays valid. The
    /// candidate secret generated here is discarded if a concurrent call won
    /// the insert.
    pub async fn get_or_create_device(&self, identity: &Identity) -> Result<(TotpDevice, bool)> {
        let candidate = TotpDevice {
            user_id: identity.id.clone(),
            label: format!("{}-{}", self.totp.issuer(), identity.username),
            secret: TotpEngine::generate_secret(),
            confirmed: false,
        };
        self.store.create_if_absent(candidate).await
    }

    pub async fn has_confirmed_device(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .store
            .find(user_id)
            .await?
            .map(|d| d.confirmed)
            .unwrap_or(false))
    }

    /// The enrollment URI for an unconfirmed device.
    pub fn provisioning_uri(&self, device: &TotpDevice, account: &str) -> String {
        self.totp.provisioning_uri(&device.secret, account)
    }

    /// QR rendering of the enrollment URI as a PNG data-URI.
    pub fn qr_code(&self, device: &TotpDevice, account: &str) -> Result<String> {
        self.totp.qr_data_uri(&device.secret, account)
    }

    /// Verify a setup code against the user's unconfirmed device and, on
    /// success, mark it confirmed.
    ///
    /// Returns `NotEnrolled` when no unconfirmed device exists — including
    /// when the device is already confirmed, which keeps the transition
    /// one-way.
    pub async fn confirm_at(
        &self,
        identity: &Identity,
        code: &str,
        now: u64,
    ) -> Result<bool> {
        let device = self
            .store
            .find(&identity.id)
            .await?
            .filter(|d| !d.confirmed)
            .ok_or(Error::NotEnrolled)?;

        if !self
            .totp
            .check_at(&device.secret, code, &identity.username, now)?
        {
            return Ok(false);
        }

        self.store.set_confirmed(&identity.id).await?;
        Ok(true)
    }

    /// Verify a login code against the user's confirmed device. Never mutates.
    ///
    /// A still-valid code can be replayed within its drift window; rejecting
    /// that needs a last-used-step column on the device record.
    pub async fn verify_at(&self, identity: &Identity, code: &str, now: u64) -> Result<bool> {
        let device = self
            .store
            .find(&identity.id)
            .await?
            .filter(|d| d.confirmed)
            .ok_or(Error::NotEnrolled)?;

        self.totp
            .check_at(&device.secret, code, &identity.username, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::totp::TotpConfig;
    use crate::testing::InMemoryDeviceStore;

    fn registry() -> DeviceRegistry<InMemoryDeviceStore> {
        DeviceRegistry::new(
            InMemoryDeviceStore::new(),
            TotpEngine::new(TotpConfig::new("test-app")),
        )
    }

    fn alice() -> Identity {
        Identity {
            id: "1".to_string(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_before_confirmation() {
        let registry = registry();
        let (first, created) = registry.get_or_create_device(&alice()).await.unwrap();
        assert!(created);
        assert!(!first.confirmed);
        assert_eq!(first.label, "test-app-alice");

        let (second, created) = registry.get_or_create_device(&alice()).await.unwrap();
        assert!(!created);
        assert_eq!(first.secret, second.secret);
    }

    #[tokio::test]
    async fn confirm_flips_once_and_never_back() {
        let registry = registry();
        let (device, _) = registry.get_or_create_device(&alice()).await.unwrap();
        let now = 1_700_000_000;

        let code = registry
            .totp()
            .generate_at(&device.secret, "alice", now)
            .unwrap();
        assert!(registry.confirm_at(&alice(), &code, now).await.unwrap());
        assert!(registry.has_confirmed_device("1").await.unwrap());

        // A second confirmation attempt has no unconfirmed device to act on.
        let err = registry.confirm_at(&alice(), &code, now).await.unwrap_err();
        assert!(matches!(err, Error::NotEnrolled));

        // Setup after confirmation returns the confirmed device unchanged.
        let (again, created) = registry.get_or_create_device(&alice()).await.unwrap();
        assert!(!created);
        assert!(again.confirmed);
        assert_eq!(again.secret, device.secret);
    }

    #[tokio::test]
    async fn wrong_setup_code_leaves_device_unconfirmed() {
        let registry = registry();
        registry.get_or_create_device(&alice()).await.unwrap();

        let ok = registry
            .confirm_at(&alice(), "000000", 1_700_000_000)
            .await
            .unwrap();
        assert!(!ok);
        assert!(!registry.has_confirmed_device("1").await.unwrap());
    }

    #[tokio::test]
    async fn verify_requires_confirmed_device() {
        let registry = registry();
        let err = registry
            .verify_at(&alice(), "123456", 1_700_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotEnrolled));

        // An unconfirmed device is not enough either.
        registry.get_or_create_device(&alice()).await.unwrap();
        let err = registry
            .verify_at(&alice(), "123456", 1_700_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotEnrolled));
    }

    #[tokio::test]
    async fn concurrent_first_setup_yields_one_secret() {
        let registry = std::sync::Arc::new(registry());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (device, _) = registry.get_or_create_device(&alice()).await.unwrap();
                device.secret
            }));
        }

        let mut secrets = Vec::new();
        for handle in handles {
            secrets.push(handle.await.unwrap());
        }
        secrets.dedup();
        assert_eq!(secrets.len(), 1, "racing setups must share one secret");
    }
}

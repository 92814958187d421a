//! In-memory store implementations.
//!
//! Used by the test suites and by the dev wiring in `main.rs`. Production
//! deployments implement [`CredentialVerifier`], [`DeviceStore`], and
//! [`NoteStore`] against their real credential store and database.

use crate::auth::device::{DeviceStore, TotpDevice};
use crate::auth::verifier::{CredentialVerifier, Identity};
use crate::error::{Error, Result};
use crate::notes::{Note, NoteStore};
use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use subtle::ConstantTimeEq;

/// In-memory credential store.
///
/// Passwords are kept as salted SHA-256 digests and compared constant-time.
/// This is a stand-in for the external credential store, not a production
/// password hash — real deployments sit behind a proper KDF.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<String, StoredUser>>,
    next_id: AtomicU64,
}

struct StoredUser {
    identity: Identity,
    salt: [u8; 16],
    digest: [u8; 32],
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a user and return their identity.
    pub fn add_user(&self, username: &str, password: &str) -> Identity {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let identity = Identity::new(id.to_string(), username);

        let mut salt = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let user = StoredUser {
            identity: identity.clone(),
            salt,
            digest: digest_password(&salt, password),
        };
        self.users
            .write()
            .unwrap()
            .insert(username.to_string(), user);
        identity
    }
}

fn digest_password(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

#[async_trait]
impl CredentialVerifier for InMemoryCredentialStore {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<Identity>> {
        let users = self.users.read().unwrap();
        let Some(user) = users.get(username) else {
            // Burn a digest anyway so unknown users cost the same as known
            // ones with a wrong password.
            let _ = digest_password(&[0u8; 16], password);
            return Ok(None);
        };

        let candidate = digest_password(&user.salt, password);
        if candidate.ct_eq(&user.digest).into() {
            Ok(Some(user.identity.clone()))
        } else {
            Ok(None)
        }
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Identity>> {
        let users = self.users.read().unwrap();
        Ok(users
            .values()
            .find(|u| u.identity.id == user_id)
            .map(|u| u.identity.clone()))
    }
}

/// In-memory device store. One slot per user id; `create_if_absent` is a
/// single locked entry-API insert, so racing setups cannot store two secrets.
#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: Mutex<HashMap<String, TotpDevice>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn find(&self, user_id: &str) -> Result<Option<TotpDevice>> {
        Ok(self.devices.lock().unwrap().get(user_id).cloned())
    }

    async fn create_if_absent(&self, device: TotpDevice) -> Result<(TotpDevice, bool)> {
        let mut devices = self.devices.lock().unwrap();
        let mut created = false;
        let stored = devices
            .entry(device.user_id.clone())
            .or_insert_with(|| {
                created = true;
                device
            });
        Ok((stored.clone(), created))
    }

    async fn set_confirmed(&self, user_id: &str) -> Result<()> {
        let mut devices = self.devices.lock().unwrap();
        let device = devices
            .get_mut(user_id)
            .ok_or_else(|| Error::not_found("No device for user"))?;
        device.confirmed = true;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.devices.lock().unwrap().remove(user_id);
        Ok(())
    }
}

/// In-memory note record store.
#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: RwLock<Vec<Note>>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn insert(&self, note: Note) -> Result<()> {
        self.notes.write().unwrap().push(note);
        Ok(())
    }

    async fn list_for(&self, owner_id: &str) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .read()
            .unwrap()
            .iter()
            .filter(|n| n.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find(&self, owner_id: &str, note_id: &str) -> Result<Option<Note>> {
        Ok(self
            .notes
            .read()
            .unwrap()
            .iter()
            .find(|n| n.owner_id == owner_id && n.id == note_id)
            .cloned())
    }

    async fn delete(&self, owner_id: &str, note_id: &str) -> Result<()> {
        self.notes
            .write()
            .unwrap()
            .retain(|n| !(n.owner_id == owner_id && n.id == note_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn credential_store_round_trip() {
        let store = InMemoryCredentialStore::new();
        let alice = store.add_user("alice", "hunter2");

        assert_eq!(
            store.verify("alice", "hunter2").await.unwrap(),
            Some(alice.clone())
        );
        assert_eq!(store.verify("alice", "wrong").await.unwrap(), None);
        assert_eq!(store.verify("nobody", "hunter2").await.unwrap(), None);
        assert_eq!(store.find_by_id(&alice.id).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn device_store_delete_resets_enrollment() {
        let store = InMemoryDeviceStore::new();
        let device = TotpDevice {
            user_id: "1".to_string(),
            label: "test".to_string(),
            secret: "ABC".to_string(),
            confirmed: false,
        };
        store.create_if_absent(device).await.unwrap();
        store.set_confirmed("1").await.unwrap();
        assert!(store.find("1").await.unwrap().unwrap().confirmed);

        // Administrative MFA reset.
        store.delete("1").await.unwrap();
        assert!(store.find("1").await.unwrap().is_none());
    }
}

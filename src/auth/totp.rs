//! TOTP (RFC 6238) engine.
//!
//! Thin wrapper over `totp-rs` fixing the parameters every authenticator app
//! expects: SHA-1, 6 digits, 30-second step, one step of skew tolerance.

use crate::error::{Error, Result};
use totp_rs::{Algorithm, Secret, TOTP};

/// TOTP parameters. The issuer label is the only thing deployments change.
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// Issuer name shown in authenticator apps and embedded in the otpauth URI.
    pub issuer: String,
    /// Number of digits in the code.
    pub digits: usize,
    /// Time step in seconds.
    pub step: u64,
    /// Accepted drift, in steps, on either side of the current one.
    pub skew: u8,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "notegate".to_string(),
            digits: 6,
            step: 30,
            skew: 1,
        }
    }
}

impl TotpConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Default::default()
        }
    }
}

/// Generates secrets, renders provisioning URIs / QR codes, and checks codes.
#[derive(Clone)]
pub struct TotpEngine {
    config: TotpConfig,
}

impl TotpEngine {
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    /// Fresh random 160-bit secret, base32-encoded for storage and display.
    pub fn generate_secret() -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    /// The `otpauth://` URI an authenticator app enrolls from.
    pub fn provisioning_uri(&self, secret: &str, account: &str) -> String {
        format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}",
            issuer = self.config.issuer,
            account = account,
            secret = secret,
        )
    }

    /// QR code for the provisioning URI as a PNG data-URI, ready for an
    /// `<img src=...>`.
    pub fn qr_data_uri(&self, secret: &str, account: &str) -> Result<String> {
        let totp = self.build(secret, account)?;
        let png = totp
            .get_qr_base64()
            .map_err(|e| Error::internal(format!("Failed to render QR code: {}", e)))?;
        Ok(format!("data:image/png;base64,{}", png))
    }

    /// Check a submitted code at a specific unix timestamp.
    ///
    /// Codes from the adjacent time step on either side are accepted to absorb
    /// clock drift between client and server.
    pub fn check_at(&self, secret: &str, code: &str, account: &str, now: u64) -> Result<bool> {
        let totp = self.build(secret, account)?;
        let code = code.trim().replace([' ', '-'], "");
        Ok(totp.check(&code, now))
    }

    /// Generate the code for an arbitrary timestamp.
    ///
    /// Used by tests and enrollment tooling; never called on a request path.
    pub fn generate_at(&self, secret: &str, account: &str, time: u64) -> Result<String> {
        let totp = self.build(secret, account)?;
        Ok(totp.generate(time))
    }

    fn build(&self, secret: &str, account: &str) -> Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            self.config.digits,
            self.config.skew,
            self.config.step,
            Secret::Encoded(secret.to_string())
                .to_bytes()
                .map_err(|e| Error::internal(format!("Invalid TOTP secret: {}", e)))?,
            Some(self.config.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| Error::internal(format!("Failed to build TOTP: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TotpEngine {
        TotpEngine::new(TotpConfig::new("test-app"))
    }

    #[test]
    fn generated_secret_round_trips() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let now = 1_700_000_000;

        let code = engine.generate_at(&secret, "alice", now).unwrap();
        assert!(engine.check_at(&secret, &code, "alice", now).unwrap());
    }

    #[test]
    fn adjacent_step_accepted_two_steps_rejected() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let now = 1_700_000_010;

        // Code from the previous 30s step still passes (skew = 1).
        let previous = engine.generate_at(&secret, "alice", now - 30).unwrap();
        assert!(engine.check_at(&secret, &previous, "alice", now).unwrap());

        // Two steps back is outside the window.
        let stale = engine.generate_at(&secret, "alice", now - 60).unwrap();
        assert!(!engine.check_at(&secret, &stale, "alice", now).unwrap());
    }

    #[test]
    fn code_with_spaces_is_cleaned() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let now = 1_700_000_000;

        let code = engine.generate_at(&secret, "alice", now).unwrap();
        let spaced = format!("{} {}", &code[..3], &code[3..]);
        assert!(engine.check_at(&secret, &spaced, "alice", now).unwrap());
    }

    #[test]
    fn provisioning_uri_shape() {
        let engine = engine();
        let uri = engine.provisioning_uri("ABC234", "alice");
        assert_eq!(
            uri,
            "otpauth://totp/test-app:alice?secret=ABC234&issuer=test-app"
        );
    }

    #[test]
    fn qr_is_a_png_data_uri() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let qr = engine.qr_data_uri(&secret, "alice").unwrap();
        assert!(qr.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn wrong_code_rejected() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let now = 1_700_000_000;
        let code = engine.generate_at(&secret, "alice", now).unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert!(!engine.check_at(&secret, wrong, "alice", now).unwrap());
    }
}

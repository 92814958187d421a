//! Stateless pending-authentication tokens.
//!
//! After a successful password check the server does not open a session.
//! Instead it hands the client a short-lived token binding the user id to an
//! issuance timestamp, both of which travel back in the clear on the next
//! request and are re-verified against the MAC. Validity is a pure function of
//! (token, user id, timestamp, secret, current time), so any server instance
//! can complete a flow another instance started, and there is no pending-state
//! table to expire or clean up.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// MAC output kept as 16 bytes rendered to 32 hex characters.
const TOKEN_LEN: usize = 32;

/// A pending-authentication token plus the cleartext values it binds.
///
/// The token itself is a MAC, not a container: `user_id` and `issued_at` must
/// be returned by the client alongside it and are never trusted without
/// recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingToken {
    pub token: String,
    pub user_id: String,
    pub issued_at: u64,
}

/// Why verification of a pending token failed.
///
/// Callers on the HTTP surface collapse all three into one generic
/// authentication failure; the distinction exists for logs and tests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTokenError {
    /// Empty user id or a token that is not 32 hex characters.
    InvalidInput,
    /// More than the configured lifetime has elapsed since issuance.
    Expired,
    /// The recomputed MAC does not match.
    InvalidToken,
}

impl std::fmt::Display for PendingTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "malformed pending token input"),
            Self::Expired => write!(f, "pending token expired"),
            Self::InvalidToken => write!(f, "pending token mismatch"),
        }
    }
}

impl std::error::Error for PendingTokenError {}

/// Issues and verifies pending tokens.
///
/// The secret is injected at construction and read-only afterwards; the codec
/// holds no other state and is freely shareable across tasks.
#[derive(Clone)]
pub struct PendingTokenCodec {
    secret: Vec<u8>,
    ttl: Duration,
}

impl PendingTokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Codec with the standard 5-minute lifetime.
    pub fn with_default_ttl(secret: impl Into<Vec<u8>>) -> Self {
        Self::new(secret, Duration::from_secs(300))
    }

    /// Issue a token for `user_id` at time `now` (unix seconds).
    ///
    /// Deterministic: identical inputs produce identical tokens. `now` is part
    /// of the credential and is returned to the caller inside the token.
    pub fn issue(&self, user_id: &str, now: u64) -> PendingToken {
        PendingToken {
            token: self.mac(user_id, now),
            user_id: user_id.to_string(),
            issued_at: now,
        }
    }

    /// Verify a token the client sent back.
    ///
    /// Expiry is checked first: a token is valid through exactly `ttl` seconds
    /// after issuance and rejected from the next second on. The MAC comparison
    /// is constant-time.
    pub fn verify(
        &self,
        token: &str,
        user_id: &str,
        issued_at: u64,
        now: u64,
    ) -> Result<(), PendingTokenError> {
        if user_id.is_empty()
            || token.len() != TOKEN_LEN
            || !token.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(PendingTokenError::InvalidInput);
        }

        if now.saturating_sub(issued_at) > self.ttl.as_secs() {
            return Err(PendingTokenError::Expired);
        }

        let expected = self.mac(user_id, issued_at);
        if expected.as_bytes().ct_eq(token.as_bytes()).into() {
            Ok(())
        } else {
            Err(PendingTokenError::InvalidToken)
        }
    }

    fn mac(&self, user_id: &str, issued_at: u64) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(user_id.as_bytes());
        mac.update(b":");
        mac.update(issued_at.to_string().as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(&digest[..TOKEN_LEN / 2])
    }
}

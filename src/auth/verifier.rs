//! Seam to the external credential store.
//!
//! Password storage and hashing live outside this service. The flow only
//! needs two questions answered: "do these credentials name a user?" and
//! "which user is this id?".

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An authenticated principal: opaque id plus display username.
///
/// Owned by the external user store; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// Trait the external credential store implements.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Check a username/password pair. `Ok(None)` means the credentials do
    /// not match any user — callers must not distinguish "no such user" from
    /// "wrong password".
    async fn verify(&self, username: &str, password: &str) -> Result<Option<Identity>>;

    /// Resolve an identity by its id, for the second step of the MFA flow.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Identity>>;
}

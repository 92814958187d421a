//! Session credential issuance and verification.
//!
//! The terminal state of a successful login is a signed token pair: a
//! short-lived access token and a longer-lived refresh token, both HS256 and
//! bound to the identity. Possession of a valid access token implies full
//! authentication — there is no MFA-pending state inside it. Nothing is
//! persisted; logout is client-side token disposal.

use crate::auth::verifier::Identity;
use crate::error::{Error, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for session token issuance.
#[derive(Clone)]
pub struct SessionConfig {
    secret: Vec<u8>,
    /// `iss` claim.
    pub issuer: String,
    /// Access token lifetime.
    pub access_ttl: Duration,
    /// Refresh token lifetime.
    pub refresh_ttl: Duration,
}

impl SessionConfig {
    pub fn new(secret: impl Into<Vec<u8>>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    pub fn access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }
}

/// Distinguishes the two halves of an issued pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
    /// Unique token id.
    pub jti: String,
    pub token_type: TokenKind,
}

/// The issued pair returned to a fully authenticated caller.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Produces session token pairs.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    config: SessionConfig,
}

impl SessionIssuer {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            config,
        }
    }

    /// Issue an access/refresh pair for `identity` at the current time.
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair> {
        self.issue_at(identity, crate::auth::unix_now())
    }

    /// Issue with an explicit clock, for deterministic tests.
    pub fn issue_at(&self, identity: &Identity, now: u64) -> Result<TokenPair> {
        let access = self.sign(identity, now, self.config.access_ttl, TokenKind::Access)?;
        let refresh = self.sign(identity, now, self.config.refresh_ttl, TokenKind::Refresh)?;

        Ok(TokenPair {
            access,
            refresh,
            expires_in: self.config.access_ttl.as_secs(),
        })
    }

    fn sign(
        &self,
        identity: &Identity,
        now: u64,
        ttl: Duration,
        kind: TokenKind,
    ) -> Result<String> {
        let claims = SessionClaims {
            sub: identity.id.clone(),
            username: identity.username.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + ttl.as_secs(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("Failed to sign session token: {}", e)))
    }
}

/// Verifies bearer tokens on authenticated routes.
#[derive(Clone)]
pub struct SessionVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(secret: &[u8], issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[issuer]);

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify an access token and return the identity it proves.
    ///
    /// A refresh token presented here is rejected even though its signature
    /// is valid.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| Error::unauthorized(format!("Invalid token: {}", e)))?;

        if data.claims.token_type != TokenKind::Access {
            return Err(Error::unauthorized("Not an access token"));
        }

        Ok(Identity {
            id: data.claims.sub,
            username: data.claims.username,
        })
    }
}

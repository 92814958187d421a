//! Request and response types for the authentication surface.

use crate::auth::session::TokenPair;
use serde::{Deserialize, Serialize};

/// `POST /login` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Second-step body for both `POST /mfa/confirm` and `POST /mfa/verify`:
/// the pending token with the cleartext values it binds, plus the TOTP code.
#[derive(Debug, Clone, Deserialize)]
pub struct MfaSubmitRequest {
    pub pending_token: String,
    pub user_id: String,
    pub issued_at: u64,
    pub code: String,
}

/// Query parameters for `GET /mfa/setup` when the caller is mid-flow rather
/// than already authenticated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupQuery {
    pub pending_token: Option<String>,
    pub user_id: Option<String>,
    pub issued_at: Option<u64>,
}

/// Outcome of `POST /login` and of a completed MFA step.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    /// Terminal success: the session credential.
    Success {
        access: String,
        refresh: String,
        expires_in: u64,
        message: String,
    },
    /// Password accepted, confirmed device exists — challenge issued.
    MfaRequired {
        requires_mfa: bool,
        message: String,
        pending_token: String,
        user_id: String,
        issued_at: u64,
    },
    /// Password accepted, no confirmed device — enrollment required.
    MfaSetupRequired {
        requires_mfa_setup: bool,
        message: String,
        pending_token: String,
        user_id: String,
        issued_at: u64,
    },
}

impl LoginResponse {
    pub fn success(pair: TokenPair, message: impl Into<String>) -> Self {
        Self::Success {
            access: pair.access,
            refresh: pair.refresh,
            expires_in: pair.expires_in,
            message: message.into(),
        }
    }

    pub fn mfa_required(token: crate::auth::pending::PendingToken) -> Self {
        Self::MfaRequired {
            requires_mfa: true,
            message: "MFA verification required".to_string(),
            pending_token: token.token,
            user_id: token.user_id,
            issued_at: token.issued_at,
        }
    }

    pub fn mfa_setup_required(token: crate::auth::pending::PendingToken) -> Self {
        Self::MfaSetupRequired {
            requires_mfa_setup: true,
            message: "MFA setup required".to_string(),
            pending_token: token.token,
            user_id: token.user_id,
            issued_at: token.issued_at,
        }
    }
}

/// Outcome of `GET /mfa/setup`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SetupResponse {
    /// Device is unconfirmed: everything needed to enroll an authenticator.
    Required {
        setup_required: bool,
        /// PNG data-URI of the provisioning QR code.
        qr_code: String,
        /// Base32 secret for manual entry.
        secret: String,
        /// The otpauth URI the QR encodes.
        uri: String,
    },
    /// Device already confirmed; nothing to show.
    AlreadyConfigured {
        setup_required: bool,
        message: String,
    },
}

impl SetupResponse {
    pub fn required(qr_code: String, secret: String, uri: String) -> Self {
        Self::Required {
            setup_required: true,
            qr_code,
            secret,
            uri,
        }
    }

    pub fn already_configured() -> Self {
        Self::AlreadyConfigured {
            setup_required: false,
            message: "MFA is already set up".to_string(),
        }
    }
}

/// Body for `POST /logout` and other message-only endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

//! The authentication state machine.
//!
//! `Anonymous → CredentialsChecked → {MfaChallengeIssued | MfaSetupIssued}
//! → Authenticated`, with rejection dropping all state. The server keeps
//! nothing between steps: everything the second call needs — identity,
//! issuance time, tamper-proof binding — travels in the pending token and is
//! re-verified, not trusted.

use crate::auth::device::{DeviceRegistry, DeviceStore};
use crate::auth::pending::{PendingToken, PendingTokenCodec, PendingTokenError};
use crate::auth::session::SessionIssuer;
use crate::auth::types::{LoginRequest, LoginResponse, MfaSubmitRequest, SetupResponse};
use crate::auth::verifier::{CredentialVerifier, Identity};
use crate::error::{Error, Result};

/// Where a caller stands in the flow, stated explicitly.
///
/// Handlers construct this from what the request actually carries (a bearer
/// token, a pending token, or nothing) instead of inferring it from ambient
/// request state.
#[derive(Debug, Clone)]
pub enum AuthState {
    Anonymous,
    PendingMfa(PendingToken),
    Authenticated(Identity),
}

/// Orchestrates credential check, MFA challenge/setup, and session issuance.
pub struct LoginFlow<V, S> {
    verifier: V,
    registry: DeviceRegistry<S>,
    codec: PendingTokenCodec,
    sessions: SessionIssuer,
}

impl<V, S> LoginFlow<V, S>
where
    V: CredentialVerifier,
    S: DeviceStore,
{
    pub fn new(
        verifier: V,
        registry: DeviceRegistry<S>,
        codec: PendingTokenCodec,
        sessions: SessionIssuer,
    ) -> Self {
        Self {
            verifier,
            registry,
            codec,
            sessions,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry<S> {
        &self.registry
    }

    /// Step 1: check credentials and branch on enrollment status.
    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        self.login_at(req, super::unix_now()).await
    }

    pub async fn login_at(&self, req: &LoginRequest, now: u64) -> Result<LoginResponse> {
        if req.username.is_empty() || req.password.is_empty() {
            return Err(Error::invalid_input("Username and password are required"));
        }

        let identity = self
            .verifier
            .verify(&req.username, &req.password)
            .await?
            .ok_or(Error::InvalidCredentials)?;

        let pending = self.codec.issue(&identity.id, now);

        if self.registry.has_confirmed_device(&identity.id).await? {
            tracing::debug!(user_id = %identity.id, "login ok, issuing MFA challenge");
            Ok(LoginResponse::mfa_required(pending))
        } else {
            tracing::debug!(user_id = %identity.id, "login ok, MFA enrollment needed");
            Ok(LoginResponse::mfa_setup_required(pending))
        }
    }

    /// Enrollment view: provisioning QR and secret for an unconfirmed device.
    ///
    /// Reachable both mid-flow (pending token) and by an already
    /// authenticated caller; `state` says which, explicitly.
    pub async fn setup(&self, state: AuthState) -> Result<SetupResponse> {
        self.setup_at(state, super::unix_now()).await
    }

    pub async fn setup_at(&self, state: AuthState, now: u64) -> Result<SetupResponse> {
        let identity = match state {
            AuthState::Authenticated(identity) => identity,
            AuthState::PendingMfa(pending) => self.resume(&pending, now).await?,
            AuthState::Anonymous => {
                return Err(Error::invalid_input(
                    "pending_token, user_id and issued_at are required",
                ))
            }
        };

        let (device, created) = self.registry.get_or_create_device(&identity).await?;
        if created {
            tracing::info!(user_id = %identity.id, "created unconfirmed TOTP device");
        }

        if device.confirmed {
            return Ok(SetupResponse::already_configured());
        }

        let uri = self.registry.provisioning_uri(&device, &identity.username);
        let qr = self.registry.qr_code(&device, &identity.username)?;
        Ok(SetupResponse::required(qr, device.secret, uri))
    }

    /// Step 3 (setup branch): prove the secret was scanned, confirm the
    /// device, and finish the login.
    pub async fn confirm(&self, req: &MfaSubmitRequest) -> Result<LoginResponse> {
        self.confirm_at(req, super::unix_now()).await
    }

    pub async fn confirm_at(&self, req: &MfaSubmitRequest, now: u64) -> Result<LoginResponse> {
        let identity = self.resume_submit(req, now).await?;

        if !self.registry.confirm_at(&identity, &req.code, now).await? {
            // Retryable: the pending token is still valid, state unchanged.
            return Err(Error::InvalidCode);
        }

        tracing::info!(user_id = %identity.id, "TOTP device confirmed");
        self.complete(&identity, "MFA setup confirmed")
    }

    /// Step 2 (challenge branch): verify the code against the confirmed
    /// device and finish the login.
    pub async fn verify(&self, req: &MfaSubmitRequest) -> Result<LoginResponse> {
        self.verify_at(req, super::unix_now()).await
    }

    pub async fn verify_at(&self, req: &MfaSubmitRequest, now: u64) -> Result<LoginResponse> {
        let identity = self.resume_submit(req, now).await?;

        if !self.registry.verify_at(&identity, &req.code, now).await? {
            return Err(Error::InvalidCode);
        }

        self.complete(&identity, "MFA verified, login successful")
    }

    /// Re-validate a pending token and resolve the identity it binds.
    async fn resume(&self, pending: &PendingToken, now: u64) -> Result<Identity> {
        self.codec
            .verify(&pending.token, &pending.user_id, pending.issued_at, now)
            .map_err(|e| match e {
                // The distinction stays in the logs; the wire gets one answer.
                PendingTokenError::InvalidInput => {
                    tracing::debug!("pending token rejected: malformed input");
                    Error::InvalidOrExpiredToken
                }
                PendingTokenError::Expired => {
                    tracing::debug!(user_id = %pending.user_id, "pending token rejected: expired");
                    Error::InvalidOrExpiredToken
                }
                PendingTokenError::InvalidToken => {
                    tracing::warn!(user_id = %pending.user_id, "pending token rejected: bad MAC");
                    Error::InvalidOrExpiredToken
                }
            })?;

        self.verifier
            .find_by_id(&pending.user_id)
            .await?
            .ok_or_else(|| Error::not_found("User not found"))
    }

    async fn resume_submit(&self, req: &MfaSubmitRequest, now: u64) -> Result<Identity> {
        let pending = PendingToken {
            token: req.pending_token.clone(),
            user_id: req.user_id.clone(),
            issued_at: req.issued_at,
        };
        self.resume(&pending, now).await
    }

    /// Terminal transition: issue the session credential.
    fn complete(&self, identity: &Identity, message: &str) -> Result<LoginResponse> {
        let pair = self.sessions.issue(identity)?;
        tracing::info!(user_id = %identity.id, "authenticated");
        Ok(LoginResponse::success(pair, message))
    }
}

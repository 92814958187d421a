//! Authentication: pending tokens, TOTP devices, the login state machine,
//! and session credentials.

pub mod device;
pub mod extractors;
pub mod flow;
pub mod pending;
pub mod session;
pub mod totp;
pub mod types;
pub mod verifier;

pub use device::{DeviceRegistry, DeviceStore, TotpDevice};
pub use extractors::{AuthUser, OptionalAuthUser};
pub use flow::{AuthState, LoginFlow};
pub use pending::{PendingToken, PendingTokenCodec, PendingTokenError};
pub use session::{SessionConfig, SessionIssuer, SessionVerifier, TokenPair};
pub use totp::{TotpConfig, TotpEngine};
pub use types::{LoginRequest, LoginResponse, MfaSubmitRequest, SetupQuery, SetupResponse};
pub use verifier::{CredentialVerifier, Identity};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as unix seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

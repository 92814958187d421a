//! notegate - session authentication with TOTP MFA and per-user notes.
//!
//! The login flow is multi-step but the server holds no state between steps:
//! a successful password check hands back a short-lived, MAC-protected
//! pending token binding the user id to an issuance time. The follow-up call
//! returns that token together with a TOTP code; both are re-verified before
//! the session credential (a signed access/refresh token pair) is issued.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use notegate::auth::{
//!     DeviceRegistry, LoginFlow, PendingTokenCodec, SessionConfig, SessionIssuer,
//!     SessionVerifier, TotpConfig, TotpEngine,
//! };
//! use notegate::notes::NoteService;
//! use notegate::testing::{InMemoryCredentialStore, InMemoryDeviceStore, InMemoryNoteStore};
//! use notegate::{AppContext, app};
//!
//! #[tokio::main]
//! async fn main() {
//!     notegate::init_tracing();
//!
//!     let secret = b"change-me".to_vec();
//!     let users = InMemoryCredentialStore::new();
//!     users.add_user("admin", "admin-password");
//!
//!     let flow = LoginFlow::new(
//!         users,
//!         DeviceRegistry::new(
//!             InMemoryDeviceStore::new(),
//!             TotpEngine::new(TotpConfig::new("notegate")),
//!         ),
//!         PendingTokenCodec::new(secret.clone(), Duration::from_secs(300)),
//!         SessionIssuer::new(SessionConfig::new(secret.clone(), "notegate")),
//!     );
//!
//!     let ctx = AppContext {
//!         flow: Arc::new(flow),
//!         notes: Arc::new(NoteService::new(InMemoryNoteStore::new(), "media/notes")),
//!         sessions: SessionVerifier::new(&secret, "notegate"),
//!     };
//!
//!     app::serve(app::router(ctx), "0.0.0.0:8000".parse().unwrap())
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod app;
pub mod auth;
mod config;
mod error;
pub mod notes;
pub mod testing;

pub use app::AppContext;
pub use config::{AuthConfig, Config, ConfigBuilder, LoggingConfig, NotesConfig, ServerConfig};
pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults.
///
/// Call early in `main()`, before building the app.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log level filter (e.g. "info", "notegate=debug")
/// - `NOTEGATE_LOG_JSON`: set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("NOTEGATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from a [`Config`].
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

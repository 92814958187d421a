use std::sync::Arc;
use std::time::Duration;

use notegate::app::{self, ephemeral_secret};
use notegate::auth::{
    DeviceRegistry, DeviceStore, LoginFlow, PendingTokenCodec, SessionConfig, SessionIssuer,
    SessionVerifier, TotpConfig, TotpEngine,
};
use notegate::notes::NoteService;
use notegate::testing::{InMemoryCredentialStore, InMemoryDeviceStore, InMemoryNoteStore};
use notegate::{AppContext, ConfigBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    notegate::init_tracing();

    let config = ConfigBuilder::new().from_env().build();

    let secret = if config.auth.secret.is_empty() {
        tracing::warn!(
            "NOTEGATE_SECRET_KEY is not set; using an ephemeral secret. \
             Pending tokens and sessions will not survive a restart."
        );
        ephemeral_secret()
    } else {
        config.auth.secret.clone()
    };

    let users = InMemoryCredentialStore::new();
    let devices = InMemoryDeviceStore::new();

    // Bootstrap an admin account for deployments without a seeded user store.
    let admin_username =
        std::env::var("NOTEGATE_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    match std::env::var("NOTEGATE_ADMIN_PASSWORD") {
        Ok(password) if !password.is_empty() => {
            let identity = users.add_user(&admin_username, &password);
            tracing::info!(username = %admin_username, "admin account created");

            // Operator-requested MFA reset for the bootstrap account.
            if std::env::var("NOTEGATE_RESET_MFA").as_deref() == Ok("true") {
                devices.delete(&identity.id).await?;
                tracing::info!(username = %admin_username, "admin MFA enrollment reset");
            }
        }
        _ => {
            tracing::warn!("NOTEGATE_ADMIN_PASSWORD not set; no accounts exist");
        }
    }

    let flow = LoginFlow::new(
        users,
        DeviceRegistry::new(
            devices,
            TotpEngine::new(TotpConfig::new(config.auth.totp_issuer.clone())),
        ),
        PendingTokenCodec::new(
            secret.as_bytes().to_vec(),
            Duration::from_secs(config.auth.pending_token_ttl),
        ),
        SessionIssuer::new(
            SessionConfig::new(secret.as_bytes().to_vec(), config.auth.totp_issuer.clone())
                .access_ttl(Duration::from_secs(config.auth.access_token_ttl))
                .refresh_ttl(Duration::from_secs(config.auth.refresh_token_ttl)),
        ),
    );

    let ctx = AppContext {
        flow: Arc::new(flow),
        notes: Arc::new(NoteService::new(
            InMemoryNoteStore::new(),
            config.notes.dir.clone(),
        )),
        sessions: SessionVerifier::new(secret.as_bytes(), &config.auth.totp_issuer),
    };

    let addr = config.server.addr()?;
    app::serve(app::router(ctx), addr).await?;
    Ok(())
}

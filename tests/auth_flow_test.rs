//! End-to-end tests for the login state machine, driven through the public
//! flow API with in-memory stores and an explicit clock.

use std::time::Duration;

use notegate::Error;
use notegate::auth::{
    AuthState, DeviceRegistry, LoginFlow, LoginRequest, LoginResponse, MfaSubmitRequest,
    PendingToken, PendingTokenCodec, SessionConfig, SessionIssuer, SessionVerifier, SetupResponse,
    TotpConfig, TotpEngine,
};
use notegate::testing::{InMemoryCredentialStore, InMemoryDeviceStore};

const SECRET: &[u8] = b"integration-test-secret-0123456789";
const T0: u64 = 1_700_000_000;

type TestFlow = LoginFlow<InMemoryCredentialStore, InMemoryDeviceStore>;

fn test_flow() -> TestFlow {
    let users = InMemoryCredentialStore::new();
    users.add_user("alice", "hunter2");
    LoginFlow::new(
        users,
        DeviceRegistry::new(
            InMemoryDeviceStore::new(),
            TotpEngine::new(TotpConfig::new("test-app")),
        ),
        PendingTokenCodec::new(SECRET.to_vec(), Duration::from_secs(300)),
        SessionIssuer::new(SessionConfig::new(SECRET, "test-app")),
    )
}

fn pending_of(resp: &LoginResponse) -> PendingToken {
    match resp {
        LoginResponse::MfaRequired {
            pending_token,
            user_id,
            issued_at,
            ..
        }
        | LoginResponse::MfaSetupRequired {
            pending_token,
            user_id,
            issued_at,
            ..
        } => PendingToken {
            token: pending_token.clone(),
            user_id: user_id.clone(),
            issued_at: *issued_at,
        },
        other => panic!("expected an MFA branch, got {:?}", other),
    }
}

fn submit(pending: &PendingToken, code: &str) -> MfaSubmitRequest {
    MfaSubmitRequest {
        pending_token: pending.token.clone(),
        user_id: pending.user_id.clone(),
        issued_at: pending.issued_at,
        code: code.to_string(),
    }
}

fn secret_of(setup: SetupResponse) -> String {
    match setup {
        SetupResponse::Required { secret, .. } => secret,
        other => panic!("expected setup payload, got {:?}", other),
    }
}

/// Enroll alice and return her TOTP secret.
async fn enroll(flow: &TestFlow, now: u64) -> String {
    let resp = flow
        .login_at(
            &LoginRequest {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
            },
            now,
        )
        .await
        .unwrap();
    assert!(matches!(resp, LoginResponse::MfaSetupRequired { .. }));
    let pending = pending_of(&resp);

    let secret = secret_of(
        flow.setup_at(AuthState::PendingMfa(pending.clone()), now)
            .await
            .unwrap(),
    );

    let code = flow
        .registry()
        .totp()
        .generate_at(&secret, "alice", now)
        .unwrap();
    let resp = flow.confirm_at(&submit(&pending, &code), now).await.unwrap();
    assert!(matches!(resp, LoginResponse::Success { .. }));
    secret
}

async fn login(flow: &TestFlow, now: u64) -> LoginResponse {
    flow.login_at(
        &LoginRequest {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        },
        now,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn fresh_user_journey_and_expired_token_replay() {
    let flow = test_flow();

    // Fresh user: setup branch, QR payload, confirmation, session.
    let resp = login(&flow, T0).await;
    assert!(matches!(resp, LoginResponse::MfaSetupRequired { .. }));
    let pending = pending_of(&resp);

    let setup = flow
        .setup_at(AuthState::PendingMfa(pending.clone()), T0 + 1)
        .await
        .unwrap();
    let secret = match setup {
        SetupResponse::Required {
            setup_required,
            qr_code,
            secret,
            ..
        } => {
            assert!(setup_required);
            assert!(qr_code.starts_with("data:image/png;base64,"));
            secret
        }
        other => panic!("expected setup payload, got {:?}", other),
    };

    let code = flow
        .registry()
        .totp()
        .generate_at(&secret, "alice", T0 + 10)
        .unwrap();
    let resp = flow
        .confirm_at(&submit(&pending, &code), T0 + 10)
        .await
        .unwrap();
    match resp {
        LoginResponse::Success { access, refresh, .. } => {
            assert!(!access.is_empty());
            assert!(!refresh.is_empty());
            // The access token is a full session credential.
            let verifier = SessionVerifier::new(SECRET, "test-app");
            let identity = verifier.verify(&access).unwrap();
            assert_eq!(identity.username, "alice");
        }
        other => panic!("expected session, got {:?}", other),
    }

    // Replaying the original pending token after 301 simulated seconds fails
    // with the generic token error, not a code error.
    let code = flow
        .registry()
        .totp()
        .generate_at(&secret, "alice", T0 + 301)
        .unwrap();
    let err = flow
        .confirm_at(&submit(&pending, &code), T0 + 301)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOrExpiredToken));
}

#[tokio::test]
async fn enrolled_user_accepts_previous_step_rejects_two_steps() {
    let flow = test_flow();
    let secret = enroll(&flow, T0).await;

    let t1 = T0 + 600;
    let resp = login(&flow, t1).await;
    assert!(matches!(resp, LoginResponse::MfaRequired { .. }));
    let pending = pending_of(&resp);

    // Code from two steps away: rejected, flow stays retryable.
    let stale = flow
        .registry()
        .totp()
        .generate_at(&secret, "alice", t1 - 60)
        .unwrap();
    let err = flow.verify_at(&submit(&pending, &stale), t1).await.unwrap_err();
    assert!(matches!(err, Error::InvalidCode));

    // Code from the previous step (drift = 1): accepted.
    let drifted = flow
        .registry()
        .totp()
        .generate_at(&secret, "alice", t1 - 30)
        .unwrap();
    let resp = flow.verify_at(&submit(&pending, &drifted), t1).await.unwrap();
    assert!(matches!(resp, LoginResponse::Success { .. }));
}

#[tokio::test]
async fn setup_is_idempotent_and_one_way() {
    let flow = test_flow();

    let resp = login(&flow, T0).await;
    let pending = pending_of(&resp);

    // Two setup views hand out the same secret; a scanned QR stays valid.
    let first = secret_of(
        flow.setup_at(AuthState::PendingMfa(pending.clone()), T0)
            .await
            .unwrap(),
    );
    let second = secret_of(
        flow.setup_at(AuthState::PendingMfa(pending.clone()), T0 + 30)
            .await
            .unwrap(),
    );
    assert_eq!(first, second);

    // Confirm, then request setup again: the device must stay confirmed.
    let code = flow
        .registry()
        .totp()
        .generate_at(&first, "alice", T0 + 40)
        .unwrap();
    flow.confirm_at(&submit(&pending, &code), T0 + 40)
        .await
        .unwrap();

    let resp = login(&flow, T0 + 60).await;
    let pending = pending_of(&resp);
    let setup = flow
        .setup_at(AuthState::PendingMfa(pending), T0 + 60)
        .await
        .unwrap();
    assert!(matches!(
        setup,
        SetupResponse::AlreadyConfigured { setup_required: false, .. }
    ));
    assert!(flow
        .registry()
        .has_confirmed_device("1")
        .await
        .unwrap());
}

#[tokio::test]
async fn pending_token_from_different_secret_is_rejected() {
    let flow = test_flow();
    login(&flow, T0).await;

    // Forge a pending token with a different server secret.
    let forged = PendingTokenCodec::new(b"attacker-secret".to_vec(), Duration::from_secs(300))
        .issue("1", T0);
    let err = flow
        .setup_at(AuthState::PendingMfa(forged), T0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOrExpiredToken));
}

#[tokio::test]
async fn authenticated_state_reaches_setup_without_pending_token() {
    let flow = test_flow();

    // A caller holding a full session can view enrollment directly.
    let identity = notegate::auth::Identity::new("1", "alice");
    let setup = flow
        .setup_at(AuthState::Authenticated(identity), T0)
        .await
        .unwrap();
    assert!(matches!(setup, SetupResponse::Required { .. }));
}

//! Application wiring: context, router, and serve loop.

use crate::auth::device::DeviceStore;
use crate::auth::extractors::{AuthUser, OptionalAuthUser};
use crate::auth::flow::{AuthState, LoginFlow};
use crate::auth::pending::PendingToken;
use crate::auth::session::SessionVerifier;
use crate::auth::types::{
    LoginRequest, LoginResponse, MessageResponse, MfaSubmitRequest, SetupQuery, SetupResponse,
};
use crate::auth::verifier::CredentialVerifier;
use crate::error::{Error, Result};
use crate::notes::{Note, NoteService, NoteStore};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state behind every handler.
pub struct AppContext<V, S, N> {
    pub flow: Arc<LoginFlow<V, S>>,
    pub notes: Arc<NoteService<N>>,
    pub sessions: SessionVerifier,
}

impl<V, S, N> Clone for AppContext<V, S, N> {
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
            notes: self.notes.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

/// Build the full HTTP surface.
pub fn router<V, S, N>(ctx: AppContext<V, S, N>) -> Router
where
    V: CredentialVerifier + Send + Sync + 'static,
    S: DeviceStore + Send + Sync + 'static,
    N: NoteStore + Send + Sync + 'static,
{
    let sessions = ctx.sessions.clone();

    Router::new()
        .route("/login", post(login::<V, S, N>))
        .route("/mfa/setup", get(mfa_setup::<V, S, N>))
        .route("/mfa/confirm", post(mfa_confirm::<V, S, N>))
        .route("/mfa/verify", post(mfa_verify::<V, S, N>))
        .route("/logout", post(logout))
        .route("/welcome", get(welcome))
        .route("/lucky-number", get(lucky_number))
        .route("/quote", get(quote_of_the_day))
        .route("/notes", get(notes_list::<V, S, N>).post(notes_create::<V, S, N>))
        .route("/notes/:id/download", get(notes_download::<V, S, N>))
        .route("/notes/:id", delete(notes_delete::<V, S, N>))
        .layer(Extension(sessions))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind and serve until the process is stopped.
pub async fn serve(router: Router, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "notegate listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| Error::internal(format!("Server error: {}", e)))
}

// ---------------------------------------------------------------------------
// Auth handlers
// ---------------------------------------------------------------------------

async fn login<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>>
where
    V: CredentialVerifier,
    S: DeviceStore,
{
    Ok(Json(ctx.flow.login(&req).await?))
}

async fn mfa_setup<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    OptionalAuthUser(identity): OptionalAuthUser,
    Query(query): Query<SetupQuery>,
) -> Result<Json<SetupResponse>>
where
    V: CredentialVerifier,
    S: DeviceStore,
{
    // The caller's position in the flow is stated explicitly: a valid access
    // token wins, then pending-token query parameters, then nothing.
    let state = match identity {
        Some(identity) => AuthState::Authenticated(identity),
        None => match (query.pending_token, query.user_id, query.issued_at) {
            (Some(token), Some(user_id), Some(issued_at)) => AuthState::PendingMfa(PendingToken {
                token,
                user_id,
                issued_at,
            }),
            _ => AuthState::Anonymous,
        },
    };

    Ok(Json(ctx.flow.setup(state).await?))
}

async fn mfa_confirm<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    Json(req): Json<MfaSubmitRequest>,
) -> Result<Json<LoginResponse>>
where
    V: CredentialVerifier,
    S: DeviceStore,
{
    Ok(Json(ctx.flow.confirm(&req).await?))
}

async fn mfa_verify<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    Json(req): Json<MfaSubmitRequest>,
) -> Result<Json<LoginResponse>>
where
    V: CredentialVerifier,
    S: DeviceStore,
{
    Ok(Json(ctx.flow.verify(&req).await?))
}

/// Sessions are stateless; logout is the client discarding its tokens.
/// Server-side TOTP enrollment is untouched.
async fn logout(AuthUser(identity): AuthUser) -> Json<MessageResponse> {
    tracing::debug!(user_id = %identity.id, "logout");
    Json(MessageResponse::new("Logged out successfully"))
}

// ---------------------------------------------------------------------------
// Small authenticated demo endpoints
// ---------------------------------------------------------------------------

async fn welcome(AuthUser(_): AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse::new("Success!"))
}

#[derive(Serialize)]
struct NumberResponse {
    number: u32,
}

async fn lucky_number(AuthUser(_): AuthUser) -> Json<NumberResponse> {
    Json(NumberResponse {
        number: rand::thread_rng().gen_range(1..=100),
    })
}

#[derive(Serialize)]
struct QuoteResponse {
    quote: &'static str,
}

const QUOTES: &[&str] = &[
    "The only way to do great work is to love what you do. - Steve Jobs",
    "Innovation distinguishes between a leader and a follower. - Steve Jobs",
    "Life is what happens to you while you're busy making other plans. - John Lennon",
    "The future belongs to those who believe in the beauty of their dreams. - Eleanor Roosevelt",
    "It is during our darkest moments that we must focus to see the light. - Aristotle",
    "The way to get started is to quit talking and begin doing. - Walt Disney",
    "Don't let yesterday take up too much of today. - Will Rogers",
    "You learn more from failure than from success. - Unknown",
];

async fn quote_of_the_day(AuthUser(_): AuthUser) -> Json<QuoteResponse> {
    let idx = rand::thread_rng().gen_range(0..QUOTES.len());
    Json(QuoteResponse { quote: QUOTES[idx] })
}

// ---------------------------------------------------------------------------
// Note handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct NoteSummary {
    id: String,
    title: String,
    file_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Note> for NoteSummary {
    fn from(note: Note) -> Self {
        Self {
            file_url: format!("/notes/{}/download", note.id),
            id: note.id,
            title: note.title,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Serialize)]
struct NotesListResponse {
    notes: Vec<NoteSummary>,
}

async fn notes_list<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<NotesListResponse>>
where
    N: NoteStore,
{
    let notes = ctx.notes.list(&identity).await?;
    Ok(Json(NotesListResponse {
        notes: notes.into_iter().map(NoteSummary::from).collect(),
    }))
}

#[derive(Deserialize)]
struct CreateNoteRequest {
    title: String,
    content: String,
}

async fn notes_create<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteSummary>)>
where
    N: NoteStore,
{
    let note = ctx.notes.create(&identity, &req.title, &req.content).await?;
    Ok((StatusCode::CREATED, Json(NoteSummary::from(note))))
}

async fn notes_download<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    AuthUser(identity): AuthUser,
    Path(note_id): Path<String>,
) -> Result<Response>
where
    N: NoteStore,
{
    let (note, content) = ctx.notes.download(&identity, &note_id).await?;

    let safe_name: String = note
        .title
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '"' { '_' } else { c })
        .collect();

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.txt\"", safe_name),
            ),
        ],
        content,
    )
        .into_response())
}

async fn notes_delete<V, S, N>(
    State(ctx): State<AppContext<V, S, N>>,
    AuthUser(identity): AuthUser,
    Path(note_id): Path<String>,
) -> Result<Json<MessageResponse>>
where
    N: NoteStore,
{
    ctx.notes.delete(&identity, &note_id).await?;
    Ok(Json(MessageResponse::new("Note deleted successfully")))
}

/// Generate a random process secret for deployments that did not set one.
///
/// Pending tokens and sessions signed with it do not survive a restart.
pub fn ephemeral_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill(&mut bytes);
    hex::encode(bytes)
}

//! Session management endpoints

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};

use switchboard_core::auth::SessionToken;

use super::chat;
use crate::auth::authorize;
use crate::error::AppError;
use crate::types::{CreateSessionResponse, SessionResponse, TokenQuery};
use crate::AppState;

/// Build the sessions router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/:id", get(get_session))
        .route("/:id/chat", post(chat::chat))
}

/// Create a new session owned by the initial agent
async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.store.create(state.agents.initial_agent().id);
    let token = state
        .authenticator
        .issue(&session_id)
        .map(SessionToken::into_string);

    tracing::info!(session_id = %session_id, "Session created");
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, token }),
    )
}

/// Committed history and active agent of a session
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    authorize(&state.authenticator, &id, &headers, query.token.as_deref())?;

    let session = state.store.get(&id).await?;
    let agent = state
        .agents
        .by_id(session.last_agent)
        .map(|a| a.name.clone())
        .ok_or_else(|| {
            AppError::Internal(format!("Session {} has no valid agent", id))
        })?;

    Ok(Json(SessionResponse {
        session_id: id,
        agent,
        items: session.conversation_items,
    }))
}

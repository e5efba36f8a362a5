//! Chat endpoint with optional SSE streaming.
//!
//! Streamed responses send each text fragment as one `data:` event, in the
//! order the engine produced them, and end with a `done` event whose data is
//! `[DONE]`, so a fragment that happens to read `[DONE]` is still a plain
//! message event. A failed turn ends with an `error` event carrying the
//! message instead.

use std::borrow::Cow;
use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;

use switchboard_core::TurnEvent;

use crate::auth::authorize;
use crate::error::AppError;
use crate::types::{ChatRequest, ChatResponse};
use crate::AppState;

/// Payload of the terminal event of a successful stream
pub const DONE_MARKER: &str = "[DONE]";

pub(super) async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    authorize(
        &state.authenticator,
        &session_id,
        &headers,
        req.token.as_deref(),
    )?;

    if !state.store.contains(&session_id) {
        return Err(AppError::NotFound(format!("Session {} not found", session_id)));
    }

    let runner = state.runner.as_ref().ok_or_else(|| {
        AppError::Unavailable("No model credentials configured".to_string())
    })?;

    if req.stream {
        let turn = runner.run_turn_streamed(&session_id, &req.message).await?;
        let events = turn.map(|event| Ok::<_, Infallible>(to_sse_event(event)));
        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let output = runner.run_turn(&session_id, &req.message).await?;
    Ok(Json(ChatResponse {
        response: output.response,
        agent: output.agent,
    })
    .into_response())
}

fn to_sse_event(event: TurnEvent) -> Event {
    match event {
        TurnEvent::Delta(delta) => Event::default().data(sse_safe(&delta)),
        TurnEvent::Done { .. } => Event::default().event("done").data(DONE_MARKER),
        TurnEvent::Failed(message) => Event::default().event("error").data(sse_safe(&message)),
    }
}

/// SSE cannot carry bare carriage returns; fold them into newlines, which
/// become separate `data:` lines of the same event.
fn sse_safe(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

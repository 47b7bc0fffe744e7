use super::state::AppState;
use crate::audio::{AudioBackendFactory, CaptureDuplexer};
use crate::draft::check_existing_draft;
use crate::session::{
    builtin_themes, InterviewMachine, SessionDeps, SessionHandle, SessionRunner, SessionSnapshot,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub account_id: String,

    /// Pre-selected theme; skips theme selection entirely.
    pub theme_id: Option<String>,

    /// Delete any existing draft instead of refusing to start.
    #[serde(default)]
    pub start_fresh: bool,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectThemeRequest {
    /// Omit to let the interviewer choose.
    pub theme_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    pub split: bool,
}

#[derive(Debug, Serialize)]
pub struct DraftStatusResponse {
    pub exists: bool,
    pub session_id: Option<Uuid>,
    pub message_count: Option<usize>,
    pub elapsed_seconds: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub account_id: String,
}

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub title: String,
    pub text: String,
    pub duration_seconds: f64,
    pub audio_bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub stories: Vec<StoryResponse>,
    pub full_transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_found(session_id: Uuid) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session {} not found", session_id),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /interviews/start
/// Start a new interview session for an account
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    info!("Starting interview session for account: {}", req.account_id);

    // One live capture rig per account.
    if state.active_session_for(&req.account_id).await.is_some() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Account {} already has a session in progress", req.account_id),
            }),
        )
            .into_response();
    }

    // The draft check must resolve before any interview UI: an
    // existing draft means resume-or-discard comes first.
    if let Some(draft) = check_existing_draft(state.draft_store.as_ref(), &req.account_id).await {
        if req.start_fresh {
            if let Err(e) = state.draft_store.delete(&req.account_id).await {
                error!("Failed to discard draft: {}", e);
            }
        } else {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!(
                        "A recoverable draft from {} exists; resume it or start fresh",
                        draft.updated_at
                    ),
                }),
            )
                .into_response();
        }
    }

    let machine = match &req.theme_id {
        Some(theme_id) => {
            let Some(theme) = builtin_themes().into_iter().find(|t| &t.id == theme_id) else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("Unknown theme: {}", theme_id),
                    }),
                )
                    .into_response();
            };
            InterviewMachine::with_theme(&req.account_id, state.interview.clone(), theme)
        }
        None => InterviewMachine::new(&req.account_id, state.interview.clone()),
    };

    spawn_session(&state, machine).await
}

/// POST /interviews/resume
/// Reconstruct a session from the account's draft
pub async fn resume_session(
    State(state): State<AppState>,
    Json(req): Json<ResumeRequest>,
) -> impl IntoResponse {
    if state.active_session_for(&req.account_id).await.is_some() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Account {} already has a session in progress", req.account_id),
            }),
        )
            .into_response();
    }

    let Some(draft) = check_existing_draft(state.draft_store.as_ref(), &req.account_id).await
    else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No draft for account {}", req.account_id),
            }),
        )
            .into_response();
    };

    info!(
        "Resuming session {} for account {} ({}s elapsed)",
        draft.session_id, req.account_id, draft.elapsed_seconds
    );

    let machine = InterviewMachine::resume(&req.account_id, state.interview.clone(), draft);
    spawn_session(&state, machine).await
}

async fn spawn_session(state: &AppState, machine: InterviewMachine) -> axum::response::Response {
    let backend = match AudioBackendFactory::create(state.audio_input.clone(), state.capture.clone())
    {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to create audio backend: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: format!("Audio capture unavailable: {}", e),
                }),
            )
                .into_response();
        }
    };

    let duplexer = CaptureDuplexer::new(backend, state.capture.clone());
    let deps = SessionDeps {
        analyzer: Arc::clone(&state.analyzer),
        splitter: Arc::clone(&state.splitter),
        live_interviewer: state.live_interviewer.clone(),
        draft_store: Arc::clone(&state.draft_store),
    };

    let handle = match SessionRunner::spawn(machine, duplexer, state.interview.clone(), deps).await
    {
        Ok(handle) => Arc::new(handle),
        Err(e) => {
            error!("Failed to start session: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: format!("Failed to start session: {}", e),
                }),
            )
                .into_response();
        }
    };

    let session_id = handle.id();
    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id, handle);
    }

    info!("Session {} started", session_id);

    (
        StatusCode::OK,
        Json(StartSessionResponse {
            session_id,
            status: "recording".to_string(),
        }),
    )
        .into_response()
}

/// GET /interviews/draft/:account_id
/// Check for a recoverable draft before showing any interview UI
pub async fn draft_status(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> impl IntoResponse {
    let draft = check_existing_draft(state.draft_store.as_ref(), &account_id).await;

    let response = match draft {
        Some(draft) => DraftStatusResponse {
            exists: true,
            session_id: Some(draft.session_id),
            message_count: Some(draft.messages.len()),
            elapsed_seconds: Some(draft.elapsed_seconds),
            updated_at: Some(draft.updated_at),
        },
        None => DraftStatusResponse {
            exists: false,
            session_id: None,
            message_count: None,
            elapsed_seconds: None,
            updated_at: None,
        },
    };

    (StatusCode::OK, Json(response))
}

/// DELETE /interviews/draft/:account_id
/// Explicitly discard a draft ("start fresh")
pub async fn discard_draft(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> impl IntoResponse {
    match state.draft_store.delete(&account_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to discard draft: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to discard draft: {}", e),
                }),
            )
                .into_response()
        }
    }
}

async fn with_session(
    state: &AppState,
    session_id: Uuid,
) -> Result<Arc<SessionHandle>, axum::response::Response> {
    let sessions = state.sessions.read().await;
    sessions.get(&session_id).cloned().ok_or_else(|| not_found(session_id))
}

/// POST /interviews/:session_id/theme
pub async fn select_theme(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SelectThemeRequest>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    let theme = match &req.theme_id {
        Some(theme_id) => match builtin_themes().into_iter().find(|t| &t.id == theme_id) {
            Some(theme) => Some(theme),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("Unknown theme: {}", theme_id),
                    }),
                )
                    .into_response()
            }
        },
        None => None,
    };

    match handle.select_theme(theme).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => session_gone(e),
    }
}

/// POST /interviews/:session_id/respond
/// A typed narrator turn
pub async fn respond(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    match handle.narrator_typed(req.text).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => session_gone(e),
    }
}

/// POST /interviews/:session_id/spoken
/// Mark the end of a spoken narrator turn
pub async fn spoken(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    match handle.narrator_spoke().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => session_gone(e),
    }
}

/// POST /interviews/:session_id/finish
pub async fn finish(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    match handle.finish().await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => session_gone(e),
    }
}

/// POST /interviews/:session_id/split
pub async fn split_decision(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SplitRequest>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    match handle.split_decision(req.split).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => session_gone(e),
    }
}

/// POST /interviews/:session_id/retry
/// Retry the interviewer after a connection error
pub async fn retry(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    match handle.retry_interviewer().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => session_gone(e),
    }
}

/// POST /interviews/:session_id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    // Already terminal: cancellation is satisfied either way.
    let _ = handle.cancel().await;

    // The entry leaves the table only after the runner has released
    // the capture rig; until then the account cannot start anew.
    state.remove_after_teardown(session_id).await;

    info!("Session {} cancelled", session_id);
    StatusCode::NO_CONTENT.into_response()
}

/// GET /interviews/:session_id/status
pub async fn status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    let snapshot: SessionSnapshot = handle.snapshot();
    (StatusCode::OK, Json(snapshot)).into_response()
}

/// GET /interviews/:session_id/result
/// Completed stories (metadata; audio sizes rather than payloads).
/// Serving the result also retires the session: the handle pins the
/// full audio blobs, and keeping terminal entries around would grow
/// the table without bound.
pub async fn result(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let handle = match with_session(&state, session_id).await {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    match handle.completed() {
        Some(done) => {
            let stories = done
                .stories
                .iter()
                .map(|s| StoryResponse {
                    title: s.title.clone(),
                    text: s.text.clone(),
                    duration_seconds: s.duration_seconds,
                    audio_bytes: s.audio.len(),
                })
                .collect();
            let response = (
                StatusCode::OK,
                Json(ResultResponse {
                    stories,
                    full_transcript: done.full_transcript.clone(),
                }),
            )
                .into_response();

            state.evict_if_terminal(session_id).await;
            response
        }
        None => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Session has not completed".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn session_gone(e: anyhow::Error) -> axum::response::Response {
    (
        StatusCode::GONE,
        Json(ErrorResponse {
            error: format!("Session is no longer active: {}", e),
        }),
    )
        .into_response()
}

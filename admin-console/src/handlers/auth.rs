use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use secrecy::Secret;
use validator::Validate;

use crate::error::ConsoleError;
use crate::models::{LoginRequest, SessionView};
use crate::AppState;

/// POST /session/login
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionView>, ConsoleError> {
    payload.validate()?;

    let credential = state
        .session
        .login(&payload.email, Secret::new(payload.password))
        .await?;

    Ok(Json(SessionView::from(&credential)))
}

/// POST /session/logout
///
/// Also drops the selection and the loaded records so nothing from the
/// previous session stays on screen.
pub async fn logout_handler(State(state): State<AppState>) -> StatusCode {
    state.session.logout().await;
    state.workflow.back().await;
    *state.records.lock().await = Default::default();
    StatusCode::NO_CONTENT
}

/// GET /session
pub async fn current_session_handler(
    State(state): State<AppState>,
) -> Result<Json<SessionView>, ConsoleError> {
    let credential = state.session.ensure_valid(Utc::now()).await?;
    Ok(Json(SessionView::from(&credential)))
}

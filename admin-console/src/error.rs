use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::review::{ReviewRecord, ReviewStatus};

/// Raw outcome of a call to one of the backends, before it is mapped into
/// the console's error taxonomy by the component that made the call.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Review {review_id} is already {status} and cannot be decided again")]
    InvalidTransition {
        review_id: String,
        status: ReviewStatus,
    },

    #[error("A decision for review {0} is already being submitted")]
    DecisionInFlight(String),

    #[error("Review {review_id} was already decided by another moderator")]
    Conflict {
        review_id: String,
        latest: Option<Box<ReviewRecord>>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ConsoleError {
    /// Message suitable for showing to a moderator.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::InvalidCredentials(detail) => {
                format!("Login failed: {}. Check your email and password.", detail)
            }
            ConsoleError::Unauthenticated => "Please log in to continue.".to_string(),
            ConsoleError::RefreshFailed(_) => {
                "Your session expired, please log in again.".to_string()
            }
            ConsoleError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ConsoleError::Server { message, .. } => message.clone(),
            ConsoleError::InvalidTransition { status, .. } => {
                format!("This review is already {} and cannot be changed.", status)
            }
            ConsoleError::DecisionInFlight(_) => {
                "This review is already being submitted. Please wait.".to_string()
            }
            ConsoleError::Conflict { .. } => {
                "Another moderator already decided this review. Reload it before trying again."
                    .to_string()
            }
            ConsoleError::NotFound(what) => format!("{} not found.", what),
            ConsoleError::Validation(_) => "Please correct the highlighted fields.".to_string(),
            ConsoleError::Storage(_) | ConsoleError::Config(_) | ConsoleError::Internal(_) => {
                "Something went wrong on our side.".to_string()
            }
        }
    }

    /// Whether the caller must send the moderator back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ConsoleError::Unauthenticated | ConsoleError::RefreshFailed(_)
        )
    }
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            latest: Option<ReviewRecord>,
            #[serde(skip_serializing_if = "std::ops::Not::not")]
            login_required: bool,
        }

        let message = self.user_message();
        let login_required = self.requires_login();
        let (status, details, latest) = match self {
            ConsoleError::InvalidCredentials(detail) => (StatusCode::UNAUTHORIZED, Some(detail), None),
            ConsoleError::Unauthenticated => (StatusCode::UNAUTHORIZED, None, None),
            ConsoleError::RefreshFailed(detail) => (StatusCode::UNAUTHORIZED, Some(detail), None),
            ConsoleError::Network(detail) => (StatusCode::BAD_GATEWAY, Some(detail), None),
            ConsoleError::Server { status, .. } => (
                StatusCode::from_u16(status)
                    .ok()
                    .filter(|s| s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                None,
                None,
            ),
            ConsoleError::InvalidTransition { review_id, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, Some(review_id), None)
            }
            ConsoleError::DecisionInFlight(review_id) => {
                (StatusCode::TOO_MANY_REQUESTS, Some(review_id), None)
            }
            ConsoleError::Conflict { latest, .. } => {
                (StatusCode::CONFLICT, None, latest.map(|record| *record))
            }
            ConsoleError::NotFound(_) => (StatusCode::NOT_FOUND, None, None),
            ConsoleError::Validation(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Some(err.to_string()), None)
            }
            ConsoleError::Storage(detail) => {
                tracing::error!(error = %detail, "Credential storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
            ConsoleError::Config(err) => {
                tracing::error!(error = %err, "Configuration failure");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
            ConsoleError::Internal(err) => {
                tracing::error!(error = ?err, "Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                details,
                latest,
                login_required,
            }),
        )
            .into_response()
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_failure_asks_for_login() {
        let err = ConsoleError::RefreshFailed("401".to_string());
        assert!(err.requires_login());
        assert_eq!(
            err.user_message(),
            "Your session expired, please log in again."
        );
    }

    #[test]
    fn network_failure_does_not_require_login() {
        let err = ConsoleError::Network("connection refused".to_string());
        assert!(!err.requires_login());
    }

    #[test]
    fn server_error_surfaces_backend_message() {
        let err = ConsoleError::Server {
            status: 503,
            message: "maintenance window".to_string(),
        };
        assert_eq!(err.user_message(), "maintenance window");
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = ConsoleError::Conflict {
            review_id: "r1".to_string(),
            latest: None,
        };
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn backend_conflict_is_detected_by_status() {
        let err = BackendError::Status {
            status: 409,
            detail: "already reviewed".to_string(),
        };
        assert!(err.is_conflict());
        assert!(!BackendError::Transport("timeout".to_string()).is_conflict());
    }

    async fn body_json(err: ConsoleError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn expired_session_response_flags_login() {
        let body = body_json(ConsoleError::Unauthenticated).await;
        assert_eq!(body["login_required"], true);
        assert_eq!(body["error"], "Please log in to continue.");

        let body = body_json(ConsoleError::Network("timeout".to_string())).await;
        assert!(body.get("login_required").is_none());
    }
}

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    auth::{current_session_handler, login_handler, logout_handler},
    metrics::metrics,
    reviews::{
        back_handler, decide_review_handler, held_stats_handler, list_reviews_handler,
        select_review_handler, selection_handler,
    },
};
use crate::middleware::request_id::{request_id_middleware, REQUEST_ID_HEADER};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/session", get(current_session_handler))
        .route("/session/login", post(login_handler))
        .route("/session/logout", post(logout_handler))
        .route("/reviews", get(list_reviews_handler))
        .route("/reviews/stats", get(held_stats_handler))
        .route("/reviews/selection", get(selection_handler))
        .route("/reviews/back", post(back_handler))
        .route("/reviews/:id/select", post(select_review_handler))
        .route("/reviews/:id/decision", post(decide_review_handler))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        // Outermost, so the trace span sees the assigned id.
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

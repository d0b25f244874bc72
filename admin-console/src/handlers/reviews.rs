use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{DecisionRequest, ReviewRecord};
use crate::review::{ReviewFilter, ReviewStats, StatusFilter, WorkflowState};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewListParams {
    pub status: Option<StatusFilter>,
    pub fraud_score_min: Option<f64>,
    pub fraud_score_max: Option<f64>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ReviewListParams {
    fn filter(&self) -> ReviewFilter {
        ReviewFilter {
            status: self.status.unwrap_or_default(),
            fraud_score_min: self.fraud_score_min,
            fraud_score_max: self.fraud_score_max,
            date_from: self.date_from,
            date_to: self.date_to,
            search: self.search.clone(),
        }
    }

    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// A review as listed, with its raised fraud indicators spelled out.
#[derive(Debug, Serialize)]
pub struct ReviewItem {
    #[serde(flatten)]
    pub record: ReviewRecord,
    pub active_indicators: Vec<&'static str>,
    pub indicator_count: usize,
}

impl From<ReviewRecord> for ReviewItem {
    fn from(record: ReviewRecord) -> Self {
        Self {
            active_indicators: record.fraud_indicators.active(),
            indicator_count: record.fraud_indicators.count(),
            record,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    pub items: Vec<ReviewItem>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub stats: ReviewStats,
}

/// GET /reviews
#[tracing::instrument(skip_all)]
pub async fn list_reviews_handler(
    State(state): State<AppState>,
    Query(params): Query<ReviewListParams>,
) -> Result<Json<ReviewListResponse>, ConsoleError> {
    let filter = params.filter();
    let page = state
        .workflow
        .list(&filter, params.page(), params.limit())
        .await?;

    let mut records = state.records.lock().await;
    records.replace_all(page.items, page.total);
    let items = records.select(&filter).unwrap_or_default();

    Ok(Json(ReviewListResponse {
        stats: records.stats(),
        total: records.total(),
        items: items.into_iter().map(ReviewItem::from).collect(),
        page: page.page,
        limit: page.limit,
    }))
}

#[derive(Debug, Serialize)]
pub struct HeldReviewsSummary {
    pub loaded: bool,
    pub total: u64,
    pub stats: ReviewStats,
}

/// GET /reviews/stats
///
/// Summary of the records the console currently holds; no backend call.
pub async fn held_stats_handler(State(state): State<AppState>) -> Json<HeldReviewsSummary> {
    let records = state.records.lock().await;
    Json(HeldReviewsSummary {
        loaded: records.is_loaded(),
        total: records.total(),
        stats: records.stats(),
    })
}

/// POST /reviews/{id}/select
pub async fn select_review_handler(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
) -> Result<Json<ReviewRecord>, ConsoleError> {
    let record = resolve_record(&state, &review_id).await?;
    state.workflow.select(record.clone()).await;
    Ok(Json(record))
}

/// POST /reviews/{id}/decision
#[tracing::instrument(skip_all, fields(review_id = %review_id))]
pub async fn decide_review_handler(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
    Json(decision): Json<DecisionRequest>,
) -> Result<Json<ReviewRecord>, ConsoleError> {
    let record = resolve_record(&state, &review_id).await?;

    // The decision runs in its own task so a client hanging up mid-request
    // neither cancels it nor skips reconciling the backend's answer.
    let task_state = state.clone();
    let decision_task = tokio::spawn(
        async move {
            let outcome = task_state
                .workflow
                .decide(&record, decision.action, decision.notes)
                .await;
            match &outcome {
                Ok(updated) => {
                    task_state.records.lock().await.reconcile(updated);
                }
                Err(ConsoleError::Conflict {
                    latest: Some(latest),
                    ..
                }) => {
                    task_state.records.lock().await.reconcile(latest);
                }
                Err(_) => {}
            }
            outcome
        }
        .in_current_span(),
    );

    decision_task
        .await
        .map_err(|e| ConsoleError::Internal(anyhow::anyhow!("decision task failed: {}", e)))?
        .map(Json)
}

/// POST /reviews/back
pub async fn back_handler(State(state): State<AppState>) -> StatusCode {
    state.workflow.back().await;
    StatusCode::NO_CONTENT
}

/// GET /reviews/selection
pub async fn selection_handler(State(state): State<AppState>) -> Json<WorkflowState> {
    Json(state.workflow.state().await)
}

/// The selected copy wins, then the loaded record set, then the backend.
async fn resolve_record(state: &AppState, review_id: &str) -> ConsoleResult<ReviewRecord> {
    if let Some(selected) = state
        .workflow
        .selected()
        .await
        .filter(|record| record.id == review_id)
    {
        return Ok(selected);
    }

    if let Some(loaded) = state.records.lock().await.find(review_id).cloned() {
        return Ok(loaded);
    }

    state.workflow.fetch(review_id).await
}

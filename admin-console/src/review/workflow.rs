//! Selection and decision lifecycle for a single review record.
//!
//! The controller only adopts state confirmed by the review backend; it never
//! mutates a record locally in anticipation of a response.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{BackendError, ConsoleError, ConsoleResult};
use crate::models::{DecisionRequest, ReviewAction, ReviewPage, ReviewRecord};
use crate::review::query::{select, ReviewFilter};
use crate::services::metrics;
use crate::services::review_client::ReviewBackend;
use crate::session::SessionManager;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Listing,
    Viewing {
        record: ReviewRecord,
    },
    Submitting {
        record: ReviewRecord,
        action: ReviewAction,
    },
}

impl WorkflowState {
    pub fn record(&self) -> Option<&ReviewRecord> {
        match self {
            WorkflowState::Listing => None,
            WorkflowState::Viewing { record } | WorkflowState::Submitting { record, .. } => {
                Some(record)
            }
        }
    }
}

struct Selection {
    state: WorkflowState,
    /// Bumped whenever the selected record changes, so a late decision
    /// response can tell whether its record is still on screen.
    generation: u64,
}

impl Selection {
    /// Leave `Submitting`, unless the moderator has moved on in the meantime.
    fn settle(&mut self, generation: u64, record: ReviewRecord) {
        if self.generation == generation {
            self.state = WorkflowState::Viewing { record };
        } else {
            tracing::debug!(review_id = %record.id, "Selection changed before decision settled");
        }
    }
}

/// Puts the selection back to `Viewing` if a `decide` future is dropped
/// while its request is still outstanding.
struct SubmitGuard {
    selection: Arc<Mutex<Selection>>,
    generation: u64,
    record: Option<ReviewRecord>,
}

impl SubmitGuard {
    fn disarm(&mut self) {
        self.record = None;
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        let Some(record) = self.record.take() else {
            return;
        };
        let generation = self.generation;
        tracing::warn!(review_id = %record.id, "Decision abandoned before the backend answered");

        if let Ok(mut selection) = self.selection.try_lock() {
            selection.settle(generation, record);
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let selection = self.selection.clone();
            runtime.spawn(async move {
                selection.lock().await.settle(generation, record);
            });
        }
    }
}

pub struct ReviewWorkflow {
    session: Arc<SessionManager>,
    backend: Arc<dyn ReviewBackend>,
    selection: Arc<Mutex<Selection>>,
}

impl ReviewWorkflow {
    pub fn new(session: Arc<SessionManager>, backend: Arc<dyn ReviewBackend>) -> Self {
        Self {
            session,
            backend,
            selection: Arc::new(Mutex::new(Selection {
                state: WorkflowState::Listing,
                generation: 0,
            })),
        }
    }

    pub async fn state(&self) -> WorkflowState {
        self.selection.lock().await.state.clone()
    }

    pub async fn selected(&self) -> Option<ReviewRecord> {
        self.selection.lock().await.state.record().cloned()
    }

    /// Show `record` in the detail view.
    pub async fn select(&self, record: ReviewRecord) {
        let mut selection = self.selection.lock().await;
        tracing::debug!(review_id = %record.id, "Review selected");
        selection.state = WorkflowState::Viewing { record };
        selection.generation += 1;
    }

    /// Return to the list. An in-flight decision keeps running; its result
    /// is still returned to the caller but no longer shown as selected.
    pub async fn back(&self) {
        let mut selection = self.selection.lock().await;
        selection.state = WorkflowState::Listing;
        selection.generation += 1;
    }

    /// Approve or reject a pending review.
    ///
    /// Only `pending` records may be decided; anything else fails with
    /// `InvalidTransition` before any network call. On success the record
    /// returned by the backend is adopted as-is, provided it is the same
    /// review and internally consistent. A `409` surfaces as `Conflict`
    /// carrying the latest server copy when it can be fetched. Dropping the
    /// returned future mid-request puts the selection back to `Viewing`.
    #[tracing::instrument(skip_all, fields(review_id = %record.id, action = %action))]
    pub async fn decide(
        &self,
        record: &ReviewRecord,
        action: ReviewAction,
        notes: Option<String>,
    ) -> ConsoleResult<ReviewRecord> {
        if !record.is_pending() {
            tracing::warn!(status = %record.review_status, "Rejected decision on a decided review");
            metrics::record_decision(action.as_str(), "invalid_transition");
            return Err(ConsoleError::InvalidTransition {
                review_id: record.id.clone(),
                status: record.review_status,
            });
        }

        let generation = {
            let mut selection = self.selection.lock().await;
            let already_selected = match &selection.state {
                WorkflowState::Submitting { record: current, .. } if current.id == record.id => {
                    return Err(ConsoleError::DecisionInFlight(record.id.clone()));
                }
                WorkflowState::Viewing { record: current } => current.id == record.id,
                _ => false,
            };
            if !already_selected {
                selection.generation += 1;
            }
            selection.state = WorkflowState::Submitting {
                record: record.clone(),
                action,
            };
            selection.generation
        };

        let mut guard = SubmitGuard {
            selection: self.selection.clone(),
            generation,
            record: Some(record.clone()),
        };

        let (outcome, shown) = self.submit(record, action, notes).await;
        self.selection.lock().await.settle(generation, shown);
        guard.disarm();
        outcome
    }

    /// Send the decision. Returns the outcome and the record the detail view
    /// should show afterwards.
    async fn submit(
        &self,
        record: &ReviewRecord,
        action: ReviewAction,
        notes: Option<String>,
    ) -> (ConsoleResult<ReviewRecord>, ReviewRecord) {
        let credential = match self.session.ensure_valid(Utc::now()).await {
            Ok(credential) => credential,
            Err(e) => return (Err(e), record.clone()),
        };

        let request = DecisionRequest {
            action,
            notes: notes.filter(|n| !n.trim().is_empty()),
        };

        match self
            .backend
            .submit_decision(&credential.access_token, &record.id, &request)
            .await
        {
            Ok(updated) if updated.id != record.id || !updated.is_consistent() => {
                metrics::record_decision(action.as_str(), "failure");
                tracing::error!(
                    returned_id = %updated.id,
                    review_status = %updated.review_status,
                    "Backend answered a decision with a malformed record"
                );
                let err = ConsoleError::Server {
                    status: 502,
                    message: "Review backend returned an inconsistent record".to_string(),
                };
                (Err(err), record.clone())
            }
            Ok(updated) => {
                metrics::record_decision(action.as_str(), "success");
                if updated.review_status != action.resulting_status() {
                    tracing::warn!(
                        review_status = %updated.review_status,
                        "Backend settled the review differently than requested"
                    );
                }
                tracing::info!(
                    admin_id = %credential.admin.id,
                    review_status = %updated.review_status,
                    "Review decision accepted"
                );
                (Ok(updated.clone()), updated)
            }
            Err(e) if e.is_conflict() => {
                metrics::record_decision(action.as_str(), "conflict");
                tracing::warn!("Review was already decided by another moderator");

                let latest = match self
                    .backend
                    .get_review(&credential.access_token, &record.id)
                    .await
                {
                    Ok(latest) => Some(latest),
                    Err(fetch_err) => {
                        tracing::warn!(error = %fetch_err, "Failed to reload conflicting review");
                        None
                    }
                };

                let shown = latest.clone().unwrap_or_else(|| record.clone());
                let err = ConsoleError::Conflict {
                    review_id: record.id.clone(),
                    latest: latest.map(Box::new),
                };
                (Err(err), shown)
            }
            Err(e) => {
                metrics::record_decision(action.as_str(), "failure");
                tracing::error!(error = %e, "Review decision failed");
                (Err(ConsoleError::Network(e.to_string())), record.clone())
            }
        }
    }

    /// Fetch one page of reviews. The filter is sent to the backend and also
    /// re-applied locally so ordering and filtering hold either way.
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        page: u32,
        limit: u32,
    ) -> ConsoleResult<ReviewPage> {
        let credential = self.session.ensure_valid(Utc::now()).await?;
        let fetched = self
            .backend
            .list_reviews(&credential.access_token, filter, page, limit)
            .await
            .map_err(fetch_error)?;

        Ok(ReviewPage {
            items: select(&fetched.items, filter),
            ..fetched
        })
    }

    /// Fetch the backend's current copy of one review.
    pub async fn fetch(&self, review_id: &str) -> ConsoleResult<ReviewRecord> {
        if matches!(review_id.trim(), "" | "." | "..") {
            return Err(ConsoleError::NotFound(format!("Review {}", review_id)));
        }
        let credential = self.session.ensure_valid(Utc::now()).await?;
        self.backend
            .get_review(&credential.access_token, review_id)
            .await
            .map_err(|e| match e.status() {
                Some(404) => ConsoleError::NotFound(format!("Review {}", review_id)),
                _ => fetch_error(e),
            })
    }
}

fn fetch_error(err: BackendError) -> ConsoleError {
    match err {
        BackendError::Transport(detail) => ConsoleError::Network(detail),
        BackendError::Status { status: 401, .. } => ConsoleError::Unauthenticated,
        BackendError::Status { status, detail } => ConsoleError::Server {
            status,
            message: detail,
        },
        BackendError::Decode(detail) => ConsoleError::Server {
            status: 502,
            message: detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminProfile, AdminRole, Credential, ReviewStatus, Reviewer};
    use crate::review::query::tests::record;
    use crate::review::query::StatusFilter;
    use crate::review::record_set::ReviewRecordSet;
    use crate::services::auth_client::HttpAuthBackend;
    use crate::services::credential_store::CredentialStore;
    use crate::services::review_client::HttpReviewBackend;
    use chrono::Duration;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn workflow_for(server: &MockServer) -> ReviewWorkflow {
        let store = CredentialStore::in_memory();
        let now = Utc::now();
        store
            .set(Credential {
                access_token: "t1".to_string(),
                token_type: "bearer".to_string(),
                issued_at: now,
                expires_at: now + Duration::hours(1),
                admin: AdminProfile {
                    id: "1".to_string(),
                    email: "mod@x.com".to_string(),
                    username: "mod".to_string(),
                    role: AdminRole::Moderator,
                    last_login_at: None,
                },
            })
            .await
            .unwrap();

        let client = reqwest::Client::new();
        let session = Arc::new(SessionManager::new(
            store,
            Arc::new(HttpAuthBackend::new(client.clone(), server.uri())),
        ));
        ReviewWorkflow::new(
            session,
            Arc::new(HttpReviewBackend::new(client, server.uri())),
        )
    }

    fn decided(pending: &ReviewRecord, status: ReviewStatus, notes: &str) -> ReviewRecord {
        let mut updated = pending.clone();
        updated.review_status = status;
        updated.reviewer = Some(Reviewer {
            id: "1".to_string(),
            email: "mod@x.com".to_string(),
            username: Some("mod".to_string()),
        });
        updated.review_notes = Some(notes.to_string());
        updated.reviewed_at = Some(Utc::now());
        updated
    }

    #[tokio::test]
    async fn approve_adopts_server_record() {
        let server = MockServer::start().await;
        let pending = record("r1", ReviewStatus::Pending, 0.8, Utc::now());
        let approved = decided(&pending, ReviewStatus::Approved, "looks fine");

        Mock::given(method("POST"))
            .and(path("/reviews/r1/decision"))
            .and(body_json(json!({ "action": "approve", "notes": "looks fine" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&approved))
            .expect(1)
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        let mut records = ReviewRecordSet::new();
        records.replace_all(
            vec![
                pending.clone(),
                record("r2", ReviewStatus::Pending, 0.3, Utc::now()),
            ],
            2,
        );

        workflow.select(pending.clone()).await;
        let updated = workflow
            .decide(&pending, ReviewAction::Approve, Some("looks fine".to_string()))
            .await
            .unwrap();

        assert_eq!(updated.review_status, ReviewStatus::Approved);
        assert!(updated.reviewer.is_some());
        assert!(updated.reviewed_at.is_some());
        assert_eq!(
            workflow.state().await,
            WorkflowState::Viewing {
                record: updated.clone()
            }
        );

        assert!(records.reconcile(&updated));
        let still_pending = records.select(&ReviewFilter::default()).unwrap();
        assert!(still_pending.iter().all(|r| r.id != "r1"));
    }

    #[tokio::test]
    async fn decided_record_is_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        let pending = record("r1", ReviewStatus::Pending, 0.8, Utc::now());
        let approved = decided(&pending, ReviewStatus::Approved, "ok");
        workflow.select(approved.clone()).await;

        let err = workflow
            .decide(&approved, ReviewAction::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::InvalidTransition {
                status: ReviewStatus::Approved,
                ..
            }
        ));
        assert_eq!(workflow.state().await, WorkflowState::Viewing { record: approved });
    }

    #[tokio::test]
    async fn conflict_keeps_local_record_pending() {
        let server = MockServer::start().await;
        let pending = record("r1", ReviewStatus::Pending, 0.8, Utc::now());
        let rejected_elsewhere = decided(&pending, ReviewStatus::Rejected, "spam ring");

        Mock::given(method("POST"))
            .and(path("/reviews/r1/decision"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({ "detail": "already reviewed" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reviews/r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&rejected_elsewhere))
            .expect(1)
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        let mut records = ReviewRecordSet::new();
        records.replace_all(vec![pending.clone()], 1);
        workflow.select(pending.clone()).await;

        let err = workflow
            .decide(&pending, ReviewAction::Approve, None)
            .await
            .unwrap_err();

        let latest = match err {
            ConsoleError::Conflict { review_id, latest } => {
                assert_eq!(review_id, "r1");
                latest.expect("latest copy fetched")
            }
            other => panic!("unexpected error: {:?}", other),
        };
        assert_eq!(latest.review_status, ReviewStatus::Rejected);
        assert_eq!(records.find("r1").unwrap().review_status, ReviewStatus::Pending);
        assert_eq!(
            workflow.selected().await.unwrap().review_status,
            ReviewStatus::Rejected
        );
    }

    #[tokio::test]
    async fn network_failure_leaves_record_selected_and_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reviews/r1/decision"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        let pending = record("r1", ReviewStatus::Pending, 0.8, Utc::now());
        workflow.select(pending.clone()).await;

        let err = workflow
            .decide(&pending, ReviewAction::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Network(_)));
        assert_eq!(workflow.state().await, WorkflowState::Viewing { record: pending });
    }

    #[tokio::test]
    async fn back_during_submission_drops_selection_but_returns_result() {
        let server = MockServer::start().await;
        let pending = record("r1", ReviewStatus::Pending, 0.8, Utc::now());
        let approved = decided(&pending, ReviewStatus::Approved, "fine");

        Mock::given(method("POST"))
            .and(path("/reviews/r1/decision"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(&approved)
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let workflow = Arc::new(workflow_for(&server).await);
        workflow.select(pending.clone()).await;

        let submitting = {
            let workflow = workflow.clone();
            let pending = pending.clone();
            tokio::spawn(async move {
                workflow
                    .decide(&pending, ReviewAction::Approve, None)
                    .await
            })
        };

        while !matches!(workflow.state().await, WorkflowState::Submitting { .. }) {
            tokio::task::yield_now().await;
        }
        let err = workflow
            .decide(&pending, ReviewAction::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::DecisionInFlight(_)));

        workflow.back().await;

        let updated = submitting.await.unwrap().unwrap();
        assert_eq!(updated.review_status, ReviewStatus::Approved);
        assert_eq!(workflow.state().await, WorkflowState::Listing);
    }

    #[tokio::test]
    async fn abandoned_decision_does_not_block_a_retry() {
        let server = MockServer::start().await;
        let pending = record("r1", ReviewStatus::Pending, 0.8, Utc::now());
        let approved = decided(&pending, ReviewStatus::Approved, "fine");

        Mock::given(method("POST"))
            .and(path("/reviews/r1/decision"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(&approved)
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .expect(1..=2)
            .mount(&server)
            .await;

        let workflow = Arc::new(workflow_for(&server).await);
        workflow.select(pending.clone()).await;

        let submitting = {
            let workflow = workflow.clone();
            let pending = pending.clone();
            tokio::spawn(async move {
                workflow
                    .decide(&pending, ReviewAction::Approve, None)
                    .await
            })
        };
        while !matches!(workflow.state().await, WorkflowState::Submitting { .. }) {
            tokio::task::yield_now().await;
        }

        submitting.abort();
        assert!(submitting.await.unwrap_err().is_cancelled());
        assert_eq!(
            workflow.state().await,
            WorkflowState::Viewing {
                record: pending.clone()
            }
        );

        let updated = workflow
            .decide(&pending, ReviewAction::Approve, None)
            .await
            .unwrap();
        assert_eq!(updated.review_status, ReviewStatus::Approved);
    }

    #[tokio::test]
    async fn inconsistent_decision_response_is_not_adopted() {
        let server = MockServer::start().await;
        let pending = record("r1", ReviewStatus::Pending, 0.8, Utc::now());
        let mut half_decided = pending.clone();
        half_decided.review_status = ReviewStatus::Approved;

        Mock::given(method("POST"))
            .and(path("/reviews/r1/decision"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&half_decided))
            .expect(1)
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        workflow.select(pending.clone()).await;

        let err = workflow
            .decide(&pending, ReviewAction::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Server { status: 502, .. }));
        assert_eq!(workflow.state().await, WorkflowState::Viewing { record: pending });
    }

    #[tokio::test]
    async fn list_reapplies_filter_locally() {
        let server = MockServer::start().await;
        let now = Utc::now();
        let older = record("r1", ReviewStatus::Pending, 0.8, now - Duration::hours(2));
        let newer = record("r2", ReviewStatus::Pending, 0.9, now);
        let approved = decided(
            &record("r3", ReviewStatus::Pending, 0.9, now),
            ReviewStatus::Approved,
            "ok",
        );

        Mock::given(method("GET"))
            .and(path("/reviews"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [older, approved, newer],
                "total": 3,
                "page": 1,
                "limit": 20
            })))
            .expect(1)
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        let filter = ReviewFilter {
            status: StatusFilter::Pending,
            ..Default::default()
        };
        let page = workflow.list(&filter, 1, 20).await.unwrap();

        let ids: Vec<_> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn missing_review_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reviews/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "missing" })))
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        let err = workflow.fetch("nope").await.unwrap_err();
        assert!(matches!(err, ConsoleError::NotFound(_)));
    }

    #[tokio::test]
    async fn dot_segment_ids_are_not_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let workflow = workflow_for(&server).await;
        for id in ["..", ".", " "] {
            let err = workflow.fetch(id).await.unwrap_err();
            assert!(matches!(err, ConsoleError::NotFound(_)));
        }
    }
}

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod review;
pub mod services;
pub mod session;
pub mod startup;

use config::Settings;
use error::ConsoleResult;
use review::{ReviewRecordSet, ReviewWorkflow};
use services::{
    auth_client::HttpAuthBackend,
    build_http_client,
    credential_store::{CredentialStore, FileSlot},
    review_client::{HttpReviewBackend, ReviewBackend},
};
use session::SessionManager;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state: the session, the review workflow, and the
/// record set the console last loaded.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub workflow: Arc<ReviewWorkflow>,
    pub records: Arc<Mutex<ReviewRecordSet>>,
}

impl AppState {
    pub fn new(session: Arc<SessionManager>, review_backend: Arc<dyn ReviewBackend>) -> Self {
        let workflow = Arc::new(ReviewWorkflow::new(session.clone(), review_backend));
        Self {
            session,
            workflow,
            records: Arc::new(Mutex::new(ReviewRecordSet::new())),
        }
    }

    /// Wire the HTTP backends and the file-backed session slot from settings.
    pub fn from_settings(settings: &Settings) -> ConsoleResult<Self> {
        let client = build_http_client(&settings.backend)?;
        let slot = FileSlot::new(&settings.session.store_dir);
        tracing::debug!(path = %slot.path().display(), "Using persisted session slot");
        let store = CredentialStore::open(Arc::new(slot));
        let auth = HttpAuthBackend::new(client.clone(), settings.backend.url.clone());
        let reviews = HttpReviewBackend::new(client, settings.backend.url.clone());

        let session = Arc::new(SessionManager::new(store, Arc::new(auth)));
        Ok(Self::new(session, Arc::new(reviews)))
    }
}

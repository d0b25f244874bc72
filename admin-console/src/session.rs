//! Admin session lifecycle: login, logout, and expiry-aware validation with
//! transparent, de-duplicated refresh.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use secrecy::Secret;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{BackendError, ConsoleError, ConsoleResult};
use crate::models::{AdminProfile, Credential};
use crate::services::auth_client::AuthBackend;
use crate::services::credential_store::CredentialStore;
use crate::services::metrics;

type RefreshOutcome = Result<Credential, String>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;
type InflightRefresh = Arc<Mutex<Option<(u64, SharedRefresh)>>>;

pub struct SessionManager {
    store: CredentialStore,
    auth: Arc<dyn AuthBackend>,
    /// The single outstanding refresh. The refresh removes its own entry
    /// when it finishes, even if every caller has stopped waiting.
    inflight: InflightRefresh,
    next_refresh_id: AtomicU64,
}

impl SessionManager {
    pub fn new(store: CredentialStore, auth: Arc<dyn AuthBackend>) -> Self {
        Self {
            store,
            auth,
            inflight: Arc::new(Mutex::new(None)),
            next_refresh_id: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub async fn current_credential(&self) -> Option<Credential> {
        self.store.get().await
    }

    pub async fn current_admin(&self) -> Option<AdminProfile> {
        self.store.get().await.map(|credential| credential.admin)
    }

    /// Authenticate against the auth backend. Sent exactly once; never retried.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: Secret<String>) -> ConsoleResult<Credential> {
        let response = self.auth.login(email, &password).await;
        let issued_at = Utc::now();

        let tokens = match response {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(error = %err, "Admin login rejected");
                metrics::record_login("failure");
                return Err(login_error(err));
            }
        };

        let credential = Credential::from_token_response(tokens, issued_at).ok_or_else(|| {
            metrics::record_login("failure");
            ConsoleError::Server {
                status: 502,
                message: "Auth backend returned an invalid credential".to_string(),
            }
        })?;

        self.store.set(credential.clone()).await?;
        metrics::record_login("success");

        tracing::info!(
            admin_id = %credential.admin.id,
            role = %credential.admin.role,
            expires_at = %credential.expires_at,
            "Admin logged in successfully"
        );

        Ok(credential)
    }

    /// End the session. Local state is always dropped; telling the backend is
    /// best effort.
    pub async fn logout(&self) {
        let current = self.store.get().await;

        if let Err(e) = self.store.clear().await {
            tracing::error!(error = %e, "Failed to remove persisted session during logout");
        }

        let Some(credential) = current else {
            return;
        };

        match self.auth.logout(&credential.access_token).await {
            Ok(()) => tracing::info!(admin_id = %credential.admin.id, "Token revoked successfully"),
            Err(e) => tracing::warn!(
                admin_id = %credential.admin.id,
                error = %e,
                "Failed to revoke token during logout"
            ),
        }
    }

    /// Return a credential valid at `now`, refreshing it if it has expired.
    ///
    /// A valid credential is returned without any network call. An expired
    /// one triggers at most one refresh, shared by every concurrent caller;
    /// on failure the store is cleared and the caller must log in again.
    pub async fn ensure_valid(&self, now: DateTime<Utc>) -> ConsoleResult<Credential> {
        let Some(current) = self.store.get().await else {
            return Err(ConsoleError::Unauthenticated);
        };

        if current.is_valid_at(now) {
            return Ok(current);
        }

        self.refresh(now).await
    }

    async fn refresh(&self, now: DateTime<Utc>) -> ConsoleResult<Credential> {
        let pending = {
            let mut inflight = self.inflight.lock().await;
            match inflight.as_ref() {
                Some((_, pending)) => pending.clone(),
                None => {
                    // A refresh may have completed between our read of the
                    // store and taking the lock; use its result.
                    let stale = match self.store.get().await {
                        Some(latest) if latest.is_valid_at(now) => return Ok(latest),
                        Some(latest) => latest,
                        None => return Err(ConsoleError::Unauthenticated),
                    };

                    let id = self.next_refresh_id.fetch_add(1, Ordering::Relaxed);
                    let auth = self.auth.clone();
                    let store = self.store.clone();
                    let slot = self.inflight.clone();
                    let pending = async move {
                        let outcome = refresh_once(auth, store, stale).await;
                        let mut entry = slot.lock().await;
                        if entry.as_ref().is_some_and(|(current, _)| *current == id) {
                            *entry = None;
                        }
                        outcome
                    }
                    .boxed()
                    .shared();
                    *inflight = Some((id, pending.clone()));
                    pending
                }
            }
        };

        pending.await.map_err(ConsoleError::RefreshFailed)
    }
}

async fn refresh_once(
    auth: Arc<dyn AuthBackend>,
    store: CredentialStore,
    stale: Credential,
) -> RefreshOutcome {
    tracing::info!(admin_id = %stale.admin.id, "Refreshing admin session");

    let response = auth.refresh(&stale.access_token).await;
    let issued_at = Utc::now();

    let failure = match response {
        Ok(tokens) => match Credential::from_token_response(tokens, issued_at) {
            Some(fresh) => match store.replace_if_current(&stale.access_token, fresh.clone()).await {
                Ok(true) => {
                    metrics::record_refresh("success");
                    tracing::info!(
                        admin_id = %fresh.admin.id,
                        expires_at = %fresh.expires_at,
                        "Admin session refreshed"
                    );
                    return Ok(fresh);
                }
                Ok(false) => "session changed while refreshing".to_string(),
                Err(e) => e.to_string(),
            },
            None => "refresh returned an invalid credential".to_string(),
        },
        Err(e) => e.to_string(),
    };

    metrics::record_refresh("failure");
    tracing::warn!(admin_id = %stale.admin.id, reason = %failure, "Session refresh failed");

    if let Err(e) = store.clear_if_current(&stale.access_token).await {
        tracing::error!(error = %e, "Failed to clear session after refresh failure");
    }

    Err(failure)
}

fn login_error(err: BackendError) -> ConsoleError {
    match err {
        BackendError::Transport(detail) => ConsoleError::Network(detail),
        BackendError::Status { status, detail } if (400..500).contains(&status) => {
            ConsoleError::InvalidCredentials(detail)
        }
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

use async_trait::async_trait;
use reqwest::Client;

use super::{decode_response, segment_url};
use crate::error::BackendError;
use crate::models::{DecisionRequest, ReviewPage, ReviewRecord};
use crate::review::query::ReviewFilter;

/// The review endpoints of the moderation API.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    /// `GET /reviews` with the filter encoded as query parameters.
    async fn list_reviews(
        &self,
        access_token: &str,
        filter: &ReviewFilter,
        page: u32,
        limit: u32,
    ) -> Result<ReviewPage, BackendError>;

    /// `GET /reviews/{id}`.
    async fn get_review(
        &self,
        access_token: &str,
        review_id: &str,
    ) -> Result<ReviewRecord, BackendError>;

    /// `POST /reviews/{id}/decision`. Responds `409` when the review was
    /// already decided.
    async fn submit_decision(
        &self,
        access_token: &str,
        review_id: &str,
        decision: &DecisionRequest,
    ) -> Result<ReviewRecord, BackendError>;
}

pub struct HttpReviewBackend {
    client: Client,
    base_url: String,
}

impl HttpReviewBackend {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReviewBackend for HttpReviewBackend {
    async fn list_reviews(
        &self,
        access_token: &str,
        filter: &ReviewFilter,
        page: u32,
        limit: u32,
    ) -> Result<ReviewPage, BackendError> {
        let url = segment_url(&self.base_url, &["reviews"])?;
        let mut params = filter.query_pairs();
        params.push(("page", page.to_string()));
        params.push(("limit", limit.to_string()));

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send GET request to {}: {}", url, e);
                BackendError::from(e)
            })?;

        decode_response(response).await
    }

    async fn get_review(
        &self,
        access_token: &str,
        review_id: &str,
    ) -> Result<ReviewRecord, BackendError> {
        let url = segment_url(&self.base_url, &["reviews", review_id])?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send GET request to {}: {}", url, e);
                BackendError::from(e)
            })?;

        decode_response(response).await
    }

    async fn submit_decision(
        &self,
        access_token: &str,
        review_id: &str,
        decision: &DecisionRequest,
    ) -> Result<ReviewRecord, BackendError> {
        let url = segment_url(&self.base_url, &["reviews", review_id, "decision"])?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(access_token)
            .json(decision)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                BackendError::from(e)
            })?;

        decode_response(response).await
    }
}

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

use super::{decode_response, ensure_success, segment_url};
use crate::error::BackendError;
use crate::models::TokenResponse;

/// The auth endpoints of the moderation API.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST /auth/login`.
    async fn login(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<TokenResponse, BackendError>;

    /// `POST /auth/refresh`, authenticated with the current access token.
    async fn refresh(&self, access_token: &str) -> Result<TokenResponse, BackendError>;

    /// `POST /auth/logout`.
    async fn logout(&self, access_token: &str) -> Result<(), BackendError>;
}

pub struct HttpAuthBackend {
    client: Client,
    base_url: String,
}

impl HttpAuthBackend {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<TokenResponse, BackendError> {
        let url = segment_url(&self.base_url, &["auth", "login"])?;
        let response = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({
                "email": email,
                "password": password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                BackendError::from(e)
            })?;

        decode_response(response).await
    }

    async fn refresh(&self, access_token: &str) -> Result<TokenResponse, BackendError> {
        let url = segment_url(&self.base_url, &["auth", "refresh"])?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                BackendError::from(e)
            })?;

        decode_response(response).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), BackendError> {
        let url = segment_url(&self.base_url, &["auth", "logout"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(BackendError::from)?;

        ensure_success(response).await.map(|_| ())
    }
}

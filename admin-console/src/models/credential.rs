use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Role granted to an administrator account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Moderator,
    Admin,
    SuperAdmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Moderator => "moderator",
            AdminRole::Admin => "admin",
            AdminRole::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated administrator, as reported by the auth backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: AdminRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Success body of `POST /auth/login` and `POST /auth/refresh`.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds, relative to the moment the response was received.
    pub expires_in: i64,
    pub admin: AdminProfile,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("admin", &self.admin)
            .finish()
    }
}

/// Access token plus its metadata and the admin it belongs to.
///
/// Expiry is always stored as an absolute instant; the relative `expires_in`
/// from the wire never outlives [`Credential::from_token_response`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub admin: AdminProfile,
}

impl Credential {
    /// Build a credential from a token response received at `issued_at`.
    ///
    /// Returns `None` when the response is not valid-shaped (empty token or
    /// non-positive lifetime).
    pub fn from_token_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Option<Self> {
        if response.access_token.trim().is_empty() || response.expires_in <= 0 {
            return None;
        }

        Some(Self {
            access_token: response.access_token,
            token_type: response.token_type,
            issued_at,
            expires_at: issued_at + Duration::seconds(response.expires_in),
            admin: response.admin,
        })
    }

    /// Valid strictly before `expires_at`; the boundary instant itself is expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Structural check applied to credentials read back from storage.
    pub fn is_well_formed(&self) -> bool {
        !self.access_token.trim().is_empty()
            && !self.admin.id.is_empty()
            && !self.admin.email.is_empty()
            && self.expires_at > self.issued_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("admin", &self.admin)
            .finish()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Session summary handed to the presentation layer.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub admin: AdminProfile,
    pub expires_at: DateTime<Utc>,
}

impl From<&Credential> for SessionView {
    fn from(credential: &Credential) -> Self {
        Self {
            admin: credential.admin.clone(),
            expires_at: credential.expires_at,
        }
    }
}

//! Auth and profile calls against the hosted service.
//!
//! DESIGN
//! ======
//! [`AuthApi`] is the seam every caller goes through, so the gate and the
//! browser provider can run against counting mocks in tests. [`SupabaseClient`]
//! is a thin reqwest wrapper over the GoTrue (`/auth/v1`) and PostgREST
//! (`/rest/v1`) endpoints; response parsing is split into pure functions.
//!
//! ERROR HANDLING
//! ==============
//! "Not authenticated" answers (401/403 from `/user`, a rejected refresh
//! grant) are `Ok(None)`, not errors: they are ordinary outcomes. Anything
//! else that is not a success becomes an [`AuthError`]. Nothing is retried
//! here; callers decide how to degrade.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::SupabaseConfig;
use crate::types::{AuthError, Profile, Role, Session, User};

const PROFILE_COLUMNS: &str = "id,role,profile_completed";

/// Operations the application consumes from the auth/data service.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Resolve the account behind an access token. `Ok(None)` when the
    /// service does not accept the token.
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AuthError>;

    /// Exchange a refresh token for a new session. `Ok(None)` when the grant
    /// is rejected.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Load the `profiles` row for a user. `Ok(None)` when no row exists.
    async fn fetch_profile(&self, access_token: &str, user_id: Uuid) -> Result<Option<Profile>, AuthError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
    clock: Arc<dyn Clock>,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SupabaseConfig) -> Result<Self, AuthError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_clock(config: SupabaseConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config, clock })
    }

    #[must_use]
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.url)
    }

    fn now_secs(&self) -> i64 {
        self.clock.now_ms() / 1000
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<(u16, String), AuthError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<(u16, String), AuthError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::Request(e.to_string()))?;
    Ok((status, text))
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait::async_trait]
impl AuthApi for SupabaseClient {
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AuthError> {
        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        let (status, body) = read_response(response).await?;

        match status {
            401 | 403 => Ok(None),
            s if is_success(s) => parse_user(&body).map(Some),
            _ => Err(AuthError::Response { status, body }),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, AuthError> {
        let (status, body) = self
            .token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await?;

        match status {
            400 | 401 => {
                tracing::debug!(status, "refresh grant rejected");
                Ok(None)
            }
            s if is_success(s) => parse_session(&body, self.now_secs()).map(Some),
            _ => Err(AuthError::Response { status, body }),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let (status, body) = self
            .token_grant("password", serde_json::json!({ "email": email, "password": password }))
            .await?;

        match status {
            400 | 401 => Err(AuthError::InvalidCredentials),
            s if is_success(s) => parse_session(&body, self.now_secs()),
            _ => Err(AuthError::Response { status, body }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        let (status, body) = read_response(response).await?;

        // An already-dead token has nothing left to revoke.
        if is_success(status) || status == 401 || status == 404 {
            Ok(())
        } else {
            Err(AuthError::Response { status, body })
        }
    }

    async fn fetch_profile(&self, access_token: &str, user_id: Uuid) -> Result<Option<Profile>, AuthError> {
        let id_filter = format!("eq.{user_id}");
        let response = self
            .http
            .get(format!("{}/rest/v1/profiles", self.config.url))
            .query(&[("select", PROFILE_COLUMNS), ("id", id_filter.as_str())])
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        let (status, body) = read_response(response).await?;

        if !is_success(status) {
            return Err(AuthError::Response { status, body });
        }
        parse_profile_rows(&body)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        let role = wire
            .user_metadata
            .get("role")
            .and_then(serde_json::Value::as_str)
            .and_then(Role::parse);
        Self { id: wire.id, email: wire.email.filter(|e| !e.is_empty()), role }
    }
}

#[derive(Deserialize)]
struct WireSession {
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: WireUser,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_user(json: &str) -> Result<User, AuthError> {
    let wire: WireUser = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(wire.into())
}

/// Parse a token-grant response. `expires_at` wins; otherwise it is derived
/// from `expires_in` relative to `now_secs`.
fn parse_session(json: &str, now_secs: i64) -> Result<Session, AuthError> {
    let wire: WireSession = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    let expires_at = match (wire.expires_at, wire.expires_in) {
        (Some(at), _) => at,
        (None, Some(secs)) => now_secs.saturating_add(secs),
        (None, None) => return Err(AuthError::Parse("session has neither expires_at nor expires_in".into())),
    };
    if wire.access_token.is_empty() || wire.refresh_token.is_empty() {
        return Err(AuthError::Parse("session is missing tokens".into()));
    }

    Ok(Session {
        access_token: wire.access_token,
        refresh_token: wire.refresh_token,
        expires_at,
        user: wire.user.into(),
    })
}

fn parse_profile_rows(json: &str) -> Result<Option<Profile>, AuthError> {
    let rows: Vec<serde_json::Value> = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(rows.first().and_then(Profile::from_row))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

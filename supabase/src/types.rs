//! Session and identity model shared by the gate and the browser provider.
//!
//! DESIGN
//! ======
//! The service owns every one of these records. The application only holds a
//! read-only view, so nothing here is a source of truth for validity: a
//! `Session` must be attested by the service before it gates anything.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced when talking to the auth/data service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required configuration value is missing or unparsable.
    #[error("config error: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (DNS, connect, timeout).
    #[error("auth service request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("auth service returned status {status}")]
    Response { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("auth service response parse failed: {0}")]
    Parse(String),

    /// Email/password sign-in was refused.
    #[error("invalid login credentials")]
    InvalidCredentials,
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Account type chosen at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Individual,
    Ngo,
    Organization,
}

impl Role {
    /// Parse a stored role string. Unknown values yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "individual" => Some(Self::Individual),
            "ngo" => Some(Self::Ngo),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

/// Authenticated account as reported by the auth service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable account identifier.
    pub id: Uuid,
    /// Login email, if the account has one.
    pub email: Option<String>,
    /// Role from the account's registration metadata.
    pub role: Option<Role>,
}

/// Cached view of a service-issued session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry, epoch seconds.
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at.saturating_mul(1000)
    }

    /// True once `now_ms` has reached the access token expiry.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms()
    }
}

// =============================================================================
// PROFILE
// =============================================================================

/// Row of the `profiles` table that gates dashboard access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub role: Option<Role>,
    /// Onboarding finished; dashboard pages require it.
    pub profile_completed: bool,
}

impl Profile {
    /// Build a profile from a raw PostgREST row.
    ///
    /// Rows are read leniently: a missing or non-boolean `profile_completed`
    /// reads as `false`, and an unknown role reads as `None`. Returns `None`
    /// only when the row has no usable `id`.
    #[must_use]
    pub fn from_row(row: &serde_json::Value) -> Option<Self> {
        let id = row
            .get("id")
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())?;
        let role = row
            .get("role")
            .and_then(serde_json::Value::as_str)
            .and_then(Role::parse);
        let profile_completed = row
            .get("profile_completed")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        Some(Self { id, role, profile_completed })
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

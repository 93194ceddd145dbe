//! Session validation against the auth service.
//!
//! DESIGN
//! ======
//! The cookies only say which tokens to present; the service decides whether
//! they are good. A request with no access token costs nothing. Otherwise one
//! of two calls is made:
//!
//! - the stored expiry is inside the lead window and `sb-last-refreshed` is
//!   outside the cooldown: exchange the refresh token and write new cookies;
//! - anything else: attest the access token with `get_user`.
//!
//! ERROR HANDLING
//! ==============
//! Service failures are logged and read as "no session". Nothing is retried
//! inline; protected routes therefore fail closed.

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;
use supabase::{AuthApi, Clock, RefreshPolicy, Session};
use tracing::{debug, info, warn};

use super::cookies::{self, CookieSettings, StoredTokens};

/// Outcome of [`SessionValidator::validate`].
pub struct Validation {
    pub session: Option<Session>,
    /// Request jar plus any cookies written during validation.
    pub jar: CookieJar,
}

#[derive(Clone)]
pub struct SessionValidator {
    api: Arc<dyn AuthApi>,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
    cookies: CookieSettings,
}

impl SessionValidator {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, clock: Arc<dyn Clock>, policy: RefreshPolicy, cookies: CookieSettings) -> Self {
        Self { api, clock, policy, cookies }
    }

    pub async fn validate(&self, jar: CookieJar) -> Validation {
        let Some(tokens) = cookies::read_tokens(&jar) else {
            return Validation { session: None, jar };
        };
        let now_ms = self.clock.now_ms();

        if let Some(refresh_token) = self.due_refresh(&tokens, &jar, now_ms) {
            return self.refresh(refresh_token, jar, now_ms).await;
        }

        match self.api.get_user(&tokens.access_token).await {
            Ok(Some(user)) => {
                let session = Session {
                    access_token: tokens.access_token,
                    refresh_token: tokens.refresh_token.unwrap_or_default(),
                    expires_at: tokens.expires_at.unwrap_or_default(),
                    user,
                };
                Validation { session: Some(session), jar }
            }
            Ok(None) => {
                debug!("access token not accepted");
                Validation { session: None, jar }
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed");
                Validation { session: None, jar }
            }
        }
    }

    /// Refresh token to exchange, if a refresh is due and not throttled.
    fn due_refresh<'t>(&self, tokens: &'t StoredTokens, jar: &CookieJar, now_ms: i64) -> Option<&'t str> {
        let refresh_token = tokens.refresh_token.as_deref()?;
        let expires_at = tokens.expires_at?;
        if !self.policy.needs_refresh(expires_at, now_ms) {
            return None;
        }
        if cookies::last_refreshed(jar).is_some_and(|last| self.policy.within_cooldown(last, now_ms)) {
            debug!("refresh throttled by cooldown");
            return None;
        }
        Some(refresh_token)
    }

    async fn refresh(&self, refresh_token: &str, jar: CookieJar, now_ms: i64) -> Validation {
        match self.api.refresh_session(refresh_token).await {
            Ok(Some(session)) => {
                info!(user_id = %session.user.id, expires_at = session.expires_at, "session refreshed");
                let jar = cookies::write_session(jar, &session, self.cookies);
                let jar = cookies::mark_refreshed(jar, now_ms, self.cookies);
                Validation { session: Some(session), jar }
            }
            Ok(None) => {
                debug!("refresh token rejected, clearing session cookies");
                Validation { session: None, jar: cookies::clear_session(jar, self.cookies) }
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                Validation { session: None, jar }
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

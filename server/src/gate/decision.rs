//! Route decisions: allow the request or send it somewhere else.
//!
//! DESIGN
//! ======
//! Evaluation order is fixed:
//!
//! 1. static asset, public page, detail view, unclassified path: allow with
//!    no session lookup at all;
//! 2. creation route: allow with a session, otherwise login;
//! 3. dashboard: login without a session; with one, the profile must be
//!    complete unless the page is one of the profile self-service pages.
//!
//! The only side effects are logging and the cookies the validator writes, so
//! evaluating the same `(path, cookies)` twice gives the same decision.
//!
//! ERROR HANDLING
//! ==============
//! A failed profile lookup fails closed to the login page. A missing or
//! malformed profile row is the same as an incomplete profile.

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;
use reqwest::Url;
use supabase::{AuthApi, Session};
use tracing::{debug, warn};

use super::classify::{self, LOGIN_PATH, PROFILE_COMPLETE_PATH, PathKind};
use super::session::{SessionValidator, Validation};

/// Base used only to borrow `Url`'s query encoding.
const REDIRECT_BASE: &str = "http://gate.invalid/auth/login";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Temporary redirect to a same-origin path.
    Redirect(String),
}

/// Decision plus everything the middleware needs to build the response.
pub struct Evaluation {
    pub decision: Decision,
    pub kind: PathKind,
    pub session: Option<Session>,
    pub jar: CookieJar,
}

#[derive(Clone)]
pub struct RouteGate {
    validator: SessionValidator,
    api: Arc<dyn AuthApi>,
}

impl RouteGate {
    #[must_use]
    pub fn new(validator: SessionValidator, api: Arc<dyn AuthApi>) -> Self {
        Self { validator, api }
    }

    pub async fn evaluate(&self, path: &str, jar: CookieJar) -> Evaluation {
        let kind = classify::classify(path);
        if !kind.needs_session() {
            return Evaluation { decision: Decision::Allow, kind, session: None, jar };
        }

        let Validation { session, jar } = self.validator.validate(jar).await;
        let Some(session) = session else {
            debug!(%path, "no session for protected path");
            return Evaluation { decision: Decision::Redirect(login_redirect(path)), kind, session: None, jar };
        };

        let decision = match kind {
            PathKind::Dashboard => self.profile_decision(path, &session).await,
            _ => Decision::Allow,
        };
        Evaluation { decision, kind, session: Some(session), jar }
    }

    async fn profile_decision(&self, path: &str, session: &Session) -> Decision {
        if classify::is_profile_exempt(path) {
            return Decision::Allow;
        }

        match self.api.fetch_profile(&session.access_token, session.user.id).await {
            Ok(Some(profile)) if profile.profile_completed => Decision::Allow,
            Ok(_) => {
                debug!(user_id = %session.user.id, %path, "profile incomplete");
                Decision::Redirect(PROFILE_COMPLETE_PATH.to_owned())
            }
            Err(e) => {
                warn!(error = %e, user_id = %session.user.id, "profile lookup failed");
                Decision::Redirect(LOGIN_PATH.to_owned())
            }
        }
    }
}

/// `/auth/login?redirect=<path>`, with `path` form-urlencoded.
#[must_use]
pub fn login_redirect(path: &str) -> String {
    match Url::parse_with_params(REDIRECT_BASE, &[("redirect", path)]) {
        Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
        Err(_) => LOGIN_PATH.to_owned(),
    }
}

#[cfg(test)]
#[path = "decision_test.rs"]
mod tests;

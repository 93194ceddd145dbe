//! Auth-session state for the current browser user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Published by `SessionProvider` on every change. Route guards and
//! identity-dependent components read it to decide between rendering and a
//! login redirect.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use serde::Serialize;
use supabase::{Session, User};

/// Progress of the provider's one-time startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    /// Stored session is being checked with the service.
    Initializing,
    Ready,
}

/// Authentication state tracking the current user, session and refresh status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub is_refreshing: bool,
    /// Epoch millis of the last successful refresh.
    pub last_refreshed: Option<i64>,
    pub lifecycle: Lifecycle,
}

impl AuthState {
    /// True until startup has finished.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.lifecycle != Lifecycle::Ready
    }

    /// Startup finished and nobody is signed in.
    #[must_use]
    pub fn should_redirect_unauth(&self) -> bool {
        !self.loading() && self.user.is_none()
    }

    pub(crate) fn set_session(&mut self, session: Session, refreshed_at: Option<i64>) {
        self.user = Some(session.user.clone());
        self.session = Some(session);
        if refreshed_at.is_some() {
            self.last_refreshed = refreshed_at;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.session = None;
        self.is_refreshing = false;
        self.last_refreshed = None;
    }
}

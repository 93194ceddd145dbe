//! Where the provider keeps the session between page loads.
//!
//! The browser shell backs [`SessionStore`] with whatever persistence it has
//! (cookies shared with the server gate, local storage). [`MemorySessionStore`]
//! covers hosts without persistence and tests.

use std::sync::{Mutex, PoisonError};

use supabase::Session;

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session);
    /// Forget the session and the refresh marker.
    fn clear(&self);
    /// Epoch millis of the last successful refresh.
    fn last_refreshed(&self) -> Option<i64>;
    fn set_last_refreshed(&self, at_ms: i64);
}

#[derive(Debug, Default)]
struct Stored {
    session: Option<Session>,
    last_refreshed: Option<i64>,
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Stored>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self { inner: Mutex::new(Stored { session: Some(session), last_refreshed: None }) }
    }

    fn with_stored<T>(&self, f: impl FnOnce(&mut Stored) -> T) -> T {
        let mut stored = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stored)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.with_stored(|s| s.session.clone())
    }

    fn save(&self, session: &Session) {
        self.with_stored(|s| s.session = Some(session.clone()));
    }

    fn clear(&self) {
        self.with_stored(|s| *s = Stored::default());
    }

    fn last_refreshed(&self) -> Option<i64> {
        self.with_stored(|s| s.last_refreshed)
    }

    fn set_last_refreshed(&self, at_ms: i64) {
        self.with_stored(|s| s.last_refreshed = Some(at_ms));
    }
}

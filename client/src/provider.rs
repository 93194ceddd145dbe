//! Session provider: the live session mirror behind every auth-aware component.
//!
//! SYSTEM CONTEXT
//! ==============
//! The host creates one `SessionProvider` per tab, calls [`SessionProvider::initialize`]
//! once after hydration and forwards the auth service's push notifications to
//! [`SessionProvider::on_auth_state_change`]. Components read
//! [`SessionProvider::snapshot`] or [`SessionProvider::subscribe`].
//!
//! DESIGN
//! ======
//! - Exactly one refresh timer may be pending. Each timer is a Tokio task
//!   tagged with a generation number; scheduling aborts the previous task
//!   before installing the new one, and a task whose generation is no longer
//!   current does nothing when it wakes.
//! - Timer tasks hold a `Weak` handle, so dropping the last provider handle
//!   tears the timer down instead of keeping the provider alive.
//! - `refresh()` is mutually exclusive through an `AtomicBool` released by a
//!   drop guard, and throttled by the cooldown of [`RefreshPolicy`].
//! - Every change of session (sign-in, sign-out, a pushed token, a finished
//!   refresh) bumps a session epoch under its lock. Async work records the
//!   epoch before awaiting the service and discards its result if the epoch
//!   moved, so a refresh that outlives a sign-out cannot bring the session back.
//! - A timer that fires into a throttled or already running refresh re-arms
//!   itself; the proactive refresh chain never stops while a session exists.
//!
//! ERROR HANDLING
//! ==============
//! A failed refresh (network, service error) is logged and leaves the session
//! untouched; the timer is re-armed at the cooldown floor so the next attempt
//! happens on its own. A refresh the service rejects means the session is
//! gone: state and store are cleared as if the user signed out.
//!
//! At startup an expired stored session is exchanged with its refresh token
//! rather than attested, and only cleared if that grant is rejected too.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use supabase::{AuthApi, AuthError, Clock, RefreshPolicy, Session, SystemClock, User};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::navigate::Navigator;
use crate::state::auth::{AuthState, Lifecycle};
use crate::store::SessionStore;

const HOME_PATH: &str = "/";

/// Push notifications from the auth service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(User),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Another refresh is already running.
    InFlight,
    /// The last successful refresh is inside the cooldown.
    Throttled,
    NoSession,
    /// The service no longer accepts the refresh token.
    Rejected,
    Failed,
    /// The session changed (sign-out, sign-in) while the call was running;
    /// the result was discarded.
    Superseded,
}

/// What startup made of the stored session.
enum Restored {
    Attested(Session),
    Refreshed(Session),
    /// The service turned the session down; the store is cleared.
    Rejected,
    /// Nothing stored, or the service could not be reached.
    Absent,
}

struct Timer {
    generation: u64,
    handle: AbortHandle,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    policy: RefreshPolicy,
    state: watch::Sender<AuthState>,
    refreshing: AtomicBool,
    /// Bumped on every session change; held while the change is applied.
    epoch: Mutex<u64>,
    generation: AtomicU64,
    timer: Mutex<Option<Timer>>,
}

impl Inner {
    fn timer_slot(&self) -> MutexGuard<'_, Option<Timer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.take() {
            timer.handle.abort();
        }
    }
}

/// Releases the in-flight flag however `refresh()` exits.
struct RefreshGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.inner.refreshing.store(false, Ordering::Release);
        self.inner.state.send_if_modified(|s| std::mem::replace(&mut s.is_refreshing, false));
    }
}

/// Shared handle to the tab's session. Clones share one provider.
#[derive(Clone)]
pub struct SessionProvider {
    inner: Arc<Inner>,
}

impl SessionProvider {
    /// Provider on the system clock with the default refresh policy.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self::with_parts(api, Arc::new(SystemClock), store, navigator, RefreshPolicy::default())
    }

    #[must_use]
    pub fn with_parts(
        api: Arc<dyn AuthApi>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        policy: RefreshPolicy,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                clock,
                store,
                navigator,
                policy,
                state,
                refreshing: AtomicBool::new(false),
                epoch: Mutex::new(0),
                generation: AtomicU64::new(0),
                timer: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// The service handle, for components that query data directly.
    #[must_use]
    pub fn api(&self) -> Arc<dyn AuthApi> {
        Arc::clone(&self.inner.api)
    }

    #[must_use]
    pub fn has_pending_refresh(&self) -> bool {
        self.inner.timer_slot().is_some()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Load and check the stored session, then arm the refresh timer.
    ///
    /// Runs once per provider; later calls return immediately.
    pub async fn initialize(&self) {
        let started = self.inner.state.send_if_modified(|s| {
            if s.lifecycle != Lifecycle::Uninitialized {
                return false;
            }
            s.lifecycle = Lifecycle::Initializing;
            true
        });
        if !started {
            debug!("session provider already initialized");
            return;
        }

        let started_epoch = *self.inner.session_epoch();
        let restored = match self.inner.store.load() {
            Some(stored) => self.restore(stored).await,
            None => Restored::Absent,
        };

        let epoch = self.inner.session_epoch();
        if *epoch != started_epoch {
            debug!("session changed during startup; keeping the newer one");
            self.inner.state.send_modify(|s| s.lifecycle = Lifecycle::Ready);
            return;
        }
        let session = match restored {
            Restored::Attested(session) => Some(session),
            Restored::Refreshed(session) => {
                self.inner.store.save(&session);
                self.inner.store.set_last_refreshed(self.inner.clock.now_ms());
                Some(session)
            }
            Restored::Rejected => {
                self.inner.store.clear();
                None
            }
            Restored::Absent => None,
        };
        let last_refreshed = self.inner.store.last_refreshed();
        let expires_at = session.as_ref().map(|s| s.expires_at);
        self.inner.state.send_modify(|s| {
            if let Some(session) = session {
                s.set_session(session, last_refreshed);
            }
            s.lifecycle = Lifecycle::Ready;
        });

        match expires_at {
            Some(expires_at) => self.schedule(expires_at),
            None => debug!("no session at startup"),
        }
    }

    /// Bring a stored session back: attest a live one, exchange an expired one.
    async fn restore(&self, stored: Session) -> Restored {
        if stored.is_expired_at(self.inner.clock.now_ms()) {
            return match self.inner.api.refresh_session(&stored.refresh_token).await {
                Ok(Some(session)) => {
                    info!(user_id = %session.user.id, expires_at = session.expires_at, "expired session refreshed at startup");
                    Restored::Refreshed(session)
                }
                Ok(None) => {
                    info!("expired stored session could not be refreshed; clearing");
                    Restored::Rejected
                }
                Err(e) => {
                    warn!(error = %e, "session refresh failed at startup");
                    Restored::Absent
                }
            };
        }

        match self.inner.api.get_user(&stored.access_token).await {
            Ok(Some(user)) => Restored::Attested(Session { user, ..stored }),
            Ok(None) => {
                info!("stored session rejected; clearing");
                Restored::Rejected
            }
            Err(e) => {
                warn!(error = %e, "session check failed at startup");
                Restored::Absent
            }
        }
    }

    /// Cancel the pending timer. Used on teardown.
    pub fn shutdown(&self) {
        self.cancel_timer();
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    /// Exchange the refresh token for a new session and re-arm the timer.
    pub async fn refresh(&self) -> RefreshOutcome {
        let inner = &*self.inner;
        if inner.refreshing.swap(true, Ordering::AcqRel) {
            debug!("refresh already in flight");
            return RefreshOutcome::InFlight;
        }
        let _guard = RefreshGuard { inner };

        let now = inner.clock.now_ms();
        if let Some(last) = inner.store.last_refreshed() {
            if inner.policy.within_cooldown(last, now) {
                debug!(last_refreshed = last, "refresh throttled");
                return RefreshOutcome::Throttled;
            }
        }

        let current = {
            let epoch = inner.session_epoch();
            let state = inner.state.borrow();
            let current = state.session.as_ref().map(|s| (*epoch, s.refresh_token.clone(), s.expires_at));
            current
        };
        let Some((started_epoch, refresh_token, expires_at)) = current else {
            return RefreshOutcome::NoSession;
        };

        inner.state.send_modify(|s| s.is_refreshing = true);
        let result = inner.api.refresh_session(&refresh_token).await;

        let outcome = {
            let mut epoch = inner.session_epoch();
            if *epoch != started_epoch {
                debug!("session changed during refresh; result discarded");
                return RefreshOutcome::Superseded;
            }
            match result {
                Ok(Some(session)) => {
                    info!(user_id = %session.user.id, expires_at = session.expires_at, "session refreshed");
                    *epoch += 1;
                    self.install(session);
                    RefreshOutcome::Refreshed
                }
                Ok(None) => {
                    info!("refresh token rejected; signing out locally");
                    *epoch += 1;
                    self.uninstall();
                    RefreshOutcome::Rejected
                }
                Err(e) => {
                    warn!(error = %e, "session refresh failed");
                    self.schedule(expires_at);
                    RefreshOutcome::Failed
                }
            }
        };
        if outcome == RefreshOutcome::Rejected {
            inner.navigator.refresh();
        }
        outcome
    }

    /// Replace the session with a fresh one.
    fn adopt(&self, session: Session) {
        let mut epoch = self.inner.session_epoch();
        *epoch += 1;
        self.install(session);
    }

    /// Forget the session everywhere.
    fn drop_session(&self) {
        let mut epoch = self.inner.session_epoch();
        *epoch += 1;
        self.uninstall();
    }

    /// Store a fresh session, publish it and re-arm the timer. Callers hold
    /// the epoch lock.
    fn install(&self, session: Session) {
        let now = self.inner.clock.now_ms();
        let expires_at = session.expires_at;
        self.inner.store.save(&session);
        self.inner.store.set_last_refreshed(now);
        self.inner.state.send_modify(|s| s.set_session(session, Some(now)));
        self.schedule(expires_at);
    }

    fn uninstall(&self) {
        self.cancel_timer();
        self.inner.store.clear();
        self.inner.state.send_modify(AuthState::clear);
    }

    /// Arm a timer for the current session unless one is already pending.
    fn rearm(&self) {
        let _epoch = self.inner.session_epoch();
        let expires_at = self.inner.state.borrow().session.as_ref().map(|s| s.expires_at);
        if let Some(expires_at) = expires_at {
            if !self.has_pending_refresh() {
                self.schedule(expires_at);
            }
        }
    }

    // =========================================================================
    // TIMER
    // =========================================================================

    /// Replace the pending timer with one for a session expiring at `expires_at`.
    fn schedule(&self, expires_at: i64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; session refresh not scheduled");
            return;
        };

        let delay = self.inner.policy.refresh_delay(expires_at, self.inner.clock.now_ms());
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let weak = Arc::downgrade(&self.inner);

        let mut slot = self.inner.timer_slot();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            fire(weak, generation).await;
        });
        *slot = Some(Timer { generation, handle: task.abort_handle() });
        debug!(delay_ms = delay.as_millis(), generation, "refresh scheduled");
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.inner.timer_slot().take() {
            timer.handle.abort();
            debug!(generation = timer.generation, "refresh timer cancelled");
        }
    }

    // =========================================================================
    // AUTH EVENTS
    // =========================================================================

    /// Apply a push notification from the auth service.
    ///
    /// Sign-in and sign-out also ask the navigator to reload server data.
    pub fn on_auth_state_change(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                info!(user_id = %session.user.id, "signed in");
                self.adopt(session);
                self.inner.navigator.refresh();
            }
            AuthEvent::TokenRefreshed(session) => self.adopt(session),
            AuthEvent::SignedOut => {
                info!("signed out");
                self.drop_session();
                self.inner.navigator.refresh();
            }
            AuthEvent::UserUpdated(user) => {
                self.inner.state.send_if_modified(|s| {
                    let Some(session) = s.session.as_mut() else {
                        return false;
                    };
                    session.user = user.clone();
                    s.user = Some(user);
                    true
                });
            }
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.inner.api.sign_in_with_password(email, password).await?;
        self.on_auth_state_change(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// End the session everywhere and go home.
    ///
    /// The service call is best-effort; local state is cleared regardless.
    pub async fn sign_out(&self) {
        self.cancel_timer();
        let token = self.inner.state.borrow().session.as_ref().map(|s| s.access_token.clone());
        if let Some(token) = token {
            if let Err(e) = self.inner.api.sign_out(&token).await {
                warn!(error = %e, "service sign-out failed");
            }
        }
        self.drop_session();
        self.inner.navigator.push(HOME_PATH);
    }
}

/// Timer body: refresh if this timer is still the current one.
async fn fire(weak: Weak<Inner>, generation: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    {
        let mut slot = inner.timer_slot();
        if slot.as_ref().map(|t| t.generation) != Some(generation) {
            return;
        }
        *slot = None;
    }
    let provider = SessionProvider { inner };
    let outcome = provider.refresh().await;
    if matches!(outcome, RefreshOutcome::Throttled | RefreshOutcome::InFlight) {
        provider.rearm();
    }
    debug!(?outcome, generation, "scheduled refresh finished");
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use supabase::ManualClock;
use tokio::sync::Notify;
use uuid::Uuid;

use super::*;
use crate::store::MemorySessionStore;

const NOW_MS: i64 = 1_700_000_000_000;
const NOW_SECS: i64 = NOW_MS / 1000;
const ACCESS: &str = "stored-access";

fn user() -> User {
    User {
        id: Uuid::parse_str("5f0c2b7e-1d4a-4c8e-9b3f-7a6e2d1c0b9a").unwrap(),
        email: Some("ngo@example.org".into()),
        role: None,
    }
}

fn session(access: &str, expires_at: i64) -> Session {
    Session { access_token: access.into(), refresh_token: "refresh".into(), expires_at, user: user() }
}

// =============================================================================
// MOCKS
// =============================================================================

#[derive(Default)]
struct MockAuth {
    accept: Option<String>,
    refreshed: Option<Session>,
    refresh_error: bool,
    /// Holds `refresh_session` until notified.
    refresh_gate: Option<Arc<Notify>>,
    get_user_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MockAuth {
    fn accepting() -> Self {
        Self {
            accept: Some(ACCESS.into()),
            refreshed: Some(session("refreshed-access", NOW_SECS + 3600)),
            ..Self::default()
        }
    }

    fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AuthApi for MockAuth {
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AuthError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.accept.as_deref() == Some(access_token)).then(user))
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Option<Session>, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            gate.notified().await;
        }
        if self.refresh_error {
            return Err(AuthError::Request("offline".into()));
        }
        Ok(self.refreshed.clone())
    }

    async fn sign_in_with_password(&self, _email: &str, password: &str) -> Result<Session, AuthError> {
        if password == "correct horse" {
            Ok(session("signed-in-access", NOW_SECS + 3600))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::Request("offline".into()))
    }

    async fn fetch_profile(&self, _access_token: &str, _user_id: Uuid) -> Result<Option<supabase::Profile>, AuthError> {
        Ok(None)
    }
}

#[derive(Default)]
struct RecordingNavigator {
    refreshes: AtomicUsize,
    pushes: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn push(&self, path: &str) {
        self.pushes.lock().unwrap().push(path.to_owned());
    }
}

struct Harness {
    provider: SessionProvider,
    auth: Arc<MockAuth>,
    store: Arc<MemorySessionStore>,
    navigator: Arc<RecordingNavigator>,
    clock: Arc<ManualClock>,
}

fn harness(auth: MockAuth, stored: Option<Session>) -> Harness {
    let auth = Arc::new(auth);
    let store = Arc::new(stored.map_or_else(MemorySessionStore::default, MemorySessionStore::with_session));
    let navigator = Arc::new(RecordingNavigator::default());
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let provider = SessionProvider::with_parts(
        auth.clone(),
        clock.clone(),
        store.clone(),
        navigator.clone(),
        RefreshPolicy::default(),
    );
    Harness { provider, auth, store, navigator, clock }
}

/// Stored session that is due for refresh 300s from now.
fn signed_in() -> Harness {
    harness(MockAuth::accepting(), Some(session(ACCESS, NOW_SECS + 600)))
}

// =============================================================================
// initialize
// =============================================================================

#[tokio::test(start_paused = true)]
async fn initialize_publishes_session_and_arms_one_timer() {
    let h = signed_in();
    h.provider.initialize().await;

    let state = h.provider.snapshot();
    assert_eq!(state.lifecycle, Lifecycle::Ready);
    assert_eq!(state.user, Some(user()));
    assert_eq!(state.session.map(|s| s.access_token), Some(ACCESS.to_owned()));
    assert!(h.provider.has_pending_refresh());
    assert_eq!(h.auth.refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn initialize_runs_once() {
    let h = signed_in();
    h.provider.initialize().await;
    h.provider.initialize().await;
    h.provider.clone().initialize().await;
    assert_eq!(h.auth.get_user_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn initialize_without_stored_session_is_ready_and_idle() {
    let h = harness(MockAuth::accepting(), None);
    h.provider.initialize().await;

    let state = h.provider.snapshot();
    assert!(state.should_redirect_unauth());
    assert!(!h.provider.has_pending_refresh());
    assert_eq!(h.auth.get_user_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn initialize_clears_rejected_stored_session() {
    let h = harness(MockAuth::default(), Some(session(ACCESS, NOW_SECS + 600)));
    h.provider.initialize().await;

    assert!(h.provider.snapshot().session.is_none());
    assert!(h.store.load().is_none());
    assert!(!h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn expired_stored_session_is_refreshed_at_startup() {
    let h = harness(
        MockAuth { accept: None, ..MockAuth::accepting() },
        Some(session(ACCESS, NOW_SECS - 3600)),
    );
    h.provider.initialize().await;

    let state = h.provider.snapshot();
    assert_eq!(state.session.map(|s| s.access_token), Some("refreshed-access".to_owned()));
    assert_eq!(state.last_refreshed, Some(NOW_MS));
    assert_eq!(h.store.load().map(|s| s.access_token), Some("refreshed-access".to_owned()));
    assert_eq!(h.auth.refreshes(), 1);
    assert_eq!(h.auth.get_user_calls.load(Ordering::SeqCst), 0);
    assert!(h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn expired_stored_session_with_rejected_refresh_token_is_cleared() {
    let h = harness(MockAuth::default(), Some(session(ACCESS, NOW_SECS - 3600)));
    h.provider.initialize().await;

    assert!(h.provider.snapshot().should_redirect_unauth());
    assert!(h.store.load().is_none());
    assert!(!h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn expired_stored_session_survives_an_unreachable_service() {
    let h = harness(
        MockAuth { refresh_error: true, ..MockAuth::accepting() },
        Some(session(ACCESS, NOW_SECS - 3600)),
    );
    h.provider.initialize().await;

    assert!(h.provider.snapshot().session.is_none());
    assert_eq!(h.store.load().map(|s| s.access_token), Some(ACCESS.to_owned()));
}

#[tokio::test(start_paused = true)]
async fn sign_out_during_startup_refresh_wins() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        MockAuth { refresh_gate: Some(gate.clone()), ..MockAuth::accepting() },
        Some(session(ACCESS, NOW_SECS - 3600)),
    );
    let startup = tokio::spawn({
        let provider = h.provider.clone();
        async move { provider.initialize().await }
    });
    tokio::task::yield_now().await;

    h.provider.on_auth_state_change(AuthEvent::SignedOut);
    gate.notify_one();
    startup.await.unwrap();

    let state = h.provider.snapshot();
    assert_eq!(state.lifecycle, Lifecycle::Ready);
    assert!(state.session.is_none());
    assert!(h.store.load().is_none());
    assert!(!h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_startup() {
    let h = signed_in();
    let mut rx = h.provider.subscribe();
    h.provider.initialize().await;

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().lifecycle, Lifecycle::Ready);
}

// =============================================================================
// scheduled refresh
// =============================================================================

#[tokio::test(start_paused = true)]
async fn timer_refreshes_ahead_of_expiry() {
    let h = signed_in();
    h.provider.initialize().await;

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(h.auth.refreshes(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.auth.refreshes(), 1);

    let state = h.provider.snapshot();
    assert_eq!(state.session.map(|s| s.access_token), Some("refreshed-access".to_owned()));
    assert_eq!(state.last_refreshed, Some(NOW_MS));
    assert_eq!(h.store.last_refreshed(), Some(NOW_MS));
    assert!(h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn session_inside_lead_window_waits_for_cooldown_floor() {
    let h = harness(MockAuth::accepting(), Some(session(ACCESS, NOW_SECS + 10)));
    h.provider.initialize().await;

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(h.auth.refreshes(), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.auth.refreshes(), 1);
}

#[tokio::test(start_paused = true)]
async fn rescheduling_replaces_the_pending_timer() {
    let h = signed_in();
    h.provider.initialize().await;
    h.provider.on_auth_state_change(AuthEvent::TokenRefreshed(session("pushed", NOW_SECS + 3600)));

    tokio::time::sleep(Duration::from_secs(400)).await;
    assert_eq!(h.auth.refreshes(), 0);
    assert!(h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn timer_firing_inside_cooldown_rearms_itself() {
    let h = signed_in();
    h.provider.initialize().await;
    h.store.set_last_refreshed(NOW_MS);

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(h.auth.refreshes(), 0);
    assert!(h.provider.has_pending_refresh());

    h.clock.advance(Duration::from_secs(120));
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.auth.refreshes(), 1);
    assert!(h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn timer_firing_during_manual_refresh_keeps_the_chain() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        MockAuth { refresh_gate: Some(gate.clone()), refresh_error: true, ..MockAuth::accepting() },
        Some(session(ACCESS, NOW_SECS + 600)),
    );
    h.provider.initialize().await;

    let manual = tokio::spawn({
        let provider = h.provider.clone();
        async move { provider.refresh().await }
    });
    tokio::task::yield_now().await;

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(h.auth.refreshes(), 1);
    assert!(h.provider.has_pending_refresh());

    gate.notify_one();
    assert_eq!(manual.await.unwrap(), RefreshOutcome::Failed);
    assert!(h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_the_timer() {
    let h = signed_in();
    h.provider.initialize().await;
    h.provider.shutdown();

    assert!(!h.provider.has_pending_refresh());
    tokio::time::sleep(Duration::from_secs(400)).await;
    assert_eq!(h.auth.refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_provider_cancels_the_timer() {
    let h = signed_in();
    h.provider.initialize().await;
    let Harness { provider, auth, .. } = h;
    drop(provider);

    tokio::time::sleep(Duration::from_secs(400)).await;
    assert_eq!(auth.refreshes(), 0);
}

// =============================================================================
// manual refresh
// =============================================================================

#[tokio::test(start_paused = true)]
async fn two_refreshes_inside_cooldown_make_one_call() {
    let h = signed_in();
    h.provider.initialize().await;

    assert_eq!(h.provider.refresh().await, RefreshOutcome::Refreshed);
    h.clock.advance(Duration::from_secs(30));
    assert_eq!(h.provider.refresh().await, RefreshOutcome::Throttled);
    assert_eq!(h.auth.refreshes(), 1);

    h.clock.advance(Duration::from_secs(31));
    assert_eq!(h.provider.refresh().await, RefreshOutcome::Refreshed);
    assert_eq!(h.auth.refreshes(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_refresh_reports_in_flight() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        MockAuth { refresh_gate: Some(gate.clone()), ..MockAuth::accepting() },
        Some(session(ACCESS, NOW_SECS + 600)),
    );
    h.provider.initialize().await;

    let first = tokio::spawn({
        let provider = h.provider.clone();
        async move { provider.refresh().await }
    });
    tokio::task::yield_now().await;

    assert!(h.provider.snapshot().is_refreshing);
    assert_eq!(h.provider.refresh().await, RefreshOutcome::InFlight);

    gate.notify_one();
    assert_eq!(first.await.unwrap(), RefreshOutcome::Refreshed);
    assert!(!h.provider.snapshot().is_refreshing);
    assert_eq!(h.auth.refreshes(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_without_session_makes_no_call() {
    let h = harness(MockAuth::accepting(), None);
    h.provider.initialize().await;
    assert_eq!(h.provider.refresh().await, RefreshOutcome::NoSession);
    assert_eq!(h.auth.refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_session_and_retries_later() {
    let h = harness(MockAuth { refresh_error: true, ..MockAuth::accepting() }, Some(session(ACCESS, NOW_SECS + 600)));
    h.provider.initialize().await;

    assert_eq!(h.provider.refresh().await, RefreshOutcome::Failed);
    let state = h.provider.snapshot();
    assert_eq!(state.session.map(|s| s.access_token), Some(ACCESS.to_owned()));
    assert!(!state.is_refreshing);
    assert!(h.store.load().is_some());
    assert!(h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn rejected_refresh_signs_out_locally() {
    let h = harness(MockAuth { refreshed: None, ..MockAuth::accepting() }, Some(session(ACCESS, NOW_SECS + 600)));
    h.provider.initialize().await;

    assert_eq!(h.provider.refresh().await, RefreshOutcome::Rejected);
    assert!(h.provider.snapshot().session.is_none());
    assert!(h.store.load().is_none());
    assert!(!h.provider.has_pending_refresh());
    assert_eq!(h.navigator.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_out_during_refresh_is_not_undone() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        MockAuth { refresh_gate: Some(gate.clone()), ..MockAuth::accepting() },
        Some(session(ACCESS, NOW_SECS + 600)),
    );
    h.provider.initialize().await;

    let pending = tokio::spawn({
        let provider = h.provider.clone();
        async move { provider.refresh().await }
    });
    tokio::task::yield_now().await;

    h.provider.sign_out().await;
    gate.notify_one();
    assert_eq!(pending.await.unwrap(), RefreshOutcome::Superseded);

    let state = h.provider.snapshot();
    assert!(state.session.is_none());
    assert!(!state.is_refreshing);
    assert!(h.store.load().is_none());
    assert!(!h.provider.has_pending_refresh());

    tokio::time::sleep(Duration::from_secs(4000)).await;
    assert_eq!(h.auth.refreshes(), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_in_during_refresh_keeps_the_new_session() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        MockAuth { refresh_gate: Some(gate.clone()), ..MockAuth::accepting() },
        Some(session(ACCESS, NOW_SECS + 600)),
    );
    h.provider.initialize().await;

    let pending = tokio::spawn({
        let provider = h.provider.clone();
        async move { provider.refresh().await }
    });
    tokio::task::yield_now().await;

    h.provider.on_auth_state_change(AuthEvent::SignedIn(session("other-account", NOW_SECS + 3600)));
    gate.notify_one();
    assert_eq!(pending.await.unwrap(), RefreshOutcome::Superseded);

    assert_eq!(h.provider.snapshot().session.map(|s| s.access_token), Some("other-account".to_owned()));
    assert_eq!(h.store.load().map(|s| s.access_token), Some("other-account".to_owned()));
    assert!(h.provider.has_pending_refresh());
}

// =============================================================================
// auth events
// =============================================================================

#[tokio::test(start_paused = true)]
async fn signed_in_event_publishes_and_reloads() {
    let h = harness(MockAuth::accepting(), None);
    h.provider.initialize().await;
    h.provider.on_auth_state_change(AuthEvent::SignedIn(session("new", NOW_SECS + 3600)));

    let state = h.provider.snapshot();
    assert_eq!(state.user, Some(user()));
    assert_eq!(state.last_refreshed, Some(NOW_MS));
    assert_eq!(h.store.load().map(|s| s.access_token), Some("new".to_owned()));
    assert!(h.provider.has_pending_refresh());
    assert_eq!(h.navigator.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn signed_out_event_clears_and_reloads() {
    let h = signed_in();
    h.provider.initialize().await;
    h.provider.on_auth_state_change(AuthEvent::SignedOut);

    assert!(h.provider.snapshot().should_redirect_unauth());
    assert!(h.store.load().is_none());
    assert!(!h.provider.has_pending_refresh());
    assert_eq!(h.navigator.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn user_updated_event_replaces_user_only_when_signed_in() {
    let h = harness(MockAuth::accepting(), None);
    h.provider.initialize().await;
    let renamed = User { email: Some("renamed@example.org".into()), ..user() };

    h.provider.on_auth_state_change(AuthEvent::UserUpdated(renamed.clone()));
    assert!(h.provider.snapshot().user.is_none());

    h.provider.on_auth_state_change(AuthEvent::SignedIn(session("new", NOW_SECS + 3600)));
    h.provider.on_auth_state_change(AuthEvent::UserUpdated(renamed.clone()));
    let state = h.provider.snapshot();
    assert_eq!(state.user, Some(renamed.clone()));
    assert_eq!(state.session.map(|s| s.user), Some(renamed));
    assert_eq!(h.navigator.refreshes.load(Ordering::SeqCst), 1);
}

// =============================================================================
// sign in / sign out
// =============================================================================

#[tokio::test(start_paused = true)]
async fn sign_in_with_password_adopts_session() {
    let h = harness(MockAuth::accepting(), None);
    h.provider.initialize().await;

    let session = h.provider.sign_in_with_password("ngo@example.org", "correct horse").await.unwrap();
    assert_eq!(session.access_token, "signed-in-access");
    assert_eq!(h.provider.snapshot().session, Some(session));
    assert!(h.provider.has_pending_refresh());
}

#[tokio::test(start_paused = true)]
async fn sign_in_with_wrong_password_changes_nothing() {
    let h = harness(MockAuth::accepting(), None);
    h.provider.initialize().await;

    let err = h.provider.sign_in_with_password("ngo@example.org", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(h.provider.snapshot().session.is_none());
    assert_eq!(h.navigator.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn sign_out_clears_everything_and_goes_home() {
    let h = signed_in();
    h.provider.initialize().await;
    h.provider.sign_out().await;

    assert_eq!(h.auth.sign_out_calls.load(Ordering::SeqCst), 1);
    assert!(h.provider.snapshot().session.is_none());
    assert!(h.store.load().is_none());
    assert!(!h.provider.has_pending_refresh());
    assert_eq!(*h.navigator.pushes.lock().unwrap(), vec!["/".to_owned()]);

    tokio::time::sleep(Duration::from_secs(400)).await;
    assert_eq!(h.auth.refreshes(), 0);
}

#[test]
fn api_handle_is_shared() {
    let h = harness(MockAuth::default(), None);
    let api = h.provider.api();
    let expected: Arc<dyn AuthApi> = h.auth.clone();
    assert!(Arc::ptr_eq(&api, &expected));
}

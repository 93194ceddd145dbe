//! Browser-side session provider for HelpConnect.
//!
//! SYSTEM CONTEXT
//! ==============
//! After hydration the server gate is out of the picture: this crate keeps an
//! in-memory mirror of the session, refreshes it ahead of expiry, and hands
//! [`AuthState`] snapshots to user-aware components. Persistence and
//! navigation sit behind [`SessionStore`] and [`Navigator`] so the host shell
//! decides how tokens are kept and how pages are reloaded.

pub mod navigate;
pub mod provider;
pub mod state;
pub mod store;

pub use navigate::Navigator;
pub use provider::{AuthEvent, RefreshOutcome, SessionProvider};
pub use state::auth::{AuthState, Lifecycle};
pub use store::{MemorySessionStore, SessionStore};

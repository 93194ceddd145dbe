//! Typed access to the hosted auth/data service backing HelpConnect.
//!
//! This crate owns the types shared by `server` and `client`: the session
//! and identity model, the [`AuthApi`] seam both sides call through, and the
//! refresh timing rules they agree on.

pub mod client;
pub mod clock;
pub mod config;
pub mod policy;
pub mod types;

pub use client::{AuthApi, SupabaseClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SupabaseConfig;
pub use policy::RefreshPolicy;
pub use types::{AuthError, Profile, Role, Session, User};

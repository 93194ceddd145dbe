//! Request-time session gate.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every request passes through [`middleware::session_gate`] before reaching a
//! page or API handler. The gate classifies the path, validates the session
//! only when the path needs one, and answers allow or redirect.
//!
//! DESIGN
//! ======
//! Leaf first: `cookies` reads and writes the token cookies, `classify` maps a
//! path to a [`classify::PathKind`] from a static rule table, `session` asks the
//! auth service to attest the cookies, and `decision` combines the three into a
//! [`decision::Decision`]. Only `middleware` knows about axum's request flow.

pub mod classify;
pub mod cookies;
pub mod decision;
pub mod middleware;
pub mod session;

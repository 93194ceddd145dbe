//! Client state published to components.
//!
//! SYSTEM CONTEXT
//! ==============
//! `auth` is the only state this crate owns; page data stays with the pages.

pub mod auth;

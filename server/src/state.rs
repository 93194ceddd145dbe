//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into the gate middleware and the auth handlers via
//! the `State` extractor. There is no shared mutable state: the auth service
//! owns every session, so the state only carries the service handle, the clock
//! and the parsed configuration.

use std::sync::Arc;

use supabase::{AuthApi, Clock};

use crate::config::GateConfig;
use crate::gate::decision::RouteGate;
use crate::gate::session::SessionValidator;

/// Shared application state. Clone is required by Axum; every field is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub auth: Arc<dyn AuthApi>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    #[must_use]
    pub fn new(config: GateConfig, auth: Arc<dyn AuthApi>, clock: Arc<dyn Clock>) -> Self {
        Self { config: Arc::new(config), auth, clock }
    }

    #[must_use]
    pub fn validator(&self) -> SessionValidator {
        SessionValidator::new(
            Arc::clone(&self.auth),
            Arc::clone(&self.clock),
            self.config.policy,
            self.config.cookie_settings(),
        )
    }

    #[must_use]
    pub fn gate(&self) -> RouteGate {
        RouteGate::new(self.validator(), Arc::clone(&self.auth))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

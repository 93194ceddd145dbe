//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The JSON auth endpoints and the rendered site share one Axum router. The
//! session gate wraps all of it, fallback included, so no page is reachable
//! without passing through the gate.

pub mod auth;

use std::path::Path;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::gate::middleware::session_gate;
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/healthz", get(healthz))
}

/// Full application: API routes, the site directory as fallback, the gate.
pub fn app(state: AppState) -> Router {
    let site = ServeDir::new(Path::new(&state.config.site_dir)).append_index_html_on_directories(true);

    api_routes()
        .fallback_service(site)
        .layer(middleware::from_fn_with_state(state.clone(), session_gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

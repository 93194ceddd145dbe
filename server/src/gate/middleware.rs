//! Axum layer that applies [`RouteGate`](super::decision::RouteGate) decisions.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use super::classify;
use super::decision::{Decision, Evaluation};
use crate::state::AppState;

/// Gate every request. Cookies written during validation ride on the
/// response whether the request is allowed or redirected; an attested
/// [`supabase::Session`] is handed to downstream handlers as an extension.
///
/// Decisions are made on the canonical path, so every spelling the site
/// directory resolves to the same file gets the same answer.
pub async fn session_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(path) = classify::normalize(request.uri().path()) else {
        debug!(raw = %request.uri().path(), "undecodable request path");
        return StatusCode::BAD_REQUEST.into_response();
    };
    let jar = CookieJar::from_headers(request.headers());

    let Evaluation { decision, kind, session, jar } = state.gate().evaluate(&path, jar).await;
    match decision {
        Decision::Allow => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            (jar, next.run(request).await).into_response()
        }
        Decision::Redirect(to) => {
            debug!(%path, ?kind, %to, "gate redirect");
            (jar, Redirect::temporary(&to)).into_response()
        }
    }
}

#[cfg(test)]
#[path = "middleware_test.rs"]
mod tests;

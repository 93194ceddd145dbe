//! Auth routes: password sign-in, sign-out, session context for the browser.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use supabase::{AuthError, Session, User};
use tracing::{error, info, warn};

use crate::gate::cookies;
use crate::gate::session::Validation;
use crate::state::AppState;

/// Session context handed to client code. Tokens stay in HttpOnly cookies.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: User,
    pub expires_at: i64,
    pub last_refreshed: Option<i64>,
}

impl SessionView {
    fn new(session: Session, last_refreshed: Option<i64>) -> Self {
        Self { user: session.user, expires_at: session.expires_at, last_refreshed }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// `GET /api/auth/session`: current user, or 401.
pub async fn session(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Validation { session, jar } = state.validator().validate(jar).await;
    match session {
        Some(session) => {
            let last_refreshed = cookies::last_refreshed(&jar);
            (jar, Json(SessionView::new(session, last_refreshed))).into_response()
        }
        None => (jar, StatusCode::UNAUTHORIZED).into_response(),
    }
}

/// `POST /api/auth/login`: sign in with email and password, set cookies.
pub async fn login(State(state): State<AppState>, jar: CookieJar, Json(body): Json<LoginRequest>) -> Response {
    let email = body.email.trim().to_ascii_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "email and password are required").into_response();
    }

    match state.auth.sign_in_with_password(&email, &body.password).await {
        Ok(session) => {
            info!(user_id = %session.user.id, "signed in");
            let settings = state.config.cookie_settings();
            let now_ms = state.clock.now_ms();
            let jar = cookies::write_session(jar, &session, settings);
            let jar = cookies::mark_refreshed(jar, now_ms, settings);
            (jar, Json(SessionView::new(session, Some(now_ms)))).into_response()
        }
        Err(AuthError::InvalidCredentials) => (StatusCode::UNAUTHORIZED, "invalid login credentials").into_response(),
        Err(e) => {
            error!(error = %e, "sign-in failed");
            (StatusCode::BAD_GATEWAY, "sign-in unavailable").into_response()
        }
    }
}

/// `POST /api/auth/logout`: revoke with the service (best effort), clear cookies.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(tokens) = cookies::read_tokens(&jar) {
        if let Err(e) = state.auth.sign_out(&tokens.access_token).await {
            warn!(error = %e, "service sign-out failed; clearing cookies anyway");
        }
    }

    (cookies::clear_session(jar, state.config.cookie_settings()), StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

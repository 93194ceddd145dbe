//! Session token cookies on the request/response pair.
//!
//! The token cookies mirror what the auth service issued; they are never
//! proof of validity. `sb-last-refreshed` only throttles refresh attempts.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use supabase::Session;
use time::Duration;

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
pub const EXPIRES_AT_COOKIE: &str = "sb-expires-at";
pub const LAST_REFRESHED_COOKIE: &str = "sb-last-refreshed";

const TOKEN_COOKIE_MAX_AGE: Duration = Duration::days(30);
const LAST_REFRESHED_MAX_AGE: Duration = Duration::days(1);

/// Attributes applied to every cookie the gate writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookieSettings {
    /// Set `Secure`; on in production.
    pub secure: bool,
}

/// Token material found in the request cookies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry recorded when the tokens were written, epoch seconds.
    pub expires_at: Option<i64>,
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(Cookie::value)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Read the token cookies. `None` without an access token.
#[must_use]
pub fn read_tokens(jar: &CookieJar) -> Option<StoredTokens> {
    let access_token = non_empty(jar, ACCESS_TOKEN_COOKIE)?;
    Some(StoredTokens {
        access_token,
        refresh_token: non_empty(jar, REFRESH_TOKEN_COOKIE),
        expires_at: non_empty(jar, EXPIRES_AT_COOKIE).and_then(|v| v.parse().ok()),
    })
}

/// Epoch millis of the last successful refresh, if recorded.
#[must_use]
pub fn last_refreshed(jar: &CookieJar) -> Option<i64> {
    non_empty(jar, LAST_REFRESHED_COOKIE).and_then(|v| v.parse().ok())
}

fn build(name: &'static str, value: String, max_age: Duration, settings: CookieSettings) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure)
        .max_age(max_age)
        .build()
}

/// Write all token cookies for `session`.
#[must_use]
pub fn write_session(jar: CookieJar, session: &Session, settings: CookieSettings) -> CookieJar {
    jar.add(build(ACCESS_TOKEN_COOKIE, session.access_token.clone(), TOKEN_COOKIE_MAX_AGE, settings))
        .add(build(REFRESH_TOKEN_COOKIE, session.refresh_token.clone(), TOKEN_COOKIE_MAX_AGE, settings))
        .add(build(EXPIRES_AT_COOKIE, session.expires_at.to_string(), TOKEN_COOKIE_MAX_AGE, settings))
}

/// Record a successful refresh at `now_ms`.
#[must_use]
pub fn mark_refreshed(jar: CookieJar, now_ms: i64, settings: CookieSettings) -> CookieJar {
    jar.add(build(LAST_REFRESHED_COOKIE, now_ms.to_string(), LAST_REFRESHED_MAX_AGE, settings))
}

/// Expire every session cookie.
#[must_use]
pub fn clear_session(jar: CookieJar, settings: CookieSettings) -> CookieJar {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, EXPIRES_AT_COOKIE, LAST_REFRESHED_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| jar.add(build(name, String::new(), Duration::ZERO, settings)))
}

#[cfg(test)]
#[path = "cookies_test.rs"]
mod tests;

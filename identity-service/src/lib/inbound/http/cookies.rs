//! Cookie names and builders shared by the auth handlers and middleware.

use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::SameSite;
use time::Duration;

/// Anonymous session identifier used to key the CSRF token store.
pub const SESSION_COOKIE: &str = "batuara_session";

/// HttpOnly carrier for the refresh secret, scoped to the auth routes.
pub const REFRESH_COOKIE: &str = "batuara_refresh";

/// Readable copy of the CSRF token; clients echo it back in `X-CSRF-TOKEN`.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

pub fn refresh_cookie(secret: &str, days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), secret.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/auth".to_string())
        .max_age(Duration::days(days))
        .build()
}

pub fn clear_refresh_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/auth".to_string())
        .max_age(Duration::ZERO)
        .build()
}

pub fn session_cookie(session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/".to_string())
        .build()
}

// Deliberately not HttpOnly: the double-submit scheme needs script access.
pub fn xsrf_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((XSRF_COOKIE.to_string(), token.to_string()))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/".to_string())
        .build()
}

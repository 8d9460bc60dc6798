//! Double-submit CSRF guard backed by a server-side token store.
//!
//! Every response on a session without a token provisions one: an anonymous
//! `batuara_session` cookie keys the store and a readable `XSRF-TOKEN` cookie
//! carries the value clients must echo back on state-changing requests. A
//! session the store has never seen passes unchallenged, so the very first
//! request of a fresh client is tolerated.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;
use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::CookieJar;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::inbound::http::cookies::session_cookie;
use crate::inbound::http::cookies::xsrf_cookie;
use crate::inbound::http::cookies::SESSION_COOKIE;
use crate::inbound::http::cookies::XSRF_COOKIE;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_FORM_FIELD: &str = "_csrf";

/// Routes a client may hit before it holds a token.
const EXEMPT_PATHS: [&str; 3] = ["/auth/login", "/auth/refresh", "/auth/verify"];

/// Upper bound when buffering a form body to read the `_csrf` field.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// Anonymous sessions older than this are dropped from the store. Expired
/// sessions fall back to first-request tolerance and get a fresh token.
const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct StoredToken {
    value: String,
    issued_at: Instant,
}

impl StoredToken {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) >= SESSION_TTL
    }
}

/// Session-id to CSRF-token map shared across requests.
#[derive(Clone, Default)]
pub struct CsrfState {
    tokens: Arc<RwLock<HashMap<String, StoredToken>>>,
}

impl CsrfState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_for(&self, session_id: &str) -> Option<String> {
        self.token_for_at(session_id, Instant::now())
    }

    fn token_for_at(&self, session_id: &str, now: Instant) -> Option<String> {
        let tokens = match self.tokens.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tokens
            .get(session_id)
            .filter(|stored| !stored.is_expired(now))
            .map(|stored| stored.value.clone())
    }

    /// Generates and stores a fresh token for the session. Each issue also
    /// sweeps out expired sessions so the store cannot grow without bound
    /// under anonymous traffic.
    pub fn issue(&self, session_id: &str) -> String {
        self.issue_at(session_id, Instant::now())
    }

    fn issue_at(&self, session_id: &str, now: Instant) -> String {
        let token = random_token();
        let mut tokens = match self.tokens.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tokens.retain(|_, stored| !stored.is_expired(now));
        tokens.insert(
            session_id.to_string(),
            StoredToken {
                value: token.clone(),
                issued_at: now,
            },
        );
        token
    }

    #[cfg(test)]
    fn stored_sessions(&self) -> usize {
        match self.tokens.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn random_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn tokens_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    provided.len() == expected.len() && provided.ct_eq(expected).into()
}

fn is_state_changing(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

fn forbidden() -> Response {
    ApiError::Forbidden("CSRF token missing or invalid".to_string()).into_response()
}

pub async fn csrf_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let stored = session_id
        .as_deref()
        .and_then(|sid| state.csrf.token_for(sid));

    let path = req.uri().path().to_string();
    let req = if is_state_changing(req.method()) && !is_exempt(&path) {
        match &stored {
            Some(expected) => {
                let (req, provided) = match presented_token(req, &jar).await {
                    Ok(pair) => pair,
                    Err(response) => return response,
                };

                let valid = provided
                    .as_deref()
                    .is_some_and(|token| tokens_match(token, expected));
                if !valid {
                    tracing::warn!(path = %path, "rejected request with missing or stale CSRF token");
                    return forbidden();
                }
                req
            }
            // No token on record for this session yet.
            None => req,
        }
    } else {
        req
    };

    let mut response = next.run(req).await;

    if stored.is_none() {
        let session_id = session_id.unwrap_or_else(random_session_id);
        let token = state.csrf.issue(&session_id);
        append_cookie(&mut response, session_cookie(&session_id, state.secure_cookies));
        append_cookie(&mut response, xsrf_cookie(&token, state.secure_cookies));
    }

    response
}

/// Token the client presented, in priority order: `X-CSRF-TOKEN` header, then
/// the `_csrf` form field, then the `XSRF-TOKEN` cookie. Reading the form
/// field buffers the body, so the request is handed back for the handler.
async fn presented_token(
    req: Request,
    jar: &CookieJar,
) -> Result<(Request, Option<String>), Response> {
    let header_token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if let Some(token) = header_token {
        return Ok((req, Some(token)));
    }

    let cookie_token = jar.get(XSRF_COOKIE).map(|c| c.value().to_string());

    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return Ok((req, cookie_token));
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, FORM_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Err(ApiError::BadRequest("Unreadable request body".to_string()).into_response())
        }
    };
    let form_token = form_field(&bytes, CSRF_FORM_FIELD);
    let req = Request::from_parts(parts, Body::from(bytes));

    Ok((req, form_token.or(cookie_token)))
}

fn form_field(body: &[u8], field: &str) -> Option<String> {
    let body = std::str::from_utf8(body).ok()?;
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if percent_decode(key)? == field {
            percent_decode(value)
        } else {
            None
        }
    })
}

fn percent_decode(value: &str) -> Option<String> {
    let mut out = Vec::with_capacity(value.len());
    let mut bytes = value.bytes();
    while let Some(byte) = bytes.next() {
        match byte {
            b'+' => out.push(b' '),
            b'%' => {
                let high = bytes.next()?;
                let low = bytes.next()?;
                let hex = [high, low];
                let hex = std::str::from_utf8(&hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
            }
            other => out.push(other),
        }
    }
    String::from_utf8(out).ok()
}

fn append_cookie(response: &mut Response, cookie: Cookie<'static>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

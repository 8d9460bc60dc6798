//! In-memory fixed-window rate limiting, counted per client IP.
//!
//! Each request is matched against the first policy whose path prefix
//! applies. State lives in process memory; a restart clears all counters.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::config::RateLimitPolicy;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

struct WindowCounter {
    window: u64,
    count: u32,
    touched: u64,
}

pub struct RateLimiter {
    policies: Vec<RateLimitPolicy>,
    /// Counters idle for longer than the widest window are swept whenever a
    /// new (group, ip) key appears, which bounds the map under churn.
    sweep_horizon_secs: u64,
    windows: Mutex<HashMap<(String, String), WindowCounter>>,
}

impl RateLimiter {
    pub fn new(policies: Vec<RateLimitPolicy>) -> Self {
        let sweep_horizon_secs = policies
            .iter()
            .map(|policy| policy.window_secs)
            .max()
            .unwrap_or(60);
        Self {
            policies,
            sweep_horizon_secs,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts the request against the first matching policy. Returns the
    /// seconds until the window resets when the request is over the limit.
    pub fn check(&self, client_ip: &str, path: &str) -> Result<(), u64> {
        self.check_at(client_ip, path, unix_seconds())
    }

    fn check_at(&self, client_ip: &str, path: &str, now_secs: u64) -> Result<(), u64> {
        let Some(policy) = self
            .policies
            .iter()
            .find(|policy| path.starts_with(&policy.prefix))
        else {
            return Ok(());
        };

        let window = now_secs / policy.window_secs;
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let key = (policy.group.clone(), client_ip.to_string());
        if !windows.contains_key(&key) {
            let horizon = self.sweep_horizon_secs;
            windows.retain(|_, counter| now_secs.saturating_sub(counter.touched) <= horizon);
        }

        let counter = windows.entry(key).or_insert(WindowCounter {
            window,
            count: 0,
            touched: now_secs,
        });

        if counter.window != window {
            counter.window = window;
            counter.count = 0;
        }

        counter.count += 1;
        counter.touched = now_secs;

        if counter.count > policy.max_requests {
            let retry_after = (window + 1) * policy.window_secs - now_secs;
            return Err(retry_after);
        }

        Ok(())
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        match self.windows.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn request_client_ip(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client_ip = request_client_ip(&req);

    match state.rate_limiter.check(&client_ip, req.uri().path()) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!(
                client_ip = %client_ip,
                path = %req.uri().path(),
                retry_after,
                "rate limit exceeded"
            );

            let mut response =
                ApiError::TooManyRequests("Too many requests".to_string()).into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

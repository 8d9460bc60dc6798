use std::sync::Arc;
use std::time::Duration;

use auth::TokenCodec;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::csrf::csrf_guard;
use super::csrf::CsrfState;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::me::me;
use super::handlers::refresh::refresh;
use super::handlers::register::register;
use super::handlers::verify::verify;
use super::middleware::authenticate;
use super::middleware::require_admin;
use super::rate_limit::rate_limit;
use super::rate_limit::RateLimiter;
use crate::domain::identity::ports::AuthServicePort;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthServicePort>,
    pub codec: Arc<TokenCodec>,
    pub csrf: CsrfState,
    pub rate_limiter: Arc<RateLimiter>,
    pub refresh_token_days: i64,
    pub secure_cookies: bool,
}

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh));

    let protected_routes = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/verify", get(verify))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    // Layers run outermost-last, so authenticate wraps require_admin.
    let admin_routes = Router::new()
        .route("/auth/register", post(register))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    // Outermost first on the request path: rate limiter, then CORS, then the
    // CSRF guard, then tracing.
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(trace_layer)
        .layer(middleware::from_fn_with_state(state.clone(), csrf_guard))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::client_ip;
use super::presented_refresh_secret;
use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::cookies::clear_refresh_cookie;
use crate::inbound::http::router::AppState;

/// Revoke the presented refresh token and clear its cookie. Succeeds even
/// when no token was presented or the secret is already dead, so repeated
/// logouts are harmless.
pub async fn logout(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, ApiSuccess<LogoutResponseData>), ApiError> {
    if let Some(secret) = presented_refresh_secret(&jar, &headers) {
        let client_ip = client_ip(&headers, peer);
        state.auth_service.revoke(&secret, &client_ip).await?;
    }

    let jar = jar.add(clear_refresh_cookie(state.secure_cookies));

    Ok((
        jar,
        ApiSuccess::new(
            StatusCode::OK,
            LogoutResponseData {
                message: "Logged out".to_string(),
            },
        ),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutResponseData {
    pub message: String,
}

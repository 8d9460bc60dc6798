use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::client_ip;
use super::presented_refresh_secret;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::identity::errors::GENERIC_CREDENTIALS_MESSAGE;
use crate::domain::identity::models::UserView;
use crate::inbound::http::cookies::refresh_cookie;
use crate::inbound::http::router::AppState;

/// Rotate the presented refresh token. A missing secret gets the same
/// response as an invalid one.
pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, ApiSuccess<RefreshResponseData>), ApiError> {
    let secret = presented_refresh_secret(&jar, &headers)
        .ok_or_else(|| ApiError::Unauthorized(GENERIC_CREDENTIALS_MESSAGE.to_string()))?;

    let client_ip = client_ip(&headers, peer);

    let tokens = state.auth_service.refresh(&secret, &client_ip).await?;

    let jar = jar.add(refresh_cookie(
        &tokens.refresh_token,
        state.refresh_token_days,
        state.secure_cookies,
    ));

    Ok((
        jar,
        ApiSuccess::new(
            StatusCode::OK,
            RefreshResponseData {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_at: tokens.expires_at,
                user: tokens.user,
            },
        ),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshResponseData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

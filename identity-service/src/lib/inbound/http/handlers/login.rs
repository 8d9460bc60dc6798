use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::client_ip;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::identity::models::UserView;
use crate::inbound::http::cookies::refresh_cookie;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<LoginRequestBody>,
) -> Result<(CookieJar, ApiSuccess<LoginResponseData>), ApiError> {
    let client_ip = client_ip(&headers, peer);

    let tokens = state
        .auth_service
        .login(&body.email, &body.password, &client_ip)
        .await?;

    let jar = jar.add(refresh_cookie(
        &tokens.refresh_token,
        state.refresh_token_days,
        state.secure_cookies,
    ));

    Ok((
        jar,
        ApiSuccess::new(
            StatusCode::OK,
            LoginResponseData {
                access_token: tokens.access_token,
                // Also in the body for clients that cannot hold cookies.
                refresh_token: tokens.refresh_token,
                expires_at: tokens.expires_at,
                user: tokens.user,
            },
        ),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestBody {
    email: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

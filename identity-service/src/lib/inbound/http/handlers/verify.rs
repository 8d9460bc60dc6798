use axum::http::StatusCode;
use axum::Extension;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::middleware::AuthenticatedUser;

/// Cheap token check for other services and frontends. The auth middleware
/// has already validated the token; this just echoes the identity back.
pub async fn verify(
    Extension(current): Extension<AuthenticatedUser>,
) -> Result<ApiSuccess<VerifyResponseData>, ApiError> {
    Ok(ApiSuccess::new(
        StatusCode::OK,
        VerifyResponseData {
            valid: true,
            user_id: current.user_id.0,
            email: current.email,
            role: current.role.to_string(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyResponseData {
    pub valid: bool,
    pub user_id: i64,
    pub email: String,
    pub role: String,
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::identity::models::UserView;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

/// Profile of the authenticated account, re-read from the store so the
/// response reflects state newer than the token.
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<AuthenticatedUser>,
) -> Result<ApiSuccess<UserView>, ApiError> {
    let user = state
        .auth_service
        .get_user_by_id(&current.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiSuccess::new(StatusCode::OK, UserView::from(&user)))
}

use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use auth::JwtError;

use crate::domain::identity::models::Role;
use crate::domain::identity::models::UserId;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

/// Identity extracted from a validated access token, stored in request
/// extensions for downstream handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Validates the bearer token and resolves the account behind it. Tokens for
/// deactivated or deleted accounts are rejected even when the signature and
/// expiry check out.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer_token(&req)?;

    let claims = state.codec.validate(token).map_err(|e| {
        tracing::warn!("access token rejected: {}", e);
        let message = match e {
            JwtError::Expired => "Token expired",
            _ => "Invalid token",
        };
        ApiError::Unauthorized(message.to_string()).into_response()
    })?;

    let user_id = UserId::from_string(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()).into_response())?;

    let role: Role = claims
        .role
        .parse()
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()).into_response())?;

    let user = state
        .auth_service
        .get_user_by_id(&user_id)
        .await
        .map_err(|e| ApiError::from(e).into_response())?
        .filter(|user| user.is_active)
        .ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "token presented for inactive or missing account");
            ApiError::Unauthorized("Invalid token".to_string()).into_response()
        })?;

    req.extensions_mut().insert(AuthenticatedUser {
        user_id: user.id,
        email: claims.email,
        name: user.name.clone(),
        role,
    });

    Ok(next.run(req).await)
}

/// Gate for management routes. Runs after [`authenticate`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, Response> {
    let user = req.extensions().get::<AuthenticatedUser>().ok_or_else(|| {
        ApiError::Unauthorized("Authentication required".to_string()).into_response()
    })?;

    if user.role != Role::Admin {
        tracing::warn!(user_id = %user.user_id, role = %user.role, "non-admin blocked from management route");
        return Err(
            ApiError::Forbidden("Administrator role required".to_string()).into_response(),
        );
    }

    Ok(next.run(req).await)
}

fn extract_bearer_token(req: &Request) -> Result<&str, Response> {
    let auth_header = req.headers().get(header::AUTHORIZATION).ok_or_else(|| {
        ApiError::Unauthorized("Missing Authorization header".to_string()).into_response()
    })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        ApiError::Unauthorized("Invalid Authorization header".to_string()).into_response()
    })?;

    auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthorized(
            "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
        )
        .into_response()
    })
}

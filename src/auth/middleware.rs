//! Authentication middleware
//!
//! Protects routes that require a session token.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;

/// User id taken from a verified session token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authorization header required".to_string()))?;

    header
        .to_str()
        .ok()
        .and_then(|value| {
            let mut parts = value.split(' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
                _ => None,
            }
        })
        .ok_or_else(|| {
            AppError::Unauthorized(
                "Invalid authorization header format. Expected: Bearer <token>".to_string(),
            )
        })
}

/// Middleware to require authentication
///
/// Verifies the bearer session token and adds [`AuthenticatedUser`] to
/// request extensions.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/api/...", ...)
///     .layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let claims = state.sessions.verify(token)?;

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.user_id,
    });

    Ok(next.run(request).await)
}

/// Extractor for the current authenticated user
///
/// Only valid behind [`require_auth`].
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("User not authenticated".to_string()))
    }
}

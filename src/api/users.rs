//! User info endpoint

use axum::{extract::State, response::Json};

use super::dto::UserInfoResponse;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// GET /api/userinfo
///
/// Profile of the user the session token belongs to.
pub async fn get_userinfo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserInfoResponse>, AppError> {
    let stored = state
        .db
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let response = UserInfoResponse::from(stored);
    response.validate()?;

    Ok(Json(response))
}

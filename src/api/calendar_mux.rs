//! Calendar mux endpoints
//!
//! Every operation is scoped to the signed-in user; muxes owned by someone
//! else behave as if they did not exist.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};

use super::dto::{
    CalendarMuxListResponse, CalendarMuxResponse, CreateCalendarMuxRequest, MessageResponse,
};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// POST /api/calendar-mux
pub async fn create_calendar_mux(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateCalendarMuxRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalendarMuxResponse>), AppError> {
    let Json(req) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected calendar mux body");
        AppError::Validation("Invalid request body".to_string())
    })?;
    req.validate()?;

    let mux = state
        .db
        .create_calendar_mux(
            user.user_id,
            &req.name,
            req.description.as_deref().unwrap_or_default(),
        )
        .await?;

    tracing::info!(user_id = user.user_id, mux_id = mux.id, "Calendar mux created");

    Ok((StatusCode::CREATED, Json(mux.into())))
}

/// GET /api/calendar-mux
pub async fn list_calendar_muxes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<CalendarMuxListResponse>, AppError> {
    let muxes = state.db.list_calendar_muxes(user.user_id).await?;

    Ok(Json(CalendarMuxListResponse {
        calendar_muxes: muxes.into_iter().map(Into::into).collect(),
    }))
}

/// DELETE /api/calendar-mux/:id
pub async fn delete_calendar_mux(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_mux_id(&id)?;

    if !state.db.delete_calendar_mux(id, user.user_id).await? {
        return Err(AppError::NotFound(
            "Calendar mux not found or access denied".to_string(),
        ));
    }

    tracing::info!(user_id = user.user_id, mux_id = id, "Calendar mux deleted");

    Ok(Json(MessageResponse {
        message: "Calendar mux deleted successfully".to_string(),
    }))
}

fn parse_mux_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Validation("Invalid calendar mux ID".to_string()))
}

//! REST API request and response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{CalendarMux, User};
use crate::error::AppError;

/// Longest accepted calendar mux name, in characters
pub const MAX_NAME_CHARS: usize = 200;
/// Longest accepted calendar mux description, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Profile of the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub id: i64,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
}

impl UserInfoResponse {
    /// Reject profiles missing fields every client relies on.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id <= 0 || self.email.is_empty() {
            return Err(AppError::upstream(
                "Response validation failed",
                anyhow::anyhow!("user {} has an incomplete stored profile", self.id),
            ));
        }
        Ok(())
    }
}

impl From<User> for UserInfoResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            given_name: user.given_name,
            family_name: user.family_name,
            email: user.email,
        }
    }
}

/// Body of `POST /api/calendar-mux`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCalendarMuxRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateCalendarMuxRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if self.name.chars().count() > MAX_NAME_CHARS {
            return Err(AppError::Validation(format!(
                "name must be at most {MAX_NAME_CHARS} characters"
            )));
        }
        if self
            .description
            .as_deref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS)
        {
            return Err(AppError::Validation(format!(
                "description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// Calendar mux as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarMuxResponse {
    pub id: i64,
    pub created_by_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CalendarMux> for CalendarMuxResponse {
    fn from(mux: CalendarMux) -> Self {
        Self {
            id: mux.id,
            created_by_id: mux.created_by_id,
            name: mux.name,
            description: mux.description,
            created_at: mux.created_at,
            updated_at: mux.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarMuxListResponse {
    pub calendar_muxes: Vec<CalendarMuxResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

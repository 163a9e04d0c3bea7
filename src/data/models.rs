//! Data models
//!
//! Rust structs representing database rows. Ids are SQLite integer keys,
//! timestamps are chrono UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// User
// =============================================================================

/// A person who signed in through an identity provider
///
/// `(auth_provider, auth_provider_id)` identifies the user across logins.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    /// Provider name, e.g. "google"
    pub auth_provider: String,
    /// Stable user id at the provider
    pub auth_provider_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Calendar mux
// =============================================================================

/// A named grouping of calendars owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CalendarMux {
    pub id: i64,
    pub created_by_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

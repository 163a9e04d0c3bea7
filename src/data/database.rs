//! SQLite database operations
//!
//! All database access goes through this module.
//! Soft-deleted rows (`deleted_at` set) are filtered out of every query.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::auth::IdentityResolver;
use crate::error::AppError;
use crate::metrics::record_db_query;

const USER_COLUMNS: &str = "id, given_name, family_name, email, auth_provider, auth_provider_id, \
     created_at, updated_at, deleted_at";

const CALENDAR_MUX_COLUMNS: &str =
    "id, created_by_id, name, description, created_at, updated_at, deleted_at";

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create the user for a provider identity, or refresh its profile.
    ///
    /// # Arguments
    /// * `provider` - Provider name (e.g. "google")
    /// * `provider_user_id` - Stable id at the provider
    ///
    /// # Returns
    /// The created or updated user
    pub async fn find_or_create_user(
        &self,
        provider: &str,
        provider_user_id: &str,
        given_name: &str,
        family_name: &str,
        email: &str,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO users (
                given_name, family_name, email, auth_provider, auth_provider_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (auth_provider, auth_provider_id) WHERE deleted_at IS NULL
            DO UPDATE SET
                given_name = excluded.given_name,
                family_name = excluded.family_name,
                email = excluded.email,
                updated_at = excluded.updated_at
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(given_name)
            .bind(family_name)
            .bind(email)
            .bind(provider)
            .bind(provider_user_id)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        record_db_query("upsert", "users");

        tracing::debug!(user_id = user.id, provider = %provider, "User resolved");
        Ok(user)
    }

    /// Get a live user by id
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        record_db_query("select", "users");

        Ok(user)
    }

    // =========================================================================
    // Calendar muxes
    // =========================================================================

    /// Create a calendar mux owned by `user_id`
    pub async fn create_calendar_mux(
        &self,
        user_id: i64,
        name: &str,
        description: &str,
    ) -> Result<CalendarMux, AppError> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO calendar_muxes (created_by_id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {CALENDAR_MUX_COLUMNS}
            "#
        );

        let mux = sqlx::query_as::<_, CalendarMux>(&sql)
            .bind(user_id)
            .bind(name)
            .bind(description)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        record_db_query("insert", "calendar_muxes");

        Ok(mux)
    }

    /// List the live calendar muxes owned by `user_id`, oldest first
    pub async fn list_calendar_muxes(&self, user_id: i64) -> Result<Vec<CalendarMux>, AppError> {
        let sql = format!(
            "SELECT {CALENDAR_MUX_COLUMNS} FROM calendar_muxes \
             WHERE created_by_id = ? AND deleted_at IS NULL ORDER BY id"
        );
        let muxes = sqlx::query_as::<_, CalendarMux>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        record_db_query("select", "calendar_muxes");

        Ok(muxes)
    }

    /// Soft-delete a calendar mux owned by `user_id`
    ///
    /// # Returns
    /// `false` when no live mux with that id belongs to the user
    pub async fn delete_calendar_mux(&self, id: i64, user_id: i64) -> Result<bool, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE calendar_muxes
            SET deleted_at = ?, updated_at = ?
            WHERE id = ? AND created_by_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        record_db_query("delete", "calendar_muxes");

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IdentityResolver for Database {
    async fn resolve_user(
        &self,
        provider: &str,
        provider_user_id: &str,
        given_name: &str,
        family_name: &str,
        email: &str,
    ) -> Result<i64, AppError> {
        let user = self
            .find_or_create_user(provider, provider_user_id, given_name, family_name, email)
            .await?;
        Ok(user.id)
    }
}

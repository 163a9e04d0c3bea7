//! Family Calendar - backend for a shared family calendar
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - Google OAuth login/callback                              │
//! │  - REST API (user info, calendar muxes)                     │
//! │  - Health and metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Auth Core                             │
//! │  - State tokens and callback allowlist                      │
//! │  - Provider client, login flow controller                   │
//! │  - Session tokens (JWT)                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: REST handlers
//! - `auth`: Google OAuth login and session tokens
//! - `data`: Database layer
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;

use std::sync::Arc;

use auth::{CallbackAllowlist, GoogleProvider, OAuthFlow, ProviderClient, SessionSigner, TokenPage};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all handlers
///
/// Cloned for each request. Everything inside is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Login flow controller
    pub oauth: Arc<OAuthFlow>,

    /// Session token signer/verifier
    pub sessions: Arc<SessionSigner>,

    /// Token confirmation page
    pub token_page: Arc<TokenPage>,
}

impl AppState {
    /// Initialize application state with the Google provider
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        auth::provider::validate_google_config(&config.auth.google)
            .map_err(|e| error::AppError::Config(format!("invalid auth.google endpoint: {}", e)))?;

        let provider =
            GoogleProvider::new(config.auth.google.clone(), config.auth.provider_timeout())
                .map_err(|e| error::AppError::Internal(e.into()))?;

        Self::with_provider(config, Arc::new(provider)).await
    }

    /// Initialize application state around any identity provider
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Compile the token page
    /// 3. Build the session signer and login flow
    pub async fn with_provider(
        config: config::AppConfig,
        provider: Arc<dyn ProviderClient>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        // 2. Token page
        let token_page = TokenPage::from_config(&config.auth)?;

        // 3. Sessions and login flow
        let sessions = Arc::new(SessionSigner::new(
            &config.auth.jwt_secret,
            config.auth.session_ttl_seconds,
        ));
        let allowlist = CallbackAllowlist::new(config.auth.allowed_callbacks.iter().cloned());
        tracing::info!(
            provider = provider.name(),
            allowed_callbacks = allowlist.len(),
            "Login flow configured"
        );
        let oauth = OAuthFlow::new(allowlist, provider, db.clone(), sessions.clone());

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            oauth: Arc::new(oauth),
            sessions,
            token_page: Arc::new(token_page),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware, routing::get};
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.server);
    let metrics_routes = api::metrics_router()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth::auth_router())
        .nest("/api", api::api_router(state.clone()))
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(&server.cors_allowed_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %server.cors_allowed_origin,
                "Failed to parse server.cors_allowed_origin; denying cross-origin requests"
            );
            layer
        }
    }
}

async fn health_check() -> axum::Json<api::HealthResponse> {
    axum::Json(api::HealthResponse {
        status: "ok".to_string(),
    })
}

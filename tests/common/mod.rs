//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_extra::extract::cookie::Cookie;
use family_calendar::auth::provider::ProviderError;
use family_calendar::auth::{ProviderClient, ProviderProfile, ProviderToken};
use family_calendar::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Callback URL on the test allowlist
pub const ALLOWED_CALLBACK: &str = "http://localhost:3000/auth/callback";
/// Origin allowed by CORS in tests
pub const FRONTEND_ORIGIN: &str = "http://localhost:3000";
/// Consent page of the fake provider
pub const FAKE_AUTH_URL: &str = "https://provider.test/o/oauth2/auth";

/// Identity provider with a scripted outcome
pub struct FakeProvider {
    profile: ProviderProfile,
    fail_exchange: bool,
    fail_profile: bool,
    exchanged_codes: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn returning(profile: ProviderProfile) -> Self {
        Self {
            profile,
            fail_exchange: false,
            fail_profile: false,
            exchanged_codes: Mutex::new(Vec::new()),
        }
    }

    pub fn john() -> Self {
        Self::returning(john_profile())
    }

    pub fn failing_exchange() -> Self {
        Self {
            fail_exchange: true,
            ..Self::john()
        }
    }

    pub fn failing_profile() -> Self {
        Self {
            fail_profile: true,
            ..Self::john()
        }
    }

    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged_codes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> String {
        url::Url::parse_with_params(FAKE_AUTH_URL, &[("state", state)])
            .unwrap()
            .to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());
        if self.fail_exchange {
            return Err(ProviderError::Rejected {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            });
        }
        Ok(ProviderToken {
            access_token: format!("access-for-{code}"),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3599),
        })
    }

    async fn fetch_profile(&self, _token: &ProviderToken) -> Result<ProviderProfile, ProviderError> {
        if self.fail_profile {
            return Err(ProviderError::Rejected {
                status: 401,
                body: String::new(),
            });
        }
        Ok(self.profile.clone())
    }
}

pub fn john_profile() -> ProviderProfile {
    ProviderProfile {
        id: "google-123".to_string(),
        email: "john@example.com".to_string(),
        name: "John Doe".to_string(),
        given_name: "John".to_string(),
        family_name: "Doe".to_string(),
        verified_email: true,
        ..ProviderProfile::default()
    }
}

/// Configuration used by every test server
pub fn test_config(temp_dir: &TempDir) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            cors_allowed_origin: FRONTEND_ORIGIN.to_string(),
        },
        database: config::DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        },
        auth: config::AuthConfig {
            jwt_secret: "test-secret-key-32-bytes-long!!".to_string(),
            use_secure_connections: true,
            allowed_callbacks: vec![ALLOWED_CALLBACK.to_string()],
            session_ttl_seconds: 86400,
            provider_timeout_seconds: 5,
            success_template: None,
            google: config::GoogleOAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_url: "http://localhost:8080/callback".to_string(),
                ..config::GoogleOAuthConfig::default()
            },
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub _temp_dir: TempDir,
    /// Client that never follows redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Test server whose provider signs in John Doe
    pub async fn new() -> Self {
        Self::with_provider(FakeProvider::john()).await
    }

    pub async fn with_provider(provider: FakeProvider) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        Self::with_config(config, temp_dir, provider).await
    }

    /// Test server for a config built from [`test_config`] on `temp_dir`
    pub async fn with_config(
        config: config::AppConfig,
        temp_dir: TempDir,
        provider: FakeProvider,
    ) -> Self {
        let provider = Arc::new(provider);

        let state = AppState::with_provider(config, provider.clone())
            .await
            .unwrap();
        let addr = spawn_app(state.clone()).await;

        Self {
            addr,
            state,
            provider,
            _temp_dir: temp_dir,
            client: no_redirect_client(),
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user directly in the database
    pub async fn create_test_user(&self, provider_user_id: &str, given_name: &str) -> i64 {
        self.state
            .db
            .find_or_create_user(
                "google",
                provider_user_id,
                given_name,
                "Doe",
                &format!("{}@example.com", given_name.to_lowercase()),
            )
            .await
            .unwrap()
            .id
    }

    /// Mint a session token for `user_id`
    pub fn create_test_token(&self, user_id: i64) -> String {
        self.state
            .sessions
            .issue(user_id)
            .expect("Failed to create test token")
    }

    /// Create a user and a session token for it
    pub async fn signed_in_user(&self, provider_user_id: &str, given_name: &str) -> (i64, String) {
        let user_id = self.create_test_user(provider_user_id, given_name).await;
        (user_id, self.create_test_token(user_id))
    }
}

/// Serve `state` on a random local port; returns the base URL
pub async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = family_calendar::build_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build no-redirect client")
}

/// Parse every `Set-Cookie` header of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse_encoded(value.to_string()).ok())
        .collect()
}

pub fn find_cookie<'a>(cookies: &'a [Cookie<'static>], name: &str) -> Option<&'a Cookie<'static>> {
    cookies.iter().find(|cookie| cookie.name() == name)
}

/// `Cookie` request header carrying the given cookies back to the server
pub fn cookie_header(cookies: &[Cookie<'static>]) -> String {
    cookies
        .iter()
        .map(|cookie| cookie.stripped().encoded().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

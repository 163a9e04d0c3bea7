//! Identity provider client
//!
//! The login flow only talks to the provider through [`ProviderClient`], so
//! tests can substitute a scripted provider. [`GoogleProvider`] is the
//! production implementation.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::GoogleOAuthConfig;

/// Provider name stored alongside users created through Google sign-in
pub const GOOGLE_PROVIDER: &str = "google";

/// Errors talking to the identity provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure, timeout, or undecodable response
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Provider endpoint is not a valid URL
    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Access token returned by the provider's token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Profile returned by the provider's userinfo endpoint
///
/// The stable subject identifier is `id` in the v2 API and `sub` in the v3
/// API. Both are read so either generation works.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderProfile {
    pub id: String,
    pub sub: String,
    pub email: String,
    pub name: String,
    pub given_name: String,
    pub family_name: String,
    pub picture: String,
    pub verified_email: bool,
}

impl ProviderProfile {
    /// Stable provider user id: `id` wins over `sub` when both are set.
    pub fn stable_id(&self) -> Option<&str> {
        if !self.id.is_empty() {
            Some(&self.id)
        } else if !self.sub.is_empty() {
            Some(&self.sub)
        } else {
            None
        }
    }
}

/// The three provider interactions the login flow needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name recorded on resolved users (e.g. "google")
    fn name(&self) -> &'static str;

    /// Consent page URL carrying `state` for the provider to echo back
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError>;

    /// Fetch the signed-in user's profile
    async fn fetch_profile(&self, token: &ProviderToken) -> Result<ProviderProfile, ProviderError>;
}

/// Google OAuth 2.0 client
pub struct GoogleProvider {
    config: GoogleOAuthConfig,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(
        config: GoogleOAuthConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("family-calendar/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn build_authorization_url(&self, state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", &self.config.scopes.join(" ")),
                ("state", state),
            ],
        )
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ProviderClient for GoogleProvider {
    fn name(&self) -> &'static str {
        GOOGLE_PROVIDER
    }

    fn authorization_url(&self, state: &str) -> String {
        match self.build_authorization_url(state) {
            Ok(url) => url.to_string(),
            Err(error) => {
                // Startup validates the URL, so this only trips on a misconfiguration.
                tracing::error!(%error, auth_url = %self.config.auth_url, "Invalid Google auth URL");
                self.config.auth_url.clone()
            }
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        let response = self
            .http_client
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .await?;

        let token = ensure_success(response).await?.json::<ProviderToken>().await?;
        Ok(token)
    }

    async fn fetch_profile(&self, token: &ProviderToken) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        let profile = ensure_success(response)
            .await?
            .json::<ProviderProfile>()
            .await?;
        Ok(profile)
    }
}

/// Check that the configured Google endpoints parse, so a bad URL fails
/// at startup instead of on the first login.
pub fn validate_google_config(config: &GoogleOAuthConfig) -> Result<(), ProviderError> {
    Url::parse(&config.auth_url)?;
    Url::parse(&config.token_url)?;
    Url::parse(&config.userinfo_url)?;
    Ok(())
}

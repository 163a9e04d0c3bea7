//! Login flow controller
//!
//! Two transitions per login attempt:
//!
//! ```text
//! initiate(callback?) ──► allowlist ──► state token ──► provider consent URL
//!                                                          │
//! complete(cookies, state, code) ◄─────── provider redirect ┘
//!   1. state cookie present        (400 otherwise)
//!   2. query state == cookie state (400 otherwise)
//!   3. exchange code               (500 "Failed to exchange token")
//!   4. fetch profile               (500 "Failed to get user info")
//!   5. stable provider user id     (500 "Invalid user info from provider")
//!   6. resolve application user    (500 "Failed to process user")
//!   7. issue session token         (500 "Failed to generate token")
//! ```
//!
//! The controller holds no per-attempt state; the attempt lives in the
//! browser's cookies. Nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;

use super::allowlist::CallbackAllowlist;
use super::provider::{ProviderClient, ProviderProfile};
use super::session::SessionSigner;
use super::state_token::generate_state_token;
use crate::error::AppError;
use crate::metrics::record_login;

/// Maps a verified provider identity to an application user id,
/// creating the user if needed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_user(
        &self,
        provider: &str,
        provider_user_id: &str,
        given_name: &str,
        family_name: &str,
        email: &str,
    ) -> Result<i64, AppError>;
}

/// Mints a session token for an application user id.
#[cfg_attr(test, mockall::automock)]
pub trait SessionIssuer: Send + Sync {
    fn issue_session_token(&self, user_id: i64) -> Result<String, AppError>;
}

impl SessionIssuer for SessionSigner {
    fn issue_session_token(&self, user_id: i64) -> Result<String, AppError> {
        self.issue(user_id)
    }
}

/// Result of the initiate transition
#[derive(Debug, Clone)]
pub struct LoginStart {
    /// Value for the state cookie and the provider's `state` parameter
    pub state: String,
    /// Allowed callback to remember, verbatim
    pub callback: Option<String>,
    /// Provider consent page to redirect the browser to
    pub authorization_url: String,
}

/// What the browser remembered between initiate and complete
#[derive(Debug, Clone, Default)]
pub struct LoginAttempt {
    pub state: Option<String>,
    pub callback: Option<String>,
}

/// Result of the complete transition
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub token: String,
    pub user_id: i64,
    pub profile: ProviderProfile,
    pub callback: Option<String>,
}

impl CompletedLogin {
    /// `callback?token=<token>` when a callback was remembered
    pub fn redirect_target(&self) -> Option<String> {
        self.callback
            .as_ref()
            .map(|callback| format!("{}?token={}", callback, self.token))
    }
}

/// Orchestrates the two-phase provider login
pub struct OAuthFlow {
    allowlist: CallbackAllowlist,
    provider: Arc<dyn ProviderClient>,
    resolver: Arc<dyn IdentityResolver>,
    issuer: Arc<dyn SessionIssuer>,
}

impl OAuthFlow {
    pub fn new(
        allowlist: CallbackAllowlist,
        provider: Arc<dyn ProviderClient>,
        resolver: Arc<dyn IdentityResolver>,
        issuer: Arc<dyn SessionIssuer>,
    ) -> Self {
        Self {
            allowlist,
            provider,
            resolver,
            issuer,
        }
    }

    /// Start a login attempt.
    ///
    /// # Errors
    /// `Forbidden` when a non-empty callback is not on the allowlist. No
    /// state token is generated in that case.
    pub fn initiate(&self, callback: Option<&str>) -> Result<LoginStart, AppError> {
        let callback = match self.allowlist.check(callback) {
            Ok(callback) => callback.map(ToOwned::to_owned),
            Err(error) => {
                record_login("initiate", "rejected");
                return Err(error);
            }
        };

        let state = generate_state_token();
        let authorization_url = self.provider.authorization_url(&state);

        tracing::info!(
            provider = self.provider.name(),
            with_callback = callback.is_some(),
            "Login initiated"
        );
        record_login("initiate", "success");

        Ok(LoginStart {
            state,
            callback,
            authorization_url,
        })
    }

    /// Finish a login attempt from the provider's redirect.
    ///
    /// # Arguments
    /// * `attempt` - Cookies set by [`OAuthFlow::initiate`]
    /// * `query_state` - `state` echoed by the provider
    /// * `code` - Authorization code from the provider
    ///
    /// # Errors
    /// `Validation` for a missing or mismatched state, `Forbidden` for a
    /// callback cookie that is not allowlisted, `Upstream` for any provider,
    /// user store or signing failure.
    pub async fn complete(
        &self,
        attempt: LoginAttempt,
        query_state: &str,
        code: &str,
    ) -> Result<CompletedLogin, AppError> {
        let result = self.run_completion(attempt, query_state, code).await;

        match &result {
            Ok(login) => {
                tracing::info!(user_id = login.user_id, "Login completed");
                record_login("complete", "success");
            }
            Err(AppError::Validation(message) | AppError::Forbidden(message)) => {
                tracing::warn!(reason = %message, "Login completion rejected");
                record_login("complete", "rejected");
            }
            Err(_) => record_login("complete", "failed"),
        }

        result
    }

    async fn run_completion(
        &self,
        attempt: LoginAttempt,
        query_state: &str,
        code: &str,
    ) -> Result<CompletedLogin, AppError> {
        let expected_state = attempt
            .state
            .filter(|state| !state.is_empty())
            .ok_or_else(|| AppError::Validation("State cookie not found".to_string()))?;

        if query_state != expected_state {
            return Err(AppError::Validation("Invalid state parameter".to_string()));
        }

        // The callback cookie is client-held, so it must still be on the list
        let callback = self
            .allowlist
            .check(attempt.callback.as_deref())?
            .map(ToOwned::to_owned);

        let token = self
            .provider
            .exchange_code(code)
            .await
            .map_err(|e| AppError::upstream("Failed to exchange token", e))?;

        let profile = self
            .provider
            .fetch_profile(&token)
            .await
            .map_err(|e| AppError::upstream("Failed to get user info", e))?;

        let provider_user_id = profile.stable_id().ok_or_else(|| {
            AppError::upstream(
                "Invalid user info from provider",
                anyhow::anyhow!(
                    "{} profile has neither `id` nor `sub` (email: {:?})",
                    self.provider.name(),
                    profile.email
                ),
            )
        })?;

        let user_id = self
            .resolver
            .resolve_user(
                self.provider.name(),
                provider_user_id,
                &profile.given_name,
                &profile.family_name,
                &profile.email,
            )
            .await
            .map_err(|e| AppError::upstream("Failed to process user", e))?;

        let token = self
            .issuer
            .issue_session_token(user_id)
            .map_err(|e| AppError::upstream("Failed to generate token", e))?;

        Ok(CompletedLogin {
            token,
            user_id,
            profile,
            callback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{MockProviderClient, ProviderError, ProviderToken};
    use mockall::predicate::eq;

    const CALLBACK: &str = "http://localhost:3000/auth/callback";

    fn provider_token() -> ProviderToken {
        ProviderToken {
            access_token: "provider-access".to_string(),
            token_type: Some("Bearer".to_string()),
            expires_in: None,
        }
    }

    fn john() -> ProviderProfile {
        ProviderProfile {
            id: "google-123".to_string(),
            email: "john@example.com".to_string(),
            given_name: "John".to_string(),
            family_name: "Doe".to_string(),
            ..ProviderProfile::default()
        }
    }

    fn base_provider() -> MockProviderClient {
        let mut provider = MockProviderClient::new();
        provider.expect_name().return_const("google");
        provider
            .expect_authorization_url()
            .returning(|state| format!("https://accounts.google.com/o/oauth2/auth?state={state}"));
        provider
    }

    /// Provider that must never be called past the state check
    fn untouchable_provider() -> MockProviderClient {
        let mut provider = base_provider();
        provider.expect_exchange_code().never();
        provider.expect_fetch_profile().never();
        provider
    }

    fn happy_provider(profile: ProviderProfile) -> MockProviderClient {
        let mut provider = base_provider();
        provider
            .expect_exchange_code()
            .with(eq("auth-code"))
            .times(1)
            .returning(|_| Ok(provider_token()));
        provider
            .expect_fetch_profile()
            .times(1)
            .returning(move |_| Ok(profile.clone()));
        provider
    }

    fn resolver_returning(user_id: i64) -> MockIdentityResolver {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve_user()
            .returning(move |_, _, _, _, _| Ok(user_id));
        resolver
    }

    fn unused_resolver() -> MockIdentityResolver {
        let mut resolver = MockIdentityResolver::new();
        resolver.expect_resolve_user().never();
        resolver
    }

    fn issuer_returning(token: &'static str) -> MockSessionIssuer {
        let mut issuer = MockSessionIssuer::new();
        issuer
            .expect_issue_session_token()
            .returning(move |_| Ok(token.to_string()));
        issuer
    }

    fn unused_issuer() -> MockSessionIssuer {
        let mut issuer = MockSessionIssuer::new();
        issuer.expect_issue_session_token().never();
        issuer
    }

    fn flow(
        provider: MockProviderClient,
        resolver: MockIdentityResolver,
        issuer: MockSessionIssuer,
    ) -> OAuthFlow {
        OAuthFlow::new(
            CallbackAllowlist::new([CALLBACK.to_string()]),
            Arc::new(provider),
            Arc::new(resolver),
            Arc::new(issuer),
        )
    }

    fn attempt(state: &str, callback: Option<&str>) -> LoginAttempt {
        LoginAttempt {
            state: Some(state.to_string()),
            callback: callback.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn initiate_without_callback() {
        let flow = flow(base_provider(), unused_resolver(), unused_issuer());
        let start = flow.initiate(None).unwrap();

        assert!(start.callback.is_none());
        assert!(!start.state.is_empty());
        assert!(start.authorization_url.ends_with(&format!("state={}", start.state)));
    }

    #[test]
    fn initiate_keeps_allowed_callback_verbatim() {
        let flow = flow(base_provider(), unused_resolver(), unused_issuer());
        let start = flow.initiate(Some(CALLBACK)).unwrap();
        assert_eq!(start.callback.as_deref(), Some(CALLBACK));
    }

    #[test]
    fn initiate_rejects_unlisted_callback() {
        let mut provider = MockProviderClient::new();
        provider.expect_authorization_url().never();
        let flow = flow(provider, unused_resolver(), unused_issuer());

        let error = flow.initiate(Some("http://evil.com/steal")).unwrap_err();
        assert!(matches!(error, AppError::Forbidden(_)));
    }

    #[test]
    fn each_initiation_gets_a_fresh_state() {
        let flow = flow(base_provider(), unused_resolver(), unused_issuer());
        let first = flow.initiate(None).unwrap();
        let second = flow.initiate(None).unwrap();
        assert_ne!(first.state, second.state);
    }

    #[tokio::test]
    async fn tampered_callback_cookie_is_forbidden() {
        let flow = flow(untouchable_provider(), unused_resolver(), unused_issuer());
        let attempt = LoginAttempt {
            state: Some("state-1".to_string()),
            callback: Some("https://evil.example.com/steal".to_string()),
        };

        let error = flow.complete(attempt, "state-1", "auth-code").await.unwrap_err();
        assert!(matches!(error, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn missing_state_cookie_is_a_client_error() {
        let flow = flow(untouchable_provider(), unused_resolver(), unused_issuer());

        for cookies in [
            LoginAttempt::default(),
            LoginAttempt {
                state: Some(String::new()),
                callback: Some(CALLBACK.to_string()),
            },
        ] {
            let error = flow.complete(cookies, "", "auth-code").await.unwrap_err();
            assert!(matches!(error, AppError::Validation(ref m) if m == "State cookie not found"));
        }
    }

    #[tokio::test]
    async fn mismatched_state_is_a_client_error() {
        let flow = flow(untouchable_provider(), unused_resolver(), unused_issuer());

        for query_state in ["xyz", "ABC", "abc ", "ab", "", "abc%20"] {
            let error = flow
                .complete(attempt("abc", None), query_state, "auth-code")
                .await
                .unwrap_err();
            assert!(matches!(error, AppError::Validation(ref m) if m == "Invalid state parameter"));
        }
    }

    #[tokio::test]
    async fn successful_completion_without_callback() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve_user()
            .with(
                eq("google"),
                eq("google-123"),
                eq("John"),
                eq("Doe"),
                eq("john@example.com"),
            )
            .times(1)
            .returning(|_, _, _, _, _| Ok(42));
        let mut issuer = MockSessionIssuer::new();
        issuer
            .expect_issue_session_token()
            .with(eq(42))
            .times(1)
            .returning(|_| Ok("session.jwt.token".to_string()));

        let flow = flow(happy_provider(john()), resolver, issuer);
        let login = flow
            .complete(attempt("abc", None), "abc", "auth-code")
            .await
            .unwrap();

        assert_eq!(login.token, "session.jwt.token");
        assert_eq!(login.user_id, 42);
        assert_eq!(login.profile.email, "john@example.com");
        assert!(login.callback.is_none());
        assert!(login.redirect_target().is_none());
    }

    #[tokio::test]
    async fn successful_completion_with_callback_builds_redirect() {
        let flow = flow(
            happy_provider(john()),
            resolver_returning(1),
            issuer_returning("tok"),
        );
        let login = flow
            .complete(attempt("abc", Some(CALLBACK)), "abc", "auth-code")
            .await
            .unwrap();

        assert_eq!(
            login.redirect_target().as_deref(),
            Some("http://localhost:3000/auth/callback?token=tok")
        );
    }

    #[tokio::test]
    async fn failed_code_exchange_is_a_server_error() {
        let mut provider = base_provider();
        provider.expect_exchange_code().returning(|_| {
            Err(ProviderError::Rejected {
                status: 400,
                body: "invalid_grant".to_string(),
            })
        });
        provider.expect_fetch_profile().never();

        let flow = flow(provider, unused_resolver(), unused_issuer());
        let error = flow
            .complete(attempt("abc", None), "abc", "auth-code")
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::Upstream { message: "Failed to exchange token", .. }));
    }

    #[tokio::test]
    async fn failed_profile_fetch_is_a_server_error() {
        let mut provider = base_provider();
        provider
            .expect_exchange_code()
            .returning(|_| Ok(provider_token()));
        provider.expect_fetch_profile().returning(|_| {
            Err(ProviderError::Rejected {
                status: 401,
                body: String::new(),
            })
        });

        let flow = flow(provider, unused_resolver(), unused_issuer());
        let error = flow
            .complete(attempt("abc", None), "abc", "auth-code")
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::Upstream { message: "Failed to get user info", .. }));
    }

    #[tokio::test]
    async fn profile_without_identifier_never_yields_a_token() {
        let anonymous = ProviderProfile {
            email: "john@example.com".to_string(),
            ..ProviderProfile::default()
        };
        let flow = flow(happy_provider(anonymous), unused_resolver(), unused_issuer());

        let error = flow
            .complete(attempt("abc", None), "abc", "auth-code")
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AppError::Upstream { message: "Invalid user info from provider", .. }
        ));
    }

    #[tokio::test]
    async fn v3_subject_is_used_when_id_is_missing() {
        let v3 = ProviderProfile {
            id: String::new(),
            sub: "sub-789".to_string(),
            ..john()
        };
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve_user()
            .withf(|_, provider_user_id, _, _, _| provider_user_id == "sub-789")
            .times(1)
            .returning(|_, _, _, _, _| Ok(5));

        let flow = flow(happy_provider(v3), resolver, issuer_returning("tok"));
        let login = flow
            .complete(attempt("abc", None), "abc", "auth-code")
            .await
            .unwrap();
        assert_eq!(login.user_id, 5);
    }

    #[tokio::test]
    async fn resolver_failure_is_a_server_error() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve_user()
            .returning(|_, _, _, _, _| Err(AppError::Internal(anyhow::anyhow!("disk full"))));

        let flow = flow(happy_provider(john()), resolver, unused_issuer());
        let error = flow
            .complete(attempt("abc", None), "abc", "auth-code")
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Upstream { message: "Failed to process user", .. }));
    }

    #[tokio::test]
    async fn issuer_failure_is_a_server_error() {
        let mut issuer = MockSessionIssuer::new();
        issuer
            .expect_issue_session_token()
            .returning(|_| Err(AppError::Internal(anyhow::anyhow!("bad key"))));

        let flow = flow(happy_provider(john()), resolver_returning(1), issuer);
        let error = flow
            .complete(attempt("abc", None), "abc", "auth-code")
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Upstream { message: "Failed to generate token", .. }));
    }

    #[test]
    fn session_signer_acts_as_issuer() {
        let signer = SessionSigner::new("secret", 60);
        let token = signer.issue_session_token(9).unwrap();
        assert_eq!(signer.verify(&token).unwrap().user_id, 9);
    }
}

//! Google OAuth endpoints
//!
//! Implements the authorization code flow on top of [`OAuthFlow`]. The
//! browser keeps the attempt in two short-lived cookies between the redirect
//! to Google and Google's redirect back.

use axum::{
    Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::flow::LoginAttempt;
use super::page::TokenPageView;
use crate::AppState;
use crate::error::AppError;

/// Cookie holding the state token
pub const STATE_COOKIE: &str = "oauth_state";
/// Cookie holding the allowlisted callback URL
pub const CALLBACK_COOKIE: &str = "oauth_callback";
/// Lifetime of both login cookies
pub const LOGIN_COOKIE_MAX_AGE_SECS: i64 = 300;

/// Create authentication router
///
/// Routes:
/// - GET /login - Redirect to Google
/// - GET /callback - OAuth callback
/// - GET /auth/google, GET /auth/google/callback - aliases of the above
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(google_redirect))
        .route("/callback", get(google_callback))
        .route("/auth/google", get(google_redirect))
        .route("/auth/google/callback", get(google_callback))
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginQuery {
    callback: Option<String>,
}

/// GET /login
///
/// # Steps
/// 1. Check the optional callback against the allowlist (403 otherwise)
/// 2. Store state (and callback) in cookies
/// 3. Redirect to Google with client_id, redirect_uri, scope, state
async fn google_redirect(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let start = state.oauth.initiate(query.callback.as_deref())?;
    let secure = state.config.auth.use_secure_connections;

    let mut jar = jar.add(login_cookie(STATE_COOKIE, start.state, secure));
    if let Some(callback) = start.callback {
        jar = jar.add(login_cookie(CALLBACK_COOKIE, callback, secure));
    }

    Ok((jar, Redirect::temporary(&start.authorization_url)))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from Google's redirect
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    state: String,
    #[serde(default)]
    code: String,
}

/// GET /callback
///
/// # Steps
/// 1. Verify CSRF state against the cookie
/// 2. Exchange code, fetch profile, resolve user, issue session token
/// 3. Clear the login cookies
/// 4. Redirect to the stored callback with `?token=`, or render the token page
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let attempt = LoginAttempt {
        state: jar.get(STATE_COOKIE).map(|c| c.value().to_owned()),
        callback: jar.get(CALLBACK_COOKIE).map(|c| c.value().to_owned()),
    };
    let had_callback_cookie = attempt.callback.is_some();

    let login = state.oauth.complete(attempt, &query.state, &query.code).await?;

    let secure = state.config.auth.use_secure_connections;
    let mut jar = jar.add(expired_cookie(STATE_COOKIE, secure));
    if had_callback_cookie {
        jar = jar.add(expired_cookie(CALLBACK_COOKIE, secure));
    }

    if let Some(target) = login.redirect_target() {
        return Ok((jar, Redirect::temporary(&target)).into_response());
    }

    let view = TokenPageView {
        token: &login.token,
        given_name: &login.profile.given_name,
        family_name: &login.profile.family_name,
        email: &login.profile.email,
    };

    // The attempt is consumed either way, so the cookies go out with errors too
    Ok(match state.token_page.render(&view) {
        Ok(html) => (jar, Html(html)).into_response(),
        Err(error) => (jar, error).into_response(),
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn login_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(LOGIN_COOKIE_MAX_AGE_SECS))
        .build()
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

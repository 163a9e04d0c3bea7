//! Google OAuth authentication
//!
//! Handles:
//! - Login flow (state tokens, callback allowlist, provider calls)
//! - Session tokens
//! - Authentication middleware

pub mod allowlist;
pub mod flow;
mod middleware;
mod oauth;
pub mod page;
pub mod provider;
pub mod session;
pub mod state_token;

pub use allowlist::CallbackAllowlist;
pub use flow::{IdentityResolver, OAuthFlow, SessionIssuer};
pub use middleware::{AuthenticatedUser, CurrentUser, require_auth};
pub use oauth::{CALLBACK_COOKIE, STATE_COOKIE, auth_router};
pub use page::TokenPage;
pub use provider::{GoogleProvider, ProviderClient, ProviderProfile, ProviderToken};
pub use session::SessionSigner;

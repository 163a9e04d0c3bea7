//! One-time login state tokens
//!
//! Binds a login initiation to its completion. The value travels to the
//! provider in the authorization URL and back in the callback query, and is
//! remembered by the browser in the `oauth_state` cookie.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use rand::RngCore;
use rand::rngs::OsRng;

/// Random bytes per state token
pub const STATE_TOKEN_BYTES: usize = 32;

/// Generate a fresh URL-safe state token from the OS random source.
///
/// Panics only if the OS random source is unavailable, which the process
/// cannot recover from.
pub fn generate_state_token() -> String {
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

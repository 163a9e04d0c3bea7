//! Session tokens
//!
//! HS256 JWTs carrying only the application user id. There is no server-side
//! session storage or revocation: a token is valid while its signature and
//! expiry check out.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// `iss` claim on every session token
pub const SESSION_ISSUER: &str = "family-calendar-backend";

/// Claims encoded in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Application user id
    pub user_id: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
    pub iss: String,
}

/// Signs and verifies session tokens with the configured secret
pub struct SessionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl SessionSigner {
    /// # Arguments
    /// * `secret` - HMAC secret (`auth.jwt_secret`)
    /// * `ttl_seconds` - Token lifetime
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    /// Create a signed session token for `user_id`
    ///
    /// # Errors
    /// Returns error if the expiry overflows or the token cannot be encoded
    pub fn issue(&self, user_id: i64) -> Result<String, AppError> {
        let iat = Utc::now().timestamp();
        let exp = iat.checked_add(self.ttl_seconds).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "session expiry overflows with ttl of {} seconds",
                self.ttl_seconds
            ))
        })?;
        let claims = SessionClaims {
            user_id,
            iat,
            exp,
            iss: SESSION_ISSUER.to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }

    /// Verify and decode a session token
    ///
    /// Only HS256 tokens from this issuer that have not expired are accepted.
    ///
    /// # Errors
    /// Returns `Unauthorized` if the signature, algorithm, issuer or expiry
    /// check fails
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|error| {
                tracing::debug!(%error, "Rejected session token");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

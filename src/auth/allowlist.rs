//! Post-login redirect allowlist
//!
//! A client may ask to be sent back to a callback URL with its session
//! token. Only URLs configured verbatim are accepted; there is no prefix,
//! origin or normalisation matching.

use crate::error::AppError;

/// Message returned when a requested callback is not configured
pub const CALLBACK_NOT_ALLOWED: &str = "callback URL is not allowed";

/// Fixed set of permitted callback URLs
#[derive(Debug, Clone, Default)]
pub struct CallbackAllowlist {
    entries: Vec<String>,
}

impl CallbackAllowlist {
    pub fn new(entries: impl IntoIterator<Item = String>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Byte-for-byte membership test.
    pub fn is_allowed(&self, callback: &str) -> bool {
        self.entries.iter().any(|entry| entry == callback)
    }

    /// Check an optional client-supplied callback.
    ///
    /// An absent or empty callback skips the check and yields `None`.
    /// A present but unknown callback is a 403; it never falls back to the
    /// no-callback path.
    pub fn check<'a>(&self, callback: Option<&'a str>) -> Result<Option<&'a str>, AppError> {
        match callback {
            None | Some("") => Ok(None),
            Some(callback) if self.is_allowed(callback) => Ok(Some(callback)),
            Some(callback) => {
                tracing::warn!(callback = %callback, "Rejected login with unlisted callback");
                Err(AppError::Forbidden(CALLBACK_NOT_ALLOWED.to_string()))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

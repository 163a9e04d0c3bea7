//! Token confirmation page
//!
//! Shown at the end of a login that did not ask for a callback redirect.

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

use crate::config::AuthConfig;
use crate::error::AppError;

const TEMPLATE_NAME: &str = "auth_success";
const EMBEDDED_TEMPLATE: &str = include_str!("../../templates/auth_success.html");

/// Values substituted into the page
#[derive(Debug, Clone, Serialize)]
pub struct TokenPageView<'a> {
    pub token: &'a str,
    pub given_name: &'a str,
    pub family_name: &'a str,
    pub email: &'a str,
}

/// Compiled confirmation page template
pub struct TokenPage {
    registry: Handlebars<'static>,
}

impl TokenPage {
    /// Use `auth.success_template` when set, the embedded page otherwise.
    ///
    /// # Errors
    /// Returns `Config` if the configured file cannot be read or compiled
    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        match &config.success_template {
            Some(path) => Self::from_file(path),
            None => Self::from_source(EMBEDDED_TEMPLATE),
        }
    }

    pub fn embedded() -> Result<Self, AppError> {
        Self::from_source(EMBEDDED_TEMPLATE)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let mut registry = strict_registry();
        registry
            .register_template_file(TEMPLATE_NAME, path)
            .map_err(|e| {
                AppError::Config(format!(
                    "cannot load success template {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Self { registry })
    }

    pub fn from_source(source: &str) -> Result<Self, AppError> {
        let mut registry = strict_registry();
        registry
            .register_template_string(TEMPLATE_NAME, source)
            .map_err(|e| AppError::Config(format!("invalid success template: {}", e)))?;
        Ok(Self { registry })
    }

    /// Render the page. Values are HTML-escaped.
    pub fn render(&self, view: &TokenPageView<'_>) -> Result<String, AppError> {
        self.registry
            .render(TEMPLATE_NAME, view)
            .map_err(|e| AppError::Template(e.to_string()))
    }
}

fn strict_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry
}

//! Client configuration.
//!
//! [`ClientConfig::default`] resolves everything from the environment (a `.env` file in the
//! working directory is honoured), so most callers never build one by hand.

use crate::error::{QuotientError, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.quotientai.co/api/v1";
pub const API_KEY_ENV: &str = "QUOTIENT_API_KEY";
pub const BASE_URL_ENV: &str = "QUOTIENT_BASE_URL";

/// Configuration for connecting to the Quotient API
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Option<Duration>,
    /// Where a server-issued JWT is cached between runs. `None` disables caching.
    pub token_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        dotenv::dotenv().ok();

        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            base_url: std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Some(Duration::from_secs(60)),
            token_path: default_token_path(),
        }
    }
}

impl ClientConfig {
    /// Environment-derived configuration with an explicit API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn token_path(mut self, path: Option<PathBuf>) -> Self {
        self.token_path = path;
        self
    }

    /// The configured API key, or an authentication error explaining where it is read from.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            QuotientError::Authentication(format!(
                "could not find {API_KEY_ENV} in environment variables. \
                 if you do not have an API key, you can create one at https://app.quotientai.co \
                 in your settings page"
            ))
        })
    }
}

fn default_token_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    Some(PathBuf::from(home).join(".quotient").join("auth_token.json"))
}

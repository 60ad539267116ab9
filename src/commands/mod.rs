pub mod create;
pub mod list;

use anyhow::{Context, Result};
use quotientai::{ClientConfig, QuotientAi};

/// Build the API client from the environment, with an optional base URL override.
pub fn client(base_url: Option<String>) -> Result<QuotientAi> {
    let mut config = ClientConfig::default();
    if let Some(url) = base_url {
        config = config.base_url(url);
    }
    QuotientAi::with_config(config).context("failed to create Quotient client")
}

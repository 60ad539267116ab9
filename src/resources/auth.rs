use crate::error::Result;
use crate::http::HttpClient;
use serde_json::Value;
use tracing::debug;

/// Profile lookup for the API key in use.
pub struct AuthResource {
    http: HttpClient,
}

impl AuthResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Verify the configured credentials and return the caller's profile.
    pub async fn authenticate(&self) -> Result<Value> {
        debug!("Authenticating against {}", self.http.base_url());
        self.http.get("/auth/profile").await
    }

    /// The profile's user id, when the API reports one.
    pub async fn user_id(&self) -> Result<Option<String>> {
        let profile = self.authenticate().await?;
        Ok(profile["id"]
            .as_str()
            .or_else(|| profile["user_id"].as_str())
            .map(String::from))
    }
}

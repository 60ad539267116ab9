use super::{de, Filters};
use crate::error::Result;
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProvider {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
}

/// A model available for evaluation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub provider: Option<ModelProvider>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub owner_profile_id: Option<String>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

pub struct ModelsResource {
    http: HttpClient,
}

impl ModelsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<Model>> {
        self.filter(&[]).await
    }

    pub async fn filter(&self, filters: &Filters) -> Result<Vec<Model>> {
        self.http.get_with_query("/models", filters).await
    }

    /// Look a model up by its name, e.g. `gpt-4o-mini`.
    pub async fn get(&self, name: &str) -> Result<Option<Model>> {
        let models = self.list().await?;
        Ok(models.into_iter().find(|m| m.name == name))
    }
}

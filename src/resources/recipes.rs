use super::{de, Filters, Reference};
use crate::error::Result;
use crate::http::HttpClient;
use serde::{Deserialize, Serialize};

/// A model paired with a prompt template; jobs run a recipe against a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model: Option<Reference>,
    #[serde(default)]
    pub prompt_template: Option<Reference>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub owner_profile_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRecipe {
    pub name: String,
    pub description: Option<String>,
    pub model_id: i64,
    pub prompt_template_id: i64,
}

pub struct RecipesResource {
    http: HttpClient,
}

impl RecipesResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self, filters: &Filters) -> Result<Vec<Recipe>> {
        self.http.get_with_query("/recipes", filters).await
    }

    pub async fn create(&self, recipe: &NewRecipe) -> Result<Recipe> {
        self.http.post("/recipes", recipe).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn test_list_recipes_with_nested_refs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/recipes")
            .with_status(200)
            .with_body(r#"[{"id":1,"name":"qa-gpt","model":{"id":3,"name":"gpt-4o"},"prompt_template":{"id":5,"name":"qa"},"owner_profile_id":null}]"#)
            .create();

        let config = ClientConfig::with_api_key("k").base_url(server.url()).token_path(None);
        let recipes = RecipesResource::new(HttpClient::new(&config).unwrap())
            .list(&[])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(recipes[0].model.as_ref().unwrap().name.as_deref(), Some("gpt-4o"));
        assert_eq!(recipes[0].prompt_template.as_ref().unwrap().id.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_create_recipe() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/recipes")
            .match_body(mockito::Matcher::JsonString(
                r#"{"name":"qa-gpt","model_id":3,"prompt_template_id":5}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"id":9,"name":"qa-gpt"}"#)
            .create();

        let config = ClientConfig::with_api_key("k").base_url(server.url()).token_path(None);
        let recipe = RecipesResource::new(HttpClient::new(&config).unwrap())
            .create(&NewRecipe {
                name: "qa-gpt".to_string(),
                description: None,
                model_id: 3,
                prompt_template_id: 5,
            })
            .await
            .unwrap();

        mock.assert();
        assert_eq!(recipe.id, "9");
    }
}

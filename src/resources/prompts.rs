use super::{de, segment};
use crate::error::{QuotientError, Result};
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A versioned prompt template.
///
/// `user_prompt` is the template body; the API calls it `prompt_template_str`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "prompt_version", default)]
    pub version: i64,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(rename = "prompt_template_str", alias = "template_string", default)]
    pub user_prompt: String,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub owner_profile_id: Option<String>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Prompt {
    /// Chat messages for this prompt: the system prompt (if any) followed by the user prompt.
    pub fn messages(&self) -> Vec<Value> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": self.user_prompt}));
        messages
    }
}

pub struct PromptsResource {
    http: HttpClient,
}

impl PromptsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<Prompt>> {
        self.http.get("/prompts").await
    }

    /// Fetch a prompt, optionally pinned to a version.
    pub async fn get(&self, id: &str, version: Option<&str>) -> Result<Prompt> {
        let mut path = format!("/prompts/{}", segment(id));
        if let Some(version) = version {
            path.push_str(&format!("/versions/{}", segment(version)));
        }

        let mut prompts: Vec<Prompt> = self.http.get(&path).await?;
        if prompts.is_empty() {
            return Err(QuotientError::NotFound(format!("prompt {id} has no versions")));
        }
        Ok(prompts.swap_remove(0))
    }

    pub async fn create(
        &self,
        name: &str,
        system_prompt: Option<&str>,
        user_prompt: Option<&str>,
    ) -> Result<Prompt> {
        let body = json!({
            "name": name,
            "system_prompt": system_prompt,
            "prompt_template_str": user_prompt,
        });
        self.http.post("/prompts", &body).await
    }

    /// Create a new version of `prompt`. At least one field must change.
    pub async fn update(
        &self,
        prompt: &Prompt,
        name: Option<&str>,
        system_prompt: Option<&str>,
        user_prompt: Option<&str>,
    ) -> Result<Prompt> {
        if name.is_none() && system_prompt.is_none() && user_prompt.is_none() {
            return Err(QuotientError::Validation(
                "at least one field must be provided to update the prompt.".to_string(),
            ));
        }

        let body = json!({
            "id": prompt.id,
            "name": name,
            "system_prompt": system_prompt,
            "prompt_template_str": user_prompt,
        });
        self.http
            .patch(&format!("/prompts/{}", segment(&prompt.id)), &body)
            .await
    }

    pub async fn delete(&self, prompt: &Prompt) -> Result<()> {
        let status = self
            .http
            .delete(&format!("/prompts/{}", segment(&prompt.id)))
            .await?;
        if status != StatusCode::NO_CONTENT {
            return Err(QuotientError::Api {
                status: status.as_u16(),
                message: format!("failed to delete prompt {}", prompt.id),
                body: None,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    const PROMPT: &str = r#"{"id":"p1","name":"qa","prompt_version":2,"system_prompt":"Be terse.","prompt_template_str":"Q: {{input}}","created_at":"2024-05-01T12:00:00","updated_at":"2024-05-02T12:00:00"}"#;

    fn prompts_for(server: &mockito::ServerGuard) -> PromptsResource {
        let config = ClientConfig::with_api_key("k").base_url(server.url()).token_path(None);
        PromptsResource::new(HttpClient::new(&config).unwrap())
    }

    fn sample() -> Prompt {
        serde_json::from_str(PROMPT).unwrap()
    }

    #[test]
    fn test_messages_include_system_prompt() {
        let messages = sample().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "Q: {{input}}");
    }

    #[test]
    fn test_messages_without_system_prompt() {
        let mut prompt = sample();
        prompt.system_prompt = None;
        assert_eq!(prompt.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_get_specific_version() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/prompts/p1/versions/2")
            .with_status(200)
            .with_body(format!("[{PROMPT}]"))
            .create();

        let prompt = prompts_for(&server).get("p1", Some("2")).await.unwrap();

        mock.assert();
        assert_eq!(prompt.version, 2);
        assert_eq!(prompt.user_prompt, "Q: {{input}}");
    }

    #[tokio::test]
    async fn test_create_omits_missing_system_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/prompts")
            .match_body(mockito::Matcher::JsonString(
                r#"{"name":"qa","prompt_template_str":"Q: {{input}}"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(PROMPT)
            .create();

        let prompt = prompts_for(&server)
            .create("qa", None, Some("Q: {{input}}"))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(prompt.id, "p1");
    }

    #[tokio::test]
    async fn test_update_requires_a_field() {
        let server = mockito::Server::new_async().await;
        let result = prompts_for(&server).update(&sample(), None, None, None).await;
        assert!(matches!(result, Err(QuotientError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_expects_no_content() {
        let mut server = mockito::Server::new_async().await;
        server.mock("DELETE", "/prompts/p1").with_status(200).with_body("{}").create();

        let result = prompts_for(&server).delete(&sample()).await;
        assert!(matches!(result, Err(QuotientError::Api { status: 200, .. })));
    }
}

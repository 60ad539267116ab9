//! The async Quotient client.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpClient;
use crate::logger::QuotientLogger;
use crate::resources::{
    AuthResource, Dataset, DatasetsResource, DetectionsResource, JobsResource, LogsResource,
    MetricsResource, Model, ModelsResource, Prompt, PromptsResource, RecipesResource,
    ResultsResource, Run, RunsResource, TasksResource,
};
use crate::tracer::QuotientTracer;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Entry point to the Quotient API.
///
/// Every resource shares one authenticated transport. The logger and tracer are
/// inert until their `init` is called.
pub struct QuotientAi {
    config: ClientConfig,
    pub auth: AuthResource,
    pub models: ModelsResource,
    pub prompts: PromptsResource,
    pub datasets: DatasetsResource,
    pub recipes: RecipesResource,
    pub tasks: TasksResource,
    pub jobs: JobsResource,
    pub results: ResultsResource,
    pub runs: RunsResource,
    pub metrics: MetricsResource,
    pub logs: LogsResource,
    pub detections: DetectionsResource,
    pub logger: QuotientLogger,
    pub tracer: QuotientTracer,
}

impl QuotientAi {
    /// Build a client from the environment (`QUOTIENT_API_KEY`, `QUOTIENT_BASE_URL`).
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::with_api_key(api_key))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::new(&config)?;
        debug!("Quotient client targeting {}", http.base_url());

        Ok(Self {
            auth: AuthResource::new(http.clone()),
            models: ModelsResource::new(http.clone()),
            prompts: PromptsResource::new(http.clone()),
            datasets: DatasetsResource::new(http.clone()),
            recipes: RecipesResource::new(http.clone()),
            tasks: TasksResource::new(http.clone()),
            jobs: JobsResource::new(http.clone()),
            results: ResultsResource::new(http.clone()),
            runs: RunsResource::new(http.clone()),
            metrics: MetricsResource::new(http.clone()),
            logs: LogsResource::new(http.clone()),
            detections: DetectionsResource::new(http.clone()),
            logger: QuotientLogger::new(LogsResource::new(http.clone()), DetectionsResource::new(http.clone())),
            tracer: QuotientTracer::new(Some(http.api_key().to_string())),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check the API key and record the caller's user id on future tracing sessions.
    pub async fn authenticate(&self) -> Result<Value> {
        let profile = self.auth.authenticate().await?;
        match profile["id"].as_str().or_else(|| profile["user_id"].as_str()) {
            Some(user) => self.tracer.set_user(user),
            None => warn!("Profile response has no user id"),
        }
        Ok(profile)
    }

    /// Start an evaluation run.
    ///
    /// `parameters` may only contain `temperature`, `top_k`, `top_p` and `max_tokens`.
    pub async fn evaluate(
        &self,
        prompt: &Prompt,
        dataset: &Dataset,
        model: &Model,
        parameters: Map<String, Value>,
        metrics: Vec<String>,
    ) -> Result<Run> {
        self.runs
            .create(prompt, dataset, model, parameters, metrics)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuotientError;
    use crate::logger::{LogEntry, LoggerConfig};
    use serde_json::json;
    use std::time::Duration;

    fn client(server: &mockito::Server) -> QuotientAi {
        QuotientAi::with_config(
            ClientConfig::with_api_key("test-key")
                .base_url(server.url())
                .token_path(None),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_api_key_is_an_authentication_error() {
        let config = ClientConfig {
            api_key: None,
            ..ClientConfig::default()
        };
        let result = QuotientAi::with_config(config);
        assert!(matches!(result, Err(QuotientError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_authenticate_returns_profile() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/profile")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(r#"{"id": "user-9"}"#)
            .create_async()
            .await;

        let quotient = client(&server);
        let profile = quotient.authenticate().await.unwrap();

        mock.assert_async().await;
        assert_eq!(profile["id"], "user-9");
    }

    #[tokio::test]
    async fn test_evaluate_rejects_unknown_parameters_without_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/runs").expect(0).create_async().await;
        let quotient = client(&server);

        let prompt: Prompt = serde_json::from_value(json!({
            "id": "p1", "name": "qa", "prompt_template_str": "{{input}}"
        }))
        .unwrap();
        let dataset: Dataset = serde_json::from_value(json!({"id": "d1", "name": "golden"})).unwrap();
        let model: Model = serde_json::from_value(json!({"id": "m1", "name": "gpt-4o"})).unwrap();
        let mut parameters = Map::new();
        parameters.insert("frequency_penalty".to_string(), json!(0.2));

        let result = quotient
            .evaluate(&prompt, &dataset, &model, parameters, vec!["exact_match".to_string()])
            .await;

        assert!(matches!(result, Err(QuotientError::Validation(_))));
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_logger_delivers_through_shared_transport() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/logs")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"app_name": "chat", "environment": "prod"}"#.to_string(),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let quotient = client(&server);

        quotient.logger.init(LoggerConfig::new("chat", "prod")).unwrap();
        let id = quotient
            .logger
            .log(LogEntry::new("What is Rust?", "A systems language."))
            .unwrap();

        assert!(id.is_some());
        assert!(quotient.logger.drain(Some(Duration::from_secs(5))).await);
        mock.assert_async().await;
    }
}

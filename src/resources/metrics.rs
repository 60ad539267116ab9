use crate::error::{QuotientError, Result};
use crate::http::HttpClient;
use serde_json::Value;

/// Names of the evaluation metrics the platform can compute.
pub struct MetricsResource {
    http: HttpClient,
}

impl MetricsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let response: Value = self.http.get("/runs/metrics").await?;
        let data = response
            .get("data")
            .cloned()
            .ok_or_else(|| QuotientError::Validation("metrics response has no data field".to_string()))?;
        Ok(serde_json::from_value(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn metrics_for(server: &mockito::ServerGuard) -> MetricsResource {
        let config = ClientConfig::with_api_key("k").base_url(server.url()).token_path(None);
        MetricsResource::new(HttpClient::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_list_unwraps_data_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/runs/metrics")
            .with_status(200)
            .with_body(r#"{"data":["bertscore","exactmatch","faithfulness_selfcheckgpt"]}"#)
            .create();

        let metrics = metrics_for(&server).list().await.unwrap();

        mock.assert();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[1], "exactmatch");
    }

    #[tokio::test]
    async fn test_list_without_data_is_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/runs/metrics").with_status(200).with_body("{}").create();

        let result = metrics_for(&server).list().await;
        assert!(matches!(result, Err(QuotientError::Validation(_))));
    }
}

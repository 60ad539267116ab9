use super::{de, segment, Log, LogStatus};
use crate::error::Result;
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Detection results for a log, with the full log record attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub status: Option<LogStatus>,
    #[serde(default)]
    pub has_hallucination: Option<bool>,
    #[serde(default)]
    pub has_inconsistency: Option<bool>,
    #[serde(default)]
    pub evaluations: Vec<Value>,
    #[serde(default)]
    pub log_documents: Vec<Value>,
    #[serde(default)]
    pub log_message_history: Vec<Value>,
    #[serde(default)]
    pub log_instructions: Vec<Value>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    pub log: Log,
}

#[derive(Deserialize)]
struct RcaResponse {
    log: Option<Log>,
    #[serde(default)]
    evaluations: Vec<Value>,
    #[serde(default)]
    log_documents: Vec<Value>,
    #[serde(default)]
    log_message_history: Vec<Value>,
    #[serde(default)]
    log_instructions: Vec<Value>,
}

impl RcaResponse {
    fn into_detection(self) -> Option<Detection> {
        let log = self.log?;
        Some(Detection {
            id: log.id.clone(),
            status: log.status.clone(),
            has_hallucination: log.has_hallucination,
            has_inconsistency: log.has_inconsistency,
            evaluations: self.evaluations,
            log_documents: self.log_documents,
            log_message_history: self.log_message_history,
            log_instructions: self.log_instructions,
            updated_at: log.updated_at,
            log,
        })
    }
}

pub struct DetectionsResource {
    http: HttpClient,
}

impl DetectionsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Fetch the current detection state of a log once.
    pub async fn get(&self, log_id: &str) -> Result<Option<Detection>> {
        let response: RcaResponse = self
            .http
            .get(&format!("/logs/{}/rca", segment(log_id)))
            .await?;
        Ok(response.into_detection())
    }

    /// Poll until detection for `log_id` has finished.
    ///
    /// Request failures are logged and retried on the next tick. Returns `None` when
    /// `timeout` elapses, or immediately for an empty log id.
    pub async fn poll(
        &self,
        log_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Option<Detection> {
        if log_id.is_empty() {
            error!("Log ID is required for Detection");
            return None;
        }

        let start = tokio::time::Instant::now();
        while start.elapsed() < timeout {
            match self.get(log_id).await {
                Ok(Some(detection)) if detection.status.as_ref().is_some_and(LogStatus::is_final) => {
                    return Some(detection);
                }
                Ok(detection) => {
                    debug!(
                        "Detection for log {} not ready: {:?}",
                        log_id,
                        detection.and_then(|d| d.status)
                    );
                }
                Err(e) => error!("Error getting Detection results: {}", e),
            }
            tokio::time::sleep(interval).await;
        }

        error!(
            "Timed out waiting for Detection results after {} seconds",
            timeout.as_secs()
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    const LOG: &str = r#"{"id":"l1","app_name":"chatbot","environment":"dev","user_query":"q","model_output":"a","created_at":"2024-01-01T00:00:00"}"#;

    fn detections_for(server: &mockito::ServerGuard) -> DetectionsResource {
        let config = ClientConfig::with_api_key("k").base_url(server.url()).token_path(None);
        DetectionsResource::new(HttpClient::new(&config).unwrap())
    }

    fn rca(status: &str) -> String {
        let log = LOG.replace("\"created_at\"", &format!("\"status\":\"{status}\",\"has_hallucination\":true,\"created_at\""));
        format!(r#"{{"log":{log},"evaluations":[{{"sentence":"a","is_hallucinated":true}}]}}"#)
    }

    #[tokio::test]
    async fn test_poll_returns_completed_detection() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/logs/l1/rca")
            .with_status(200)
            .with_body(rca("log_created_and_detection_completed"))
            .create();

        let detection = detections_for(&server)
            .poll("l1", Duration::from_secs(1), Duration::from_millis(10))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(detection.has_hallucination, Some(true));
        assert_eq!(detection.evaluations.len(), 1);
        assert_eq!(detection.log.app_name, "chatbot");
    }

    #[tokio::test]
    async fn test_poll_times_out_while_pending() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/logs/l1/rca")
            .with_status(200)
            .with_body(rca("log_created_and_detection_in_progress"))
            .expect_at_least(1)
            .create();

        let detection = detections_for(&server)
            .poll("l1", Duration::from_millis(50), Duration::from_millis(10))
            .await;

        assert!(detection.is_none());
    }

    #[tokio::test]
    async fn test_poll_survives_errors() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/logs/l1/rca").with_status(500).create();

        let detection = detections_for(&server)
            .poll("l1", Duration::from_millis(30), Duration::from_millis(10))
            .await;

        assert!(detection.is_none());
    }

    #[tokio::test]
    async fn test_poll_empty_id() {
        let server = mockito::Server::new_async().await;
        assert!(detections_for(&server)
            .poll("", DEFAULT_POLL_TIMEOUT, DEFAULT_POLL_INTERVAL)
            .await
            .is_none());
    }
}

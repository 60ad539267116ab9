use super::{de, Reference};
use crate::error::Result;
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Server-side checks that can be requested for a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    Hallucination,
    DocumentRelevancy,
}

impl DetectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionType::Hallucination => "hallucination",
            DetectionType::DocumentRelevancy => "document_relevancy",
        }
    }
}

impl fmt::Display for DetectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hallucination" => Ok(DetectionType::Hallucination),
            "document_relevancy" | "inconsistency" => Ok(DetectionType::DocumentRelevancy),
            other => Err(format!("unknown detection type: {other}")),
        }
    }
}

/// Processing state of a log on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    LogNotFound,
    LogCreationInProgress,
    LogCreatedNoDetectionsPending,
    LogCreatedAndDetectionInProgress,
    LogCreatedAndDetectionCompleted,
    #[serde(other)]
    Unknown,
}

impl LogStatus {
    /// Detection results will not change once a log is in one of these states.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            LogStatus::LogCreatedNoDetectionsPending | LogStatus::LogCreatedAndDetectionCompleted
        )
    }
}

/// A retrieved document attached to a log: plain text, or content plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogDocument {
    Text(String),
    Document {
        page_content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
}

impl From<&str> for LogDocument {
    fn from(value: &str) -> Self {
        LogDocument::Text(value.to_string())
    }
}

impl From<String> for LogDocument {
    fn from(value: String) -> Self {
        LogDocument::Text(value)
    }
}

/// Payload for `POST /logs`.
#[derive(Debug, Clone, Serialize)]
pub struct NewLog {
    pub id: String,
    pub app_name: String,
    pub environment: String,
    pub tags: Map<String, Value>,
    pub user_query: String,
    pub model_output: String,
    pub documents: Vec<LogDocument>,
    pub message_history: Vec<Value>,
    pub instructions: Vec<String>,
    pub detections: Vec<DetectionType>,
    pub detection_sample_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// A log as stored by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub app_name: String,
    pub environment: String,
    #[serde(default)]
    pub user_query: String,
    #[serde(default)]
    pub model_output: String,
    #[serde(default)]
    pub documents: Vec<LogDocument>,
    #[serde(default)]
    pub message_history: Vec<Value>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub tags: Map<String, Value>,
    #[serde(default)]
    pub hallucination_detection: bool,
    #[serde(default)]
    pub inconsistency_detection: bool,
    #[serde(default)]
    pub hallucination_detection_sample_rate: Option<f64>,
    #[serde(default)]
    pub status: Option<LogStatus>,
    #[serde(default)]
    pub has_hallucination: Option<bool>,
    #[serde(default)]
    pub has_inconsistency: Option<bool>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<Reference>,
}

/// Filters for [`LogsResource::list`].
#[derive(Debug, Clone, Default)]
pub struct LogsQuery {
    pub app_name: Option<String>,
    pub environment: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LogsQuery {
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(app_name) = &self.app_name {
            query.push(("app_name".to_string(), app_name.clone()));
        }
        if let Some(environment) = &self.environment {
            query.push(("environment".to_string(), environment.clone()));
        }
        if let Some(start) = self.start_date {
            query.push(("start_date".to_string(), start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            query.push(("end_date".to_string(), end.to_rfc3339()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            query.push(("offset".to_string(), offset.to_string()));
        }
        query
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LogList {
    Wrapped { logs: Vec<Log> },
    Bare(Vec<Log>),
}

pub struct LogsResource {
    http: HttpClient,
}

impl LogsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Submit a log and wait for the server to accept it.
    pub async fn create(&self, log: &NewLog) -> Result<Value> {
        self.http.post("/logs", log).await
    }

    pub async fn list(&self, query: &LogsQuery) -> Result<Vec<Log>> {
        let list: LogList = self.http.get_with_query("/logs", &query.to_query()).await?;
        Ok(match list {
            LogList::Wrapped { logs } => logs,
            LogList::Bare(logs) => logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;

    fn logs_for(server: &mockito::ServerGuard) -> LogsResource {
        let config = ClientConfig::with_api_key("k").base_url(server.url()).token_path(None);
        LogsResource::new(HttpClient::new(&config).unwrap())
    }

    #[test]
    fn test_documents_accept_text_and_objects() {
        let docs: Vec<LogDocument> = serde_json::from_value(json!([
            "plain text",
            {"page_content": "with metadata", "metadata": {"source": "wiki"}}
        ]))
        .unwrap();

        assert_eq!(docs[0], LogDocument::Text("plain text".to_string()));
        assert!(matches!(&docs[1], LogDocument::Document { metadata: Some(m), .. } if m["source"] == "wiki"));
    }

    #[test]
    fn test_detection_type_parsing() {
        assert_eq!("HALLUCINATION".parse::<DetectionType>(), Ok(DetectionType::Hallucination));
        assert_eq!(
            "document_relevancy".parse::<DetectionType>(),
            Ok(DetectionType::DocumentRelevancy)
        );
        assert!("toxicity".parse::<DetectionType>().is_err());
        assert_eq!(
            serde_json::to_string(&DetectionType::DocumentRelevancy).unwrap(),
            r#""document_relevancy""#
        );
    }

    #[test]
    fn test_log_status_final_states() {
        let done: LogStatus = serde_json::from_str(r#""log_created_and_detection_completed""#).unwrap();
        let pending: LogStatus = serde_json::from_str(r#""log_created_and_detection_in_progress""#).unwrap();
        let odd: LogStatus = serde_json::from_str(r#""something_new""#).unwrap();

        assert!(done.is_final());
        assert!(!pending.is_final());
        assert_eq!(odd, LogStatus::Unknown);
    }

    #[tokio::test]
    async fn test_list_with_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/logs")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("app_name".into(), "chatbot".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"logs":[{"id":"l1","app_name":"chatbot","environment":"dev","user_query":"hi","model_output":"hello","status":"log_created_no_detections_pending"}]}"#)
            .create();

        let logs = logs_for(&server)
            .list(&LogsQuery {
                app_name: Some("chatbot".to_string()),
                limit: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();

        mock.assert();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, Some(LogStatus::LogCreatedNoDetectionsPending));
    }
}

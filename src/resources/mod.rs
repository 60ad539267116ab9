//! Typed clients for each remote resource.
//!
//! A resource holds a clone of the shared [`HttpClient`](crate::http::HttpClient) and issues
//! one request per operation (dataset row uploads are the exception, one request per row).
//! Failures are returned to the caller untouched.

pub mod auth;
pub mod datasets;
pub mod detections;
pub mod jobs;
pub mod logs;
pub mod metrics;
pub mod models;
pub mod prompts;
pub mod recipes;
pub mod results;
pub mod runs;
pub mod tasks;

pub use auth::AuthResource;
pub use datasets::{Dataset, DatasetRow, DatasetRowMetadata, DatasetsResource, NewDatasetRow};
pub use detections::{Detection, DetectionsResource};
pub use jobs::{Job, JobProgress, JobStatus, JobsResource, NewJob, StepProgress};
pub use logs::{DetectionType, Log, LogDocument, LogStatus, LogsQuery, LogsResource, NewLog};
pub use metrics::MetricsResource;
pub use models::{Model, ModelProvider, ModelsResource};
pub use prompts::{Prompt, PromptsResource};
pub use recipes::{NewRecipe, Recipe, RecipesResource};
pub use results::{JobResults, ResultContent, ResultRow, ResultsResource};
pub use runs::{Run, RunResult, RunSummary, RunsResource};
pub use tasks::{NewTask, Task, TasksResource};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// `{id, name}` reference embedded in another record. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Equality filters sent as query parameters, e.g. `[("status", "Completed")]`.
pub type Filters = [(String, String)];

/// Percent-encode a caller supplied identifier for use as a path segment.
pub(crate) fn segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Deserializers for the loosely typed parts of the API payloads.
pub(crate) mod de {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Identifiers arrive as strings from the current API and as integers from older endpoints.
    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
        }
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
        }
    }

    /// ISO-8601 timestamps, with or without an offset. Naive values are taken as UTC.
    pub fn timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

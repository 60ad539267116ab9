use super::{de, segment};
use crate::error::Result;
use crate::http::HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Prompt, completion and reference answer for one evaluated example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultContent {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub input_text: Value,
    #[serde(default)]
    pub completion: Value,
    #[serde(default)]
    pub answer: Value,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub formatted_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub content: ResultContent,
    /// Headline metric score for the row.
    #[serde(default)]
    pub value: Value,
    /// Per-metric scores, keyed by metric name.
    #[serde(default)]
    pub metric: Map<String, Value>,
}

/// Scored outputs of a finished job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub results: Vec<ResultRow>,
}

impl JobResults {
    /// Render the results as CSV: content columns followed by one column per metric.
    pub fn to_csv_string(&self) -> String {
        let metric_names: Vec<String> = {
            let mut names: Vec<String> = self
                .results
                .iter()
                .flat_map(|r| r.metric.keys().cloned())
                .collect();
            names.sort();
            names.dedup();
            names
        };

        let mut out = String::new();
        let mut header = vec![
            "id", "input_text", "answer", "completion", "context", "formatted_content",
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
        header.extend(metric_names.iter().cloned());
        out.push_str(&csv_line(&header));

        for row in &self.results {
            let c = &row.content;
            let mut fields = vec![
                c.id.clone().unwrap_or_default(),
                plain(&c.input_text),
                plain(&c.answer),
                plain(&c.completion),
                c.context.clone().unwrap_or_default(),
                c.formatted_content.clone().unwrap_or_default(),
            ];
            fields.extend(
                metric_names
                    .iter()
                    .map(|m| row.metric.get(m).map(plain).unwrap_or_default()),
            );
            out.push_str(&csv_line(&fields));
        }

        out
    }

    /// Write `quotient-results-{id}.csv` into `dir` and return its path.
    pub fn to_csv(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(format!("quotient-results-{}.csv", self.id));
        std::fs::write(&path, self.to_csv_string())?;
        info!("Results saved to {}", path.display());
        Ok(path)
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_line(fields: &[String]) -> String {
    let escaped: Vec<String> = fields
        .iter()
        .map(|f| {
            if f.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", f.replace('"', "\"\""))
            } else {
                f.clone()
            }
        })
        .collect();
    format!("{}\n", escaped.join(","))
}

pub struct ResultsResource {
    http: HttpClient,
}

impl ResultsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn get(&self, job_id: &str) -> Result<JobResults> {
        self.http
            .get(&format!("/jobs/{}/results", segment(job_id)))
            .await
    }
}

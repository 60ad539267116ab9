use super::{de, segment, Dataset, Model, Prompt};
use crate::error::{QuotientError, Result};
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Inference parameters accepted by [`RunsResource::create`].
pub const VALID_PARAMETERS: [&str; 4] = ["temperature", "top_k", "top_p", "max_tokens"];

/// One processed dataset row of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub input: String,
    pub output: String,
    /// Metric name to score.
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RunResult {
    fn score(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).and_then(as_score)
    }

    /// Mean over every metric value, booleans counted as 0/1.
    fn aggregate_score(&self) -> f64 {
        let scores: Vec<f64> = self.values.values().filter_map(as_score).collect();
        if scores.is_empty() {
            return 0.0;
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn as_score(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_bool().map(|b| if b { 1.0 } else { 0.0 }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub prompt: String,
    pub dataset: String,
    pub model: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub metrics: Vec<String>,
    pub status: String,
    #[serde(default)]
    pub results: Vec<RunResult>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub avg: f64,
    /// Mean squared deviation from `avg`.
    pub stddev: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub model: String,
    pub parameters: Map<String, Value>,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub best: Vec<RunResult>,
    pub worst: Vec<RunResult>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Per-metric averages plus the best and worst rows. `None` until results exist.
    pub fn summarize(&self, best_n: usize, worst_n: usize) -> Option<RunSummary> {
        if self.results.is_empty() {
            return None;
        }

        let n = self.results.len() as f64;
        let metrics = self
            .metrics
            .iter()
            .map(|metric| {
                let scores: Vec<f64> = self
                    .results
                    .iter()
                    .map(|r| r.score(metric).unwrap_or(0.0))
                    .collect();
                let avg = scores.iter().sum::<f64>() / n;
                let stddev = scores.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / n;
                (metric.clone(), MetricSummary { avg, stddev })
            })
            .collect();

        let mut ranked = self.results.clone();
        ranked.sort_by(|a, b| b.aggregate_score().total_cmp(&a.aggregate_score()));
        let best = ranked.iter().take(best_n).cloned().collect();
        let worst = ranked.iter().rev().take(worst_n).cloned().collect();

        Some(RunSummary {
            run_id: self.id.clone(),
            model: self.model.clone(),
            parameters: self.parameters.clone(),
            metrics,
            best,
            worst,
            created_at: self.created_at,
        })
    }
}

pub struct RunsResource {
    http: HttpClient,
}

impl RunsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<Run>> {
        self.http.get("/runs").await
    }

    pub async fn get(&self, run_id: &str) -> Result<Run> {
        self.http.get(&format!("/runs/{}", segment(run_id))).await
    }

    /// Start an evaluation run of `prompt` over `dataset` with `model`.
    pub async fn create(
        &self,
        prompt: &Prompt,
        dataset: &Dataset,
        model: &Model,
        parameters: Map<String, Value>,
        metrics: Vec<String>,
    ) -> Result<Run> {
        validate_parameters(&parameters)?;

        let body = json!({
            "prompt_id": prompt.id,
            "dataset_id": dataset.id,
            "model_id": model.id,
            "parameters": parameters,
            "metrics": metrics,
        });
        let created: Value = self.http.post("/runs", &body).await?;

        Ok(Run {
            id: created["id"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| created["id"].to_string()),
            prompt: prompt.id.clone(),
            dataset: dataset.id.clone(),
            model: model.id.clone(),
            parameters,
            metrics,
            status: created["status"].as_str().unwrap_or("pending").to_string(),
            results: Vec::new(),
            created_at: created["created_at"].as_str().and_then(de::parse_timestamp),
            finished_at: created["finished_at"].as_str().and_then(de::parse_timestamp),
        })
    }

    /// Average-score deltas between runs on the same dataset.
    ///
    /// Runs must share a dataset, and may differ in prompt or in model but not both.
    /// With two runs the result maps metric to `first - second`; with more, each run id maps
    /// to its delta against the first run.
    pub fn compare(&self, runs: &[Run]) -> Result<Option<Value>> {
        compare_runs(runs)
    }
}

fn validate_parameters(parameters: &Map<String, Value>) -> Result<()> {
    let invalid: Vec<&str> = parameters
        .keys()
        .map(String::as_str)
        .filter(|k| !VALID_PARAMETERS.contains(k))
        .collect();

    if invalid.is_empty() {
        return Ok(());
    }

    Err(QuotientError::Validation(format!(
        "invalid parameters: {}. valid parameters are: {}",
        invalid.join(", "),
        VALID_PARAMETERS.join(", ")
    )))
}

fn compare_runs(runs: &[Run]) -> Result<Option<Value>> {
    let distinct = |f: fn(&Run) -> &str| {
        let mut values: Vec<&str> = runs.iter().map(f).collect();
        values.sort();
        values.dedup();
        values.len()
    };

    if distinct(|r| r.dataset.as_str()) > 1 {
        return Err(QuotientError::Validation(
            "all runs must be on the same dataset in order to compare them".to_string(),
        ));
    }
    if distinct(|r| r.prompt.as_str()) > 1 && distinct(|r| r.model.as_str()) > 1 {
        return Err(QuotientError::Validation(
            "all runs must be on the same prompt or model in order to compare them".to_string(),
        ));
    }
    if runs.len() < 2 {
        return Ok(None);
    }

    let summaries: Vec<RunSummary> = runs.iter().filter_map(|r| r.summarize(0, 0)).collect();
    if summaries.len() != runs.len() {
        return Ok(None);
    }

    let delta = |a: &RunSummary, b: &RunSummary| -> Value {
        a.metrics
            .iter()
            .map(|(metric, s)| {
                let other = b.metrics.get(metric).map(|m| m.avg).unwrap_or(0.0);
                (
                    metric.clone(),
                    json!({"avg": s.avg - other, "stddev": s.stddev}),
                )
            })
            .collect::<Map<String, Value>>()
            .into()
    };

    if runs.len() == 2 {
        return Ok(Some(delta(&summaries[0], &summaries[1])));
    }

    let by_run: Map<String, Value> = summaries
        .iter()
        .map(|s| (s.run_id.clone(), delta(s, &summaries[0])))
        .collect();
    Ok(Some(by_run.into()))
}

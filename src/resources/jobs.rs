use super::{de, segment, Filters, Reference};
use crate::error::{QuotientError, Result};
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Lifecycle of an evaluation job. Unknown server states deserialize as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Scheduled => "Scheduled",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Other => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub task_id: i64,
    pub recipe_id: i64,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub num_fewshot_examples: i64,
    pub status: JobStatus,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub task: Option<Reference>,
    #[serde(default)]
    pub recipe: Option<Reference>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub owner_profile_id: Option<String>,
}

/// Parameters for scheduling a job.
#[derive(Debug, Clone, Serialize)]
pub struct NewJob {
    pub task_id: i64,
    pub recipe_id: i64,
    pub num_fewshot_examples: i64,
    pub limit: Option<i64>,
}

impl NewJob {
    pub fn new(task_id: i64, recipe_id: i64) -> Self {
        Self {
            task_id,
            recipe_id,
            num_fewshot_examples: 0,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_fewshot_examples(mut self, n: i64) -> Self {
        self.num_fewshot_examples = n;
        self
    }
}

/// One chunk tracker reported by `/jobs/{id}/progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressTracker {
    pub job_step: String,
    pub total_chunks: u64,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Completed and in-flight chunk counts for one job step (`Inference` or `Metrics`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepProgress {
    pub completed: u64,
    pub total: u64,
    pub in_flight: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobProgress {
    pub trackers: Vec<ProgressTracker>,
}

impl JobProgress {
    pub const INFERENCE: &'static str = "Inference";
    pub const METRICS: &'static str = "Metrics";

    pub fn step(&self, job_step: &str) -> StepProgress {
        let trackers: Vec<_> = self.trackers.iter().filter(|t| t.job_step == job_step).collect();
        let in_flight = trackers.iter().filter(|t| t.finished_at.is_none()).count() as u64;
        StepProgress {
            completed: trackers.len() as u64 - in_flight,
            total: trackers.first().map(|t| t.total_chunks).unwrap_or(0),
            in_flight,
        }
    }

    /// True once both steps have finished every chunk.
    pub fn is_complete(&self) -> bool {
        let inference = self.step(Self::INFERENCE);
        let metrics = self.step(Self::METRICS);
        inference.completed > 0
            && metrics.completed > 0
            && inference.completed == inference.total
            && metrics.completed == metrics.total
    }
}

pub struct JobsResource {
    http: HttpClient,
}

impl JobsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Schedule a job. The job is stamped `Scheduled` with the current UTC time.
    pub async fn create(&self, job: &NewJob) -> Result<Job> {
        let mut body = serde_json::to_value(job)?;
        body["status"] = serde_json::to_value(JobStatus::Scheduled)?;
        body["created_at"] = Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string().into();

        info!("Scheduling job for task {} with recipe {}", job.task_id, job.recipe_id);
        let created: CreatedJob = self.http.post("/jobs", &body).await?;
        created.into_job()
    }

    pub async fn list(&self, filters: &Filters) -> Result<Vec<Job>> {
        self.http.get_with_query("/jobs", filters).await
    }

    pub async fn get(&self, id: &str) -> Result<Job> {
        let filters = vec![("id".to_string(), id.to_string())];
        self.list(&filters)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QuotientError::NotFound(format!("job {id} does not exist")))
    }

    pub async fn progress(&self, id: &str) -> Result<JobProgress> {
        self.http.get(&format!("/jobs/{}/progress", segment(id))).await
    }

    /// Poll until the job reaches a terminal status. Returns `None` if `timeout` elapses first.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Option<Job>> {
        let start = tokio::time::Instant::now();
        loop {
            let job = self.get(id).await?;
            debug!("Job {} is {}", id, job.status);
            if job.status.is_terminal() {
                return Ok(Some(job));
            }
            if start.elapsed() + interval > timeout {
                return Ok(None);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Job creation may answer with the record or a one-element array of it.
#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedJob {
    One(Job),
    Many(Vec<Job>),
}

impl CreatedJob {
    fn into_job(self) -> Result<Job> {
        match self {
            CreatedJob::One(job) => Ok(job),
            CreatedJob::Many(jobs) => jobs
                .into_iter()
                .next()
                .ok_or_else(|| QuotientError::Validation("job creation returned no job".to_string())),
        }
    }
}

//! Fire-and-forget logging of model interactions.
//!
//! A [`QuotientLogger`] is configured once with [`QuotientLogger::init`] and then accepts
//! events through [`QuotientLogger::log`]. Each accepted event gets a client-side id and is
//! handed to a background [`LogQueue`]; the caller never waits on the network. Detection
//! flags only ask the server to run checks, nothing is evaluated locally.

mod queue;

pub use queue::{LogQueue, QueueStats, DEFAULT_QUEUE_CAPACITY};

use crate::error::{QuotientError, Result};
use crate::resources::detections::{Detection, DetectionsResource};
use crate::resources::logs::{DetectionType, LogDocument, LogsResource, NewLog};
use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Session settings for a [`QuotientLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerConfig {
    pub app_name: String,
    pub environment: String,
    /// Tags attached to every event. Tags given to a single call override these.
    pub tags: Map<String, Value>,
    pub detections: Vec<DetectionType>,
    /// Fraction of events sent at all, in `[0.0, 1.0]`.
    pub sample_rate: f64,
    /// Fraction of sent events the server runs detections on, in `[0.0, 1.0]`.
    pub detection_sample_rate: f64,
}

impl LoggerConfig {
    pub fn new(app_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            environment: environment.into(),
            tags: Map::new(),
            detections: Vec::new(),
            sample_rate: 1.0,
            detection_sample_rate: 0.0,
        }
    }

    pub fn with_tags(mut self, tags: Map<String, Value>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_detections(mut self, detections: Vec<DetectionType>) -> Self {
        self.detections = detections;
        self
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_detection_sample_rate(mut self, rate: f64) -> Self {
        self.detection_sample_rate = rate;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(QuotientError::Validation("app_name must be a non-empty string".to_string()));
        }
        if self.environment.trim().is_empty() {
            return Err(QuotientError::Validation(
                "environment must be a non-empty string".to_string(),
            ));
        }
        check_rate("sample_rate", self.sample_rate)?;
        check_rate("detection_sample_rate", self.detection_sample_rate)
    }
}

fn check_rate(name: &str, rate: f64) -> Result<()> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(QuotientError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {rate}"
        )))
    }
}

/// One model interaction to log.
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    pub user_query: String,
    pub model_output: String,
    pub documents: Vec<LogDocument>,
    pub message_history: Vec<Value>,
    pub instructions: Vec<String>,
    pub tags: Map<String, Value>,
    /// Overrides the session's detections for this event.
    pub detections: Option<Vec<DetectionType>>,
    /// Overrides the session's detection sample rate for this event.
    pub detection_sample_rate: Option<f64>,
}

impl LogEntry {
    pub fn new(user_query: impl Into<String>, model_output: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            model_output: model_output.into(),
            ..Default::default()
        }
    }

    pub fn with_documents<I, D>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<LogDocument>,
    {
        self.documents = documents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_message_history(mut self, messages: Vec<Value>) -> Self {
        self.message_history = messages;
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_tags(mut self, tags: Map<String, Value>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_detections(mut self, detections: Vec<DetectionType>) -> Self {
        self.detections = Some(detections);
        self
    }

    pub fn with_detection_sample_rate(mut self, rate: f64) -> Self {
        self.detection_sample_rate = Some(rate);
        self
    }
}

pub struct QuotientLogger {
    config: RwLock<Option<LoggerConfig>>,
    queue: LogQueue,
    detections: DetectionsResource,
}

impl QuotientLogger {
    pub(crate) fn new(logs: LogsResource, detections: DetectionsResource) -> Self {
        Self {
            config: RwLock::new(None),
            queue: LogQueue::new(logs),
            detections,
        }
    }

    /// Configure the logging session. Calling it again replaces the previous session.
    pub fn init(&self, config: LoggerConfig) -> Result<()> {
        config.validate()?;
        info!(
            "Logger configured for {} ({})",
            config.app_name, config.environment
        );
        let mut slot = self
            .config
            .write()
            .map_err(|_| QuotientError::Config("logger configuration lock poisoned".to_string()))?;
        *slot = Some(config);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.config.read().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Submit one event without waiting for delivery.
    ///
    /// Returns the generated log id, or `None` when the event was dropped by sampling.
    /// Must be called from within a tokio runtime, which runs the delivery worker.
    pub fn log(&self, entry: LogEntry) -> Result<Option<String>> {
        let config = self
            .config
            .read()
            .map_err(|_| QuotientError::Config("logger configuration lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| QuotientError::NotConfigured("logger".to_string()))?;

        if !sampled(config.sample_rate) {
            debug!("Log dropped by sampling (rate {})", config.sample_rate);
            return Ok(None);
        }

        let detections = entry.detections.clone().unwrap_or(config.detections);
        let detection_sample_rate = entry
            .detection_sample_rate
            .unwrap_or(config.detection_sample_rate);
        check_rate("detection_sample_rate", detection_sample_rate)?;
        validate_entry(&entry, &detections)?;

        let mut tags = config.tags;
        tags.extend(entry.tags);

        let id = Uuid::new_v4().to_string();
        self.queue.enqueue(NewLog {
            id: id.clone(),
            app_name: config.app_name,
            environment: config.environment,
            tags,
            user_query: entry.user_query,
            model_output: entry.model_output,
            documents: entry.documents,
            message_history: entry.message_history,
            instructions: entry.instructions,
            detections,
            detection_sample_rate,
            created_at: Utc::now(),
        })?;

        Ok(Some(id))
    }

    /// Wait until every queued event has been attempted. `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Option<Duration>) -> bool {
        self.queue.drain(timeout).await
    }

    /// Delivered, failed and dropped event counts for this logger.
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Drain the queue and stop the delivery worker.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> bool {
        self.queue.shutdown(timeout).await
    }

    /// Wait for the server to finish detections on a logged event.
    pub async fn poll_for_detection(
        &self,
        log_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Option<Detection> {
        self.detections.poll(log_id, timeout, interval).await
    }
}

fn sampled(rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    rand::thread_rng().gen::<f64>() < rate
}

fn validate_entry(entry: &LogEntry, detections: &[DetectionType]) -> Result<()> {
    for (i, doc) in entry.documents.iter().enumerate() {
        if let LogDocument::Document { page_content, .. } = doc {
            if page_content.is_empty() {
                return Err(QuotientError::Validation(format!(
                    "documents[{i}] has an empty page_content"
                )));
            }
        }
    }

    if detections.contains(&DetectionType::Hallucination)
        && entry.documents.is_empty()
        && entry.message_history.is_empty()
        && entry.instructions.is_empty()
    {
        return Err(QuotientError::Validation(
            "hallucination detection requires at least one of documents, message_history or instructions"
                .to_string(),
        ));
    }

    if detections.contains(&DetectionType::DocumentRelevancy) && entry.documents.is_empty() {
        return Err(QuotientError::Validation(
            "document relevancy detection requires documents".to_string(),
        ));
    }

    Ok(())
}

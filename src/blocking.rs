//! A synchronous wrapper around [`crate::QuotientAi`].
//!
//! The blocking client owns a multi-threaded tokio runtime and drives the async client on
//! it. Background log delivery runs on that runtime's worker threads, so
//! [`QuotientAi::log`] returns without waiting for the network.
//!
//! Do not create or drop this client from inside an async context.

use crate::client::QuotientAi as AsyncQuotientAi;
use crate::config::ClientConfig;
use crate::error::{QuotientError, Result};
use crate::logger::{LogEntry, LoggerConfig};
use crate::resources::{Dataset, Detection, Model, Prompt, Run};
use crate::tracer::QuotientTracer;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::warn;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct QuotientAi {
    inner: AsyncQuotientAi,
    runtime: Runtime,
}

impl QuotientAi {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("quotient-worker")
            .enable_all()
            .build()
            .map_err(|e| QuotientError::Config(format!("failed to start runtime: {e}")))?;

        let inner = {
            let _guard = runtime.enter();
            AsyncQuotientAi::with_config(config)?
        };
        Ok(Self { inner, runtime })
    }

    /// The async client this wrapper drives.
    pub fn inner(&self) -> &AsyncQuotientAi {
        &self.inner
    }

    /// Run any async client operation to completion.
    ///
    /// ```rust,ignore
    /// let prompts = quotient.run(|q| q.prompts.list())?;
    /// ```
    pub fn run<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a AsyncQuotientAi) -> Fut,
        Fut: Future<Output = T>,
    {
        self.runtime.block_on(f(&self.inner))
    }

    pub fn authenticate(&self) -> Result<Value> {
        self.run(|q| q.authenticate())
    }

    pub fn evaluate(
        &self,
        prompt: &Prompt,
        dataset: &Dataset,
        model: &Model,
        parameters: Map<String, Value>,
        metrics: Vec<String>,
    ) -> Result<Run> {
        self.run(|q| q.evaluate(prompt, dataset, model, parameters, metrics))
    }

    pub fn init_logger(&self, config: LoggerConfig) -> Result<()> {
        self.inner.logger.init(config)
    }

    /// Queue one event for delivery. See [`crate::logger::QuotientLogger::log`].
    pub fn log(&self, entry: LogEntry) -> Result<Option<String>> {
        let _guard = self.runtime.enter();
        self.inner.logger.log(entry)
    }

    /// Block until queued events have been attempted.
    pub fn drain_logs(&self, timeout: Option<Duration>) -> bool {
        self.runtime.block_on(self.inner.logger.drain(timeout))
    }

    pub fn poll_for_detection(
        &self,
        log_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Option<Detection> {
        self.runtime
            .block_on(self.inner.logger.poll_for_detection(log_id, timeout, interval))
    }

    pub fn tracer(&self) -> &QuotientTracer {
        &self.inner.tracer
    }
}

impl Drop for QuotientAi {
    fn drop(&mut self) {
        if !self
            .runtime
            .block_on(self.inner.logger.shutdown(Some(SHUTDOWN_TIMEOUT)))
        {
            warn!("Dropped undelivered logs after {:?}", SHUTDOWN_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: String) -> QuotientAi {
        QuotientAi::with_config(ClientConfig::with_api_key("test-key").base_url(url).token_path(None))
            .unwrap()
    }

    #[test]
    fn test_blocking_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/runs/metrics")
            .with_status(200)
            .with_body(r#"{"data": ["faithfulness", "exact_match"]}"#)
            .create();

        let quotient = client(server.url());
        let metrics = quotient.run(|q| q.metrics.list()).unwrap();

        mock.assert();
        assert_eq!(metrics, vec!["faithfulness", "exact_match"]);
    }

    #[test]
    fn test_blocking_log_is_fire_and_forget() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/logs")
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create();

        let quotient = client(server.url());
        quotient.init_logger(LoggerConfig::new("chat", "dev")).unwrap();

        assert!(quotient.log(LogEntry::new("q1", "a1")).unwrap().is_some());
        assert!(quotient.log(LogEntry::new("q2", "a2")).unwrap().is_some());
        assert!(quotient.drain_logs(Some(Duration::from_secs(5))));

        mock.assert();
    }

    #[test]
    fn test_log_before_init_fails() {
        let server = mockito::Server::new();
        let quotient = client(server.url());

        let result = quotient.log(LogEntry::new("q", "a"));

        assert!(matches!(result, Err(QuotientError::NotConfigured(_))));
    }
}

use super::instrumentation::{TruncationLimits, VectorDb};
use crate::error::{QuotientError, Result};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

pub const DEFAULT_TRACING_ENDPOINT: &str = "https://api.quotientai.co/api/v1/traces";
pub const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const HEADERS_ENV: &str = "OTEL_EXPORTER_OTLP_HEADERS";

/// Settings for a tracing session.
///
/// [`TracerConfig::new`] reads the exporter endpoint and extra headers from the environment.
#[derive(Debug, Clone)]
pub struct TracerConfig {
    pub app_name: String,
    pub environment: String,
    /// Libraries instrumented as part of `init`.
    pub instruments: Vec<VectorDb>,
    /// Detection types announced on the resource as `quotient.detections`.
    pub detections: Vec<String>,
    pub endpoint: String,
    /// Extra exporter headers; these override the defaults on conflict.
    pub headers: HashMap<String, String>,
    pub truncation: TruncationLimits,
}

impl TracerConfig {
    pub fn new(app_name: impl Into<String>, environment: impl Into<String>) -> Self {
        dotenv::dotenv().ok();

        Self {
            app_name: app_name.into(),
            environment: environment.into(),
            instruments: Vec::new(),
            detections: Vec::new(),
            endpoint: std::env::var(ENDPOINT_ENV)
                .ok()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_TRACING_ENDPOINT.to_string()),
            headers: std::env::var(HEADERS_ENV)
                .ok()
                .and_then(|raw| parse_headers(&raw))
                .unwrap_or_default(),
            truncation: TruncationLimits::default(),
        }
    }

    pub fn with_instruments(mut self, instruments: impl IntoIterator<Item = VectorDb>) -> Self {
        self.instruments = instruments.into_iter().collect();
        self
    }

    pub fn with_detections<I, S>(mut self, detections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detections = detections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_truncation(mut self, truncation: TruncationLimits) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(QuotientError::Config("app_name must be a non-empty string".into()));
        }
        if self.environment.trim().is_empty() {
            return Err(QuotientError::Config("environment must be a non-empty string".into()));
        }
        Ok(())
    }

    /// Headers sent with every export request.
    pub fn export_headers(&self, api_key: &str) -> HashMap<String, String> {
        let mut headers = HashMap::from([
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("Content-Type".to_string(), "application/x-protobuf".to_string()),
        ]);
        headers.extend(self.headers.clone());
        headers
    }

    /// Comma-joined detection names, or `None` when no detections are configured.
    pub(crate) fn detections_attribute(&self) -> Option<String> {
        (!self.detections.is_empty()).then(|| self.detections.join(","))
    }
}

/// Parse a JSON object of header names to values. Non-string values keep their JSON text.
fn parse_headers(raw: &str) -> Option<HashMap<String, String>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(
            map.into_iter()
                .map(|(name, value)| match value {
                    Value::String(s) => (name, s),
                    other => (name, other.to_string()),
                })
                .collect(),
        ),
        Ok(_) => None,
        Err(_) => {
            warn!("failed to parse {}, using default headers", HEADERS_ENV);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(r#"{"x-team": "search", "x-retries": 3}"#).unwrap();
        assert_eq!(headers["x-team"], "search");
        assert_eq!(headers["x-retries"], "3");

        assert!(parse_headers("not json").is_none());
        assert!(parse_headers("[1, 2]").is_none());
    }

    #[test]
    fn test_export_headers_allow_overrides() {
        let config = TracerConfig::new("app", "dev")
            .with_header("Content-Type", "application/json")
            .with_header("x-team", "search");

        let headers = config.export_headers("secret");

        assert_eq!(headers["Authorization"], "Bearer secret");
        assert_eq!(headers["Content-Type"], "application/json");
        assert_eq!(headers["x-team"], "search");
    }

    #[test]
    fn test_validate_requires_names() {
        assert!(TracerConfig::new("app", "dev").validate().is_ok());
        assert!(matches!(
            TracerConfig::new(" ", "dev").validate(),
            Err(QuotientError::Config(_))
        ));
        assert!(TracerConfig::new("app", "").validate().is_err());
    }

    #[test]
    fn test_detections_attribute() {
        let config = TracerConfig::new("app", "dev");
        assert_eq!(config.detections_attribute(), None);

        let config = config.with_detections(["hallucination", "document_relevancy"]);
        assert_eq!(
            config.detections_attribute().as_deref(),
            Some("hallucination,document_relevancy")
        );
    }
}

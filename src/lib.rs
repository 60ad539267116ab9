//! Client SDK for the Quotient AI evaluation platform.
//!
//! - [`QuotientAi`] wraps the REST API: prompts, datasets, recipes, tasks, jobs, results,
//!   runs, metrics, logs and detections.
//! - [`logger::QuotientLogger`] sends model interactions in the background, optionally asking
//!   the server to check them for hallucinations or irrelevant documents.
//! - [`tracer::QuotientTracer`] exports OpenTelemetry spans and traces vector database
//!   clients (Chroma, Pinecone, Qdrant).
//! - [`blocking::QuotientAi`] offers the same client without async.

pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod resources;
pub mod tracer;

pub use client::QuotientAi;
pub use config::ClientConfig;
pub use error::{QuotientError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::client::QuotientAi;
    pub use crate::config::ClientConfig;
    pub use crate::error::{QuotientError, Result};
    pub use crate::logger::{LogEntry, LoggerConfig, QuotientLogger};
    pub use crate::resources::{DetectionType, LogDocument, NewDatasetRow, NewJob};
    pub use crate::tracer::{Instrumentor, QuotientTracer, TracerConfig, TruncationLimits, VectorDb};
}

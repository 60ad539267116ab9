//! OpenTelemetry tracing for Quotient.
//!
//! [`QuotientTracer`] owns the export pipeline: an OTLP/HTTP span exporter behind a batch
//! processor, tagged with the application name, environment, user and enabled detections.
//! Vector database clients are traced by wrapping them in the decorators from
//! [`instrumentation`].
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use quotientai::tracer::{TracerConfig, VectorDb};
//!
//! let quotient = quotientai::QuotientAi::new()?;
//! quotient.tracer().init(
//!     TracerConfig::new("my-app", "dev").with_instruments([VectorDb::Qdrant]),
//! )?;
//!
//! let qdrant = quotient.tracer().qdrant(my_qdrant_client);
//! let hits = quotient.tracer().trace("answer_question", || qdrant.search(request))?;
//! quotient.tracer().force_flush();
//! ```

mod config;
pub mod instrumentation;
mod quotient_tracer;

pub use config::{TracerConfig, DEFAULT_TRACING_ENDPOINT, ENDPOINT_ENV, HEADERS_ENV};
pub use instrumentation::{
    Instrumentation, Instrumentor, InstrumentorRegistry, Operation, RetrievedDocument,
    TruncationLimits, VectorDb,
};
pub use quotient_tracer::QuotientTracer;

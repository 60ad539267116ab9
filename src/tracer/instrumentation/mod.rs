//! Span instrumentation for vector database clients.
//!
//! Each supported library is described by traits (for example [`chroma::ChromaClient`]).
//! Wrapping a client in its traced decorator yields a value implementing the same trait
//! that records one span per call. Whether spans are recorded is decided at call time by
//! the shared [`Instrumentation`] for that library, so [`Instrumentor::uninstrument`] turns
//! every existing decorator into a pass-through.
//!
//! Spans never change what the wrapped call returns. On failure the span is marked with
//! `db.operation.status = "error"` and the original error is handed back untouched.

pub mod attributes;

#[cfg(feature = "chroma")]
pub mod chroma;
#[cfg(feature = "pinecone")]
pub mod pinecone;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use attributes::{RetrievedDocument, TruncationLimits};

use attributes::{DB_COLLECTION_NAME, DB_OPERATION, DB_OPERATION_STATUS, DB_SYSTEM_NAME};
use opentelemetry::context::FutureExt;
use opentelemetry::trace::{Status, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Vector database libraries that can be instrumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorDb {
    Chroma,
    Pinecone,
    Qdrant,
}

impl VectorDb {
    pub const ALL: [VectorDb; 3] = [VectorDb::Chroma, VectorDb::Pinecone, VectorDb::Qdrant];

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorDb::Chroma => "chroma",
            VectorDb::Pinecone => "pinecone",
            VectorDb::Qdrant => "qdrant",
        }
    }

    /// Whether support for this library was compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            VectorDb::Chroma => cfg!(feature = "chroma"),
            VectorDb::Pinecone => cfg!(feature = "pinecone"),
            VectorDb::Qdrant => cfg!(feature = "qdrant"),
        }
    }

    fn tracer_name(&self) -> &'static str {
        match self {
            VectorDb::Chroma => "quotientai.chroma",
            VectorDb::Pinecone => "quotientai.pinecone",
            VectorDb::Qdrant => "quotientai.qdrant",
        }
    }
}

impl fmt::Display for VectorDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorDb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chroma" | "chromadb" => Ok(VectorDb::Chroma),
            "pinecone" => Ok(VectorDb::Pinecone),
            "qdrant" => Ok(VectorDb::Qdrant),
            other => Err(format!("Unknown vector database: {other}")),
        }
    }
}

/// Span name and call attributes for one traced operation.
#[derive(Debug, Clone)]
pub struct Operation {
    span_name: &'static str,
    attributes: Vec<KeyValue>,
}

impl Operation {
    pub fn new(system: VectorDb, operation: &'static str, span_name: &'static str) -> Self {
        Self {
            span_name,
            attributes: vec![
                KeyValue::new(DB_OPERATION, operation),
                KeyValue::new(DB_SYSTEM_NAME, system.as_str()),
            ],
        }
    }

    pub fn collection(self, name: &str) -> Self {
        self.attr(DB_COLLECTION_NAME, name.to_string())
    }

    pub fn attr(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn attr_if(self, key: &'static str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.attr(key, value),
            None => self,
        }
    }

    /// Add a count attribute, skipped when `len` is zero.
    pub fn count(self, key: &'static str, len: usize) -> Self {
        self.attr_if(key, (len > 0).then_some(len as i64))
    }

    pub fn span_name(&self) -> &'static str {
        self.span_name
    }
}

/// Capability set shared by every library instrumentor.
pub trait Instrumentor: Send + Sync {
    fn system(&self) -> VectorDb;

    /// Start recording spans. Instrumenting twice only logs a warning.
    fn instrument(&self);

    /// Stop recording spans; decorated clients pass calls straight through.
    fn uninstrument(&self);

    fn is_instrumented(&self) -> bool;
}

/// Per-library tracing state shared by all decorators of that library.
pub struct Instrumentation {
    system: VectorDb,
    instrumented: AtomicBool,
    tracer: RwLock<SdkTracer>,
    limits: RwLock<TruncationLimits>,
}

impl Instrumentation {
    pub fn new(system: VectorDb, provider: &SdkTracerProvider, limits: TruncationLimits) -> Self {
        Self {
            system,
            instrumented: AtomicBool::new(false),
            tracer: RwLock::new(provider.tracer(system.tracer_name())),
            limits: RwLock::new(limits),
        }
    }

    /// Record future spans through `provider`.
    pub fn rebind(&self, provider: &SdkTracerProvider) {
        match self.tracer.write() {
            Ok(mut tracer) => *tracer = provider.tracer(self.system.tracer_name()),
            Err(_) => warn!("Failed to rebind {} tracer: lock poisoned", self.system),
        }
    }

    pub fn limits(&self) -> TruncationLimits {
        self.limits.read().map(|l| *l).unwrap_or_default()
    }

    pub fn set_limits(&self, limits: TruncationLimits) {
        if let Ok(mut current) = self.limits.write() {
            *current = limits;
        }
    }

    fn tracer(&self) -> Option<SdkTracer> {
        if !self.is_instrumented() {
            return None;
        }
        match self.tracer.read() {
            Ok(tracer) => Some(tracer.clone()),
            Err(_) => {
                warn!("{} tracer unavailable, call is not traced", self.system);
                None
            }
        }
    }

    fn start(&self, tracer: &SdkTracer, op: Operation) -> Context {
        let span = tracer
            .span_builder(op.span_name)
            .with_attributes(op.attributes)
            .start(tracer);
        Context::current_with_span(span)
    }

    /// Run a blocking call inside a span.
    ///
    /// `on_success` supplies result attributes; it is not called on failure.
    pub fn trace<T, E, F, A>(&self, op: Operation, call: F, on_success: A) -> Result<T, E>
    where
        E: std::error::Error,
        F: FnOnce() -> Result<T, E>,
        A: FnOnce(&T, &TruncationLimits) -> Vec<KeyValue>,
    {
        let Some(tracer) = self.tracer() else {
            return call();
        };

        let cx = self.start(&tracer, op);
        let result = {
            let _guard = cx.clone().attach();
            call()
        };
        self.finish(&cx, &result, on_success);
        result
    }

    /// Await a call inside a span. The span is the active context while `fut` runs.
    pub async fn trace_async<T, E, F, A>(&self, op: Operation, fut: F, on_success: A) -> Result<T, E>
    where
        E: std::error::Error,
        F: Future<Output = Result<T, E>>,
        A: FnOnce(&T, &TruncationLimits) -> Vec<KeyValue>,
    {
        let Some(tracer) = self.tracer() else {
            return fut.await;
        };

        let cx = self.start(&tracer, op);
        let result = fut.with_context(cx.clone()).await;
        self.finish(&cx, &result, on_success);
        result
    }

    fn finish<T, E, A>(&self, cx: &Context, result: &Result<T, E>, on_success: A)
    where
        E: std::error::Error,
        A: FnOnce(&T, &TruncationLimits) -> Vec<KeyValue>,
    {
        let span = cx.span();
        match result {
            Ok(value) => {
                span.set_attribute(KeyValue::new(DB_OPERATION_STATUS, attributes::STATUS_COMPLETED));
                for attribute in on_success(value, &self.limits()) {
                    span.set_attribute(attribute);
                }
            }
            Err(e) => {
                span.set_attribute(KeyValue::new(DB_OPERATION_STATUS, attributes::STATUS_ERROR));
                span.record_error(e);
                span.set_status(Status::error(e.to_string()));
            }
        }
        span.end();
    }
}

impl Instrumentor for Instrumentation {
    fn system(&self) -> VectorDb {
        self.system
    }

    fn instrument(&self) {
        if !self.system.is_available() {
            warn!("{} support is not compiled in, skipping instrumentation", self.system);
            return;
        }
        if self.instrumented.swap(true, Ordering::AcqRel) {
            warn!("{} is already instrumented", self.system);
            return;
        }
        info!("Successfully instrumented {}", self.system);
    }

    fn uninstrument(&self) {
        if !self.instrumented.swap(false, Ordering::AcqRel) {
            warn!("{} is not instrumented", self.system);
            return;
        }
        info!("Successfully uninstrumented {}", self.system);
    }

    fn is_instrumented(&self) -> bool {
        self.instrumented.load(Ordering::Acquire)
    }
}

/// One [`Instrumentation`] per supported library.
pub struct InstrumentorRegistry {
    chroma: Arc<Instrumentation>,
    pinecone: Arc<Instrumentation>,
    qdrant: Arc<Instrumentation>,
}

impl InstrumentorRegistry {
    pub fn new(provider: &SdkTracerProvider, limits: TruncationLimits) -> Self {
        let entry = |db| Arc::new(Instrumentation::new(db, provider, limits));
        Self {
            chroma: entry(VectorDb::Chroma),
            pinecone: entry(VectorDb::Pinecone),
            qdrant: entry(VectorDb::Qdrant),
        }
    }

    pub fn get(&self, db: VectorDb) -> Arc<Instrumentation> {
        match db {
            VectorDb::Chroma => self.chroma.clone(),
            VectorDb::Pinecone => self.pinecone.clone(),
            VectorDb::Qdrant => self.qdrant.clone(),
        }
    }

    fn entries(&self) -> [&Arc<Instrumentation>; 3] {
        [&self.chroma, &self.pinecone, &self.qdrant]
    }

    pub fn rebind(&self, provider: &SdkTracerProvider) {
        for entry in self.entries() {
            entry.rebind(provider);
        }
    }

    pub fn set_limits(&self, limits: TruncationLimits) {
        for entry in self.entries() {
            entry.set_limits(limits);
        }
    }

    /// Instrument libraries by name. Unknown names are logged and skipped.
    pub fn instrument_by_name<S: AsRef<str>>(&self, names: &[S]) {
        for name in names {
            match name.as_ref().parse::<VectorDb>() {
                Ok(db) => self.get(db).instrument(),
                Err(e) => warn!("{}", e),
            }
        }
    }

    pub fn instrumented(&self) -> Vec<VectorDb> {
        self.entries()
            .into_iter()
            .filter(|i| i.is_instrumented())
            .map(|i| i.system)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

    pub fn provider() -> (SdkTracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider, exporter)
    }

    pub fn spans(exporter: &InMemorySpanExporter) -> Vec<SpanData> {
        exporter.get_finished_spans().unwrap_or_default()
    }

    pub fn attr(span: &SpanData, key: &str) -> Option<opentelemetry::Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    #[derive(Debug)]
    pub struct FakeError(pub &'static str);

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for FakeError {}
}

#[cfg(test)]
mod tests {
    use super::testing::{attr, provider, spans, FakeError};
    use super::*;
    use opentelemetry::trace::{Status, Tracer as _, TracerProvider as _};

    fn instrumented(provider: &SdkTracerProvider) -> Instrumentation {
        let instrumentation =
            Instrumentation::new(VectorDb::Chroma, provider, TruncationLimits::default());
        instrumentation.instrument();
        instrumentation
    }

    #[test]
    fn test_vector_db_names_are_case_insensitive() {
        assert_eq!("Chroma".parse::<VectorDb>(), Ok(VectorDb::Chroma));
        assert_eq!("QDRANT".parse::<VectorDb>(), Ok(VectorDb::Qdrant));
        assert!("weaviate".parse::<VectorDb>().is_err());
    }

    #[test]
    fn test_success_span_attributes() {
        let (provider, exporter) = provider();
        let instrumentation = instrumented(&provider);

        let op = Operation::new(VectorDb::Chroma, "list_collections", "chroma.list_collections");
        let result: Result<Vec<&str>, FakeError> = instrumentation.trace(
            op,
            || Ok(vec!["a", "b"]),
            |names, _| vec![KeyValue::new("db.collections.count", names.len() as i64)],
        );

        assert_eq!(result.unwrap(), vec!["a", "b"]);
        let spans = spans(&exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "chroma.list_collections");
        assert_eq!(attr(&spans[0], "db.system.name"), Some("chroma".into()));
        assert_eq!(attr(&spans[0], "db.operation"), Some("list_collections".into()));
        assert_eq!(attr(&spans[0], "db.operation.status"), Some("completed".into()));
        assert_eq!(attr(&spans[0], "db.collections.count"), Some(2i64.into()));
    }

    #[test]
    fn test_error_is_recorded_and_returned_unchanged() {
        let (provider, exporter) = provider();
        let instrumentation = instrumented(&provider);

        let op = Operation::new(VectorDb::Chroma, "delete_collection", "chroma.delete_collection");
        let result: Result<(), FakeError> =
            instrumentation.trace(op, || Err(FakeError("no such collection")), |_, _| vec![]);

        assert_eq!(result.unwrap_err().0, "no such collection");
        let span = &spans(&exporter)[0];
        assert_eq!(attr(span, "db.operation.status"), Some("error".into()));
        assert_eq!(span.status, Status::error("no such collection"));
        assert!(span.events.events.iter().any(|e| e.name == "exception"));
    }

    #[test]
    fn test_uninstrumented_calls_pass_through() {
        let (provider, exporter) = provider();
        let instrumentation = instrumented(&provider);
        instrumentation.uninstrument();

        let op = Operation::new(VectorDb::Chroma, "add", "chroma.collection.add");
        let result: Result<u8, FakeError> = instrumentation.trace(op, || Ok(1), |_, _| vec![]);

        assert_eq!(result.unwrap(), 1);
        assert!(spans(&exporter).is_empty());
    }

    #[test]
    fn test_instrument_is_idempotent() {
        let (provider, _) = provider();
        let instrumentation = instrumented(&provider);
        instrumentation.instrument();
        assert!(instrumentation.is_instrumented());

        instrumentation.uninstrument();
        instrumentation.uninstrument();
        assert!(!instrumentation.is_instrumented());
    }

    #[tokio::test]
    async fn test_async_span_is_parent_of_inner_spans() {
        let (provider, exporter) = provider();
        let instrumentation = instrumented(&provider);
        let tracer = provider.tracer("inner");

        let op = Operation::new(VectorDb::Chroma, "query", "chroma.collection.query");
        let result: Result<(), FakeError> = instrumentation
            .trace_async(
                op,
                async {
                    tracer.in_span("inner.call", |_| {});
                    Ok(())
                },
                |_, _| vec![],
            )
            .await;

        assert!(result.is_ok());
        let spans = spans(&exporter);
        let inner = spans.iter().find(|s| s.name == "inner.call").unwrap();
        let outer = spans.iter().find(|s| s.name == "chroma.collection.query").unwrap();
        assert_eq!(inner.parent_span_id, outer.span_context.span_id());
    }

    #[test]
    fn test_registry_instruments_by_name() {
        let (provider, _) = provider();
        let registry = InstrumentorRegistry::new(&provider, TruncationLimits::default());

        registry.instrument_by_name(&["Chroma", "milvus", "qdrant"]);

        assert_eq!(registry.instrumented(), vec![VectorDb::Chroma, VectorDb::Qdrant]);
    }

    #[test]
    fn test_count_skips_zero() {
        let op = Operation::new(VectorDb::Qdrant, "get", "qdrant.get")
            .count("db.ids_count", 0)
            .count("db.vector_count", 3);
        assert_eq!(op.attributes.len(), 3);
    }
}

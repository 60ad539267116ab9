//! Tracing session: exporter setup, instrumentor registry and user spans.

use super::config::TracerConfig;
#[cfg(feature = "chroma")]
use super::instrumentation::chroma::{
    AsyncChromaClient, ChromaClient, TracedAsyncChromaClient, TracedChromaClient,
};
#[cfg(feature = "pinecone")]
use super::instrumentation::pinecone::{
    AsyncPineconeClient, PineconeClient, TracedAsyncPineconeClient, TracedPineconeClient,
};
#[cfg(feature = "qdrant")]
use super::instrumentation::qdrant::{
    AsyncQdrantClient, QdrantClient, TracedAsyncQdrantClient, TracedQdrantClient,
};
use super::instrumentation::{
    Instrumentation, Instrumentor, InstrumentorRegistry, TruncationLimits, VectorDb,
};
use crate::error::{QuotientError, Result};
use opentelemetry::context::FutureExt;
use opentelemetry::trace::{Span as _, TraceContextExt, TraceId, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider, SpanExporter};
use opentelemetry_sdk::Resource;
use std::borrow::Cow;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

const TRACER_NAME: &str = "quotientai";
const END_OF_TRACE_SPAN: &str = "quotient.end_of_trace";

/// Context marker for spans opened by [`QuotientTracer::trace`] and [`QuotientTracer::trace_async`].
#[derive(Debug, Clone, Copy)]
struct UserSpan;

struct Session {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    config: TracerConfig,
}

/// Tracing entry point held by the client.
///
/// Before [`QuotientTracer::init`] nothing is exported: decorated clients and
/// [`QuotientTracer::trace`] run their calls without recording spans.
pub struct QuotientTracer {
    api_key: Option<String>,
    user: RwLock<Option<String>>,
    session: RwLock<Option<Session>>,
    registry: InstrumentorRegistry,
}

impl QuotientTracer {
    pub fn new(api_key: Option<String>) -> Self {
        let idle = SdkTracerProvider::builder().build();
        Self {
            api_key,
            user: RwLock::new(None),
            session: RwLock::new(None),
            registry: InstrumentorRegistry::new(&idle, TruncationLimits::default()),
        }
    }

    /// User id reported as `quotient.user` by sessions started after this call.
    pub fn set_user(&self, user: impl Into<String>) {
        if let Ok(mut slot) = self.user.write() {
            *slot = Some(user.into());
        }
    }

    /// Start exporting spans to the configured OTLP endpoint.
    ///
    /// Without an API key this logs a warning and leaves tracing disabled. Calling `init`
    /// again replaces the previous session.
    pub fn init(&self, config: TracerConfig) -> Result<()> {
        config.validate()?;
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("No API key available - skipping tracing setup");
            return Ok(());
        };

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(config.endpoint.clone())
            .with_headers(config.export_headers(api_key))
            .build()
            .map_err(|e| QuotientError::Tracing(format!("failed to build span exporter: {e}")))?;

        self.install(config, exporter);
        Ok(())
    }

    /// Start a session that hands finished spans to `exporter` instead of the OTLP endpoint.
    pub fn init_with_exporter<E>(&self, config: TracerConfig, exporter: E) -> Result<()>
    where
        E: SpanExporter + 'static,
    {
        config.validate()?;
        self.install(config, exporter);
        Ok(())
    }

    fn install<E: SpanExporter + 'static>(&self, config: TracerConfig, exporter: E) {
        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(self.resource(&config))
            .build();

        self.registry.rebind(&provider);
        self.registry.set_limits(config.truncation);
        for db in &config.instruments {
            self.registry.get(*db).instrument();
        }

        let tracer = provider.tracer(TRACER_NAME);
        info!(
            "Tracing initialized for {} ({}) exporting to {}",
            config.app_name, config.environment, config.endpoint
        );

        let previous = match self.session.write() {
            Ok(mut slot) => slot.replace(Session {
                provider,
                tracer,
                config,
            }),
            Err(_) => {
                error!("Tracer state lock poisoned, keeping previous session");
                return;
            }
        };
        if let Some(previous) = previous {
            debug!("Replacing previous tracing session");
            if let Err(e) = previous.provider.shutdown() {
                warn!("Failed to shut down previous tracer provider: {}", e);
            }
        }
    }

    fn resource(&self, config: &TracerConfig) -> Resource {
        let user = self
            .user
            .read()
            .ok()
            .and_then(|u| u.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let mut attributes = vec![
            KeyValue::new("app.name", config.app_name.clone()),
            KeyValue::new("app.environment", config.environment.clone()),
            KeyValue::new("quotient.user", user),
        ];
        if let Some(detections) = config.detections_attribute() {
            attributes.push(KeyValue::new("quotient.detections", detections));
        }
        Resource::builder().with_attributes(attributes).build()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// The active session's configuration.
    pub fn config(&self) -> Option<TracerConfig> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.config.clone()))
    }

    /// Instrument libraries by name (`"chroma"`, `"pinecone"`, `"qdrant"`, case-insensitive).
    pub fn instrument_vector_dbs<S: AsRef<str>>(&self, names: &[S]) {
        self.registry.instrument_by_name(names);
    }

    /// Shared instrumentation state for one library, e.g. to uninstrument it.
    pub fn instrumentor(&self, db: VectorDb) -> Arc<Instrumentation> {
        self.registry.get(db)
    }

    pub fn instrumented(&self) -> Vec<VectorDb> {
        self.registry.instrumented()
    }

    /// Change truncation limits for every instrumented library.
    pub fn set_truncation(&self, limits: TruncationLimits) {
        self.registry.set_limits(limits);
    }

    /// Wrap a Chroma client so its calls are traced while Chroma is instrumented.
    #[cfg(feature = "chroma")]
    pub fn chroma<C: ChromaClient>(&self, client: C) -> TracedChromaClient<C> {
        TracedChromaClient::new(client, self.registry.get(VectorDb::Chroma))
    }

    #[cfg(feature = "chroma")]
    pub fn async_chroma<C: AsyncChromaClient>(&self, client: C) -> TracedAsyncChromaClient<C> {
        TracedAsyncChromaClient::new(client, self.registry.get(VectorDb::Chroma))
    }

    #[cfg(feature = "pinecone")]
    pub fn pinecone<C: PineconeClient>(&self, client: C) -> TracedPineconeClient<C> {
        TracedPineconeClient::new(client, self.registry.get(VectorDb::Pinecone))
    }

    #[cfg(feature = "pinecone")]
    pub fn async_pinecone<C: AsyncPineconeClient>(&self, client: C) -> TracedAsyncPineconeClient<C> {
        TracedAsyncPineconeClient::new(client, self.registry.get(VectorDb::Pinecone))
    }

    #[cfg(feature = "qdrant")]
    pub fn qdrant<C: QdrantClient>(&self, client: C) -> TracedQdrantClient<C> {
        TracedQdrantClient::new(client, self.registry.get(VectorDb::Qdrant))
    }

    #[cfg(feature = "qdrant")]
    pub fn async_qdrant<C: AsyncQdrantClient>(&self, client: C) -> TracedAsyncQdrantClient<C> {
        TracedAsyncQdrantClient::new(client, self.registry.get(VectorDb::Qdrant))
    }

    fn tracer(&self) -> Option<SdkTracer> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.tracer.clone()))
    }

    /// Run `f` inside a span named `name`.
    ///
    /// The outermost user span is a trace root, even when the host application
    /// has a span of its own active. Once `f` returns, a `quotient.end_of_trace`
    /// marker span is recorded under it.
    pub fn trace<T, F>(&self, name: impl Into<Cow<'static, str>>, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let Some(tracer) = self.tracer() else {
            return f();
        };

        let (cx, is_root) = start_span(&tracer, name);
        let output = {
            let _guard = cx.clone().attach();
            f()
        };
        finish_span(&tracer, &cx, is_root);
        output
    }

    /// Await `fut` inside a span named `name`. Root spans get an end-of-trace marker.
    pub async fn trace_async<F>(&self, name: impl Into<Cow<'static, str>>, fut: F) -> F::Output
    where
        F: Future,
    {
        let Some(tracer) = self.tracer() else {
            return fut.await;
        };

        let (cx, is_root) = start_span(&tracer, name);
        let output = fut.with_context(cx.clone()).await;
        finish_span(&tracer, &cx, is_root);
        output
    }

    /// Export every buffered span now. Blocks until the exporter returns.
    pub fn force_flush(&self) {
        let Ok(session) = self.session.read() else {
            return;
        };
        let Some(session) = session.as_ref() else {
            debug!("force_flush called before init, nothing to flush");
            return;
        };
        match session.provider.force_flush() {
            Ok(()) => info!("Forced flush of pending spans"),
            Err(e) => error!("Failed to force flush spans: {}", e),
        }
    }

    /// Flush and release the exporter. Later spans are not recorded until `init` is called again.
    pub fn shutdown(&self) -> Result<()> {
        let session = match self.session.write() {
            Ok(mut slot) => slot.take(),
            Err(_) => return Err(QuotientError::Tracing("tracer state lock poisoned".into())),
        };
        let Some(session) = session else {
            return Ok(());
        };
        session
            .provider
            .shutdown()
            .map_err(|e| QuotientError::Tracing(format!("failed to cleanup tracing: {e}")))?;
        self.registry.rebind(&SdkTracerProvider::builder().build());
        info!("Tracing shut down");
        Ok(())
    }
}

impl Drop for QuotientTracer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("{}", e);
        }
    }
}

fn start_span(tracer: &SdkTracer, name: impl Into<Cow<'static, str>>) -> (Context, bool) {
    let parent = Context::current();
    let is_root = parent.get::<UserSpan>().is_none();
    let span = tracer.start_with_context(name, &parent);
    (parent.with_span(span).with_value(UserSpan), is_root)
}

fn finish_span(tracer: &SdkTracer, cx: &Context, is_root: bool) {
    if is_root {
        end_of_trace(tracer, cx, cx.span().span_context().trace_id());
    }
    cx.span().end();
}

fn end_of_trace(tracer: &SdkTracer, parent: &Context, trace_id: TraceId) {
    let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut marker = tracer
        .span_builder(END_OF_TRACE_SPAN)
        .with_attributes(vec![
            KeyValue::new("quotient.trace.complete", true),
            KeyValue::new("quotient.trace.marker", true),
            KeyValue::new("quotient.trace.id", trace_id.to_string()),
            KeyValue::new("quotient.marker.timestamp", timestamp),
        ])
        .start_with_context(tracer, parent);
    marker.end();
}

//! Pinecone client and index tracing.
//!
//! [`PineconeClient`]/[`PineconeIndex`] model the blocking client and
//! [`AsyncPineconeClient`]/[`AsyncPineconeIndex`] the asyncio one. Index handles obtained
//! from a traced client are traced as well; the control-plane `index` lookup is not.

use super::attributes::*;
use super::{Instrumentation, Operation, RetrievedDocument, TruncationLimits, VectorDb};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndexRequest {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    /// Deployment spec, e.g. `{"serverless": {"cloud": "aws", "region": "us-east-1"}}`.
    #[serde(default)]
    pub spec: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub vectors: Vec<Vector>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub upserted_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query by vector, or by the id of a stored vector.
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub id: Option<String>,
    pub top_k: usize,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub include_values: bool,
    pub include_metadata: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            vector: None,
            id: None,
            top_k: 10,
            namespace: None,
            filter: None,
            include_values: false,
            include_metadata: true,
        }
    }
}

impl QueryRequest {
    pub fn by_vector(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector: Some(vector),
            top_k,
            ..Default::default()
        }
    }

    fn query_type(&self) -> &'static str {
        if self.vector.is_some() {
            "vector"
        } else if self.id.is_some() {
            "id"
        } else {
            "unknown"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredVector {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub matches: Vec<ScoredVector>,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub delete_all: bool,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub filter: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub vectors: BTreeMap<String, Vector>,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: String,
    #[serde(default)]
    pub values: Option<Vec<f32>>,
    #[serde(default)]
    pub set_metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub namespace: Option<String>,
}

pub trait PineconeIndex {
    type Error: std::error::Error;

    fn name(&self) -> &str;
    fn upsert(&self, request: UpsertRequest) -> Result<UpsertResponse, Self::Error>;
    fn query(&self, request: QueryRequest) -> Result<QueryResponse, Self::Error>;
    fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error>;
    fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Self::Error>;
    fn update(&self, request: UpdateRequest) -> Result<(), Self::Error>;
}

pub trait PineconeClient {
    type Error: std::error::Error;
    type Index: PineconeIndex<Error = Self::Error>;

    fn create_index(&self, request: CreateIndexRequest) -> Result<(), Self::Error>;
    fn list_indexes(&self) -> Result<Vec<IndexDescription>, Self::Error>;
    fn delete_index(&self, name: &str) -> Result<(), Self::Error>;

    /// Handle to a data-plane index. Not traced itself.
    fn index(&self, name: &str) -> Result<Self::Index, Self::Error>;
}

#[async_trait]
pub trait AsyncPineconeIndex: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;
    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertResponse, Self::Error>;
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, Self::Error>;
    async fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error>;
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Self::Error>;
    async fn update(&self, request: UpdateRequest) -> Result<(), Self::Error>;
}

#[async_trait]
pub trait AsyncPineconeClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Index: AsyncPineconeIndex<Error = Self::Error>;

    async fn create_index(&self, request: CreateIndexRequest) -> Result<(), Self::Error>;
    async fn list_indexes(&self) -> Result<Vec<IndexDescription>, Self::Error>;
    async fn delete_index(&self, name: &str) -> Result<(), Self::Error>;

    /// Handle to a data-plane index. Not traced itself.
    fn index(&self, name: &str) -> Result<Self::Index, Self::Error>;
}

mod ops {
    use super::*;

    fn op(operation: &'static str, span_name: &'static str) -> Operation {
        Operation::new(VectorDb::Pinecone, operation, span_name)
    }

    fn with_namespace(op: Operation, namespace: &Option<String>) -> Operation {
        op.attr_if(
            DB_QUERY_NAMESPACE,
            namespace.as_ref().filter(|n| !n.is_empty()).cloned(),
        )
    }

    fn with_filter(op: Operation, filter: &Option<Value>) -> Operation {
        op.attr_if(DB_FILTER, filter.as_ref().filter(|f| !f.is_null()).map(safe_json))
    }

    pub fn create_index(request: &CreateIndexRequest) -> Operation {
        op("create_index", "pinecone.create_index")
            .attr(DB_INDEX_NAME, request.name.clone())
            .attr(DB_INDEX_DIMENSION, request.dimension as i64)
            .attr(DB_CREATE_INDEX_METRIC, request.metric.clone())
            .attr_if(DB_CREATE_INDEX_SPEC, (!request.spec.is_null()).then(|| safe_json(&request.spec)))
    }

    pub fn list_indexes() -> Operation {
        op("list_indexes", "pinecone.list_indexes")
    }

    pub fn delete_index(name: &str) -> Operation {
        op("delete_index", "pinecone.delete_index").attr(DB_INDEX_NAME, name.to_string())
    }

    pub fn upsert(request: &UpsertRequest) -> Operation {
        with_namespace(op("upsert", "pinecone.index.upsert"), &request.namespace)
            .attr(DB_VECTOR_COUNT, request.vectors.len() as i64)
            .attr(DB_IDS_COUNT, request.vectors.len() as i64)
    }

    pub fn query(request: &QueryRequest) -> Operation {
        let op = op("query", "pinecone.index.query").attr(DB_N_RESULTS, request.top_k as i64);
        with_filter(with_namespace(op, &request.namespace), &request.filter)
            .attr_if(DB_VECTOR_COUNT, request.vector.as_ref().map(|_| 1i64))
            .attr(DB_QUERY_TYPE, request.query_type())
    }

    pub fn delete(request: &DeleteRequest) -> Operation {
        let op = op("delete", "pinecone.index.delete").attr(DB_DELETE_ALL, request.delete_all);
        with_filter(with_namespace(op, &request.namespace), &request.filter)
            .count(DB_IDS_COUNT, request.ids.as_ref().map_or(0, Vec::len))
    }

    pub fn fetch(request: &FetchRequest) -> Operation {
        let op = op("fetch", "pinecone.index.fetch").attr(DB_IDS_COUNT, request.ids.len() as i64);
        with_namespace(op, &request.namespace)
    }

    pub fn update(request: &UpdateRequest) -> Operation {
        let op = op("update", "pinecone.index.update").attr(DB_UPDATE_ID, request.id.clone());
        with_namespace(op, &request.namespace)
            .attr_if(DB_UPDATE_METADATA, request.set_metadata.as_ref().map(safe_json))
            .attr_if(DB_VECTOR_COUNT, request.values.as_ref().map(|_| 1i64))
    }

    pub fn indexes_count(indexes: &[IndexDescription], _: &TruncationLimits) -> Vec<KeyValue> {
        vec![KeyValue::new(DB_INDEXES_COUNT, indexes.len() as i64)]
    }

    pub fn upserted_count(response: &UpsertResponse, _: &TruncationLimits) -> Vec<KeyValue> {
        vec![KeyValue::new(DB_UPSERTED_COUNT, response.upserted_count as i64)]
    }

    pub fn query_result(
        response: &QueryResponse,
        include_values: bool,
        limits: &TruncationLimits,
    ) -> Vec<KeyValue> {
        if response.matches.is_empty() {
            return Vec::new();
        }

        let docs: Vec<RetrievedDocument> = response
            .matches
            .iter()
            .map(|m| {
                RetrievedDocument::new(m.id.as_str())
                    .score(f64::from(m.score))
                    .metadata(m.metadata.as_ref())
                    .content((include_values && !m.values.is_empty()).then(|| limits.vector(&m.values)))
            })
            .collect();

        vec![
            KeyValue::new(DB_IDS_COUNT, response.matches.len() as i64),
            KeyValue::new(DB_QUERY_RETRIEVED_DOCUMENTS, retrieved_documents(&docs)),
        ]
    }

    pub fn fetch_result(response: &FetchResponse, limits: &TruncationLimits) -> Vec<KeyValue> {
        if response.vectors.is_empty() {
            return Vec::new();
        }

        let docs: Vec<RetrievedDocument> = response
            .vectors
            .iter()
            .map(|(id, vector)| {
                RetrievedDocument::new(id.as_str())
                    .metadata(vector.metadata.as_ref())
                    .content((!vector.values.is_empty()).then(|| limits.vector(&vector.values)))
            })
            .collect();

        vec![
            KeyValue::new(DB_VECTOR_COUNT, response.vectors.len() as i64),
            KeyValue::new(DB_QUERY_RETRIEVED_DOCUMENTS, retrieved_documents(&docs)),
        ]
    }
}

pub struct TracedPineconeClient<C> {
    inner: C,
    instrumentation: Arc<Instrumentation>,
}

impl<C: PineconeClient> TracedPineconeClient<C> {
    pub fn new(inner: C, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: PineconeClient> PineconeClient for TracedPineconeClient<C> {
    type Error = C::Error;
    type Index = TracedIndex<C::Index>;

    fn create_index(&self, request: CreateIndexRequest) -> Result<(), Self::Error> {
        let op = ops::create_index(&request);
        self.instrumentation
            .trace(op, || self.inner.create_index(request), |_, _| Vec::new())
    }

    fn list_indexes(&self) -> Result<Vec<IndexDescription>, Self::Error> {
        self.instrumentation.trace(
            ops::list_indexes(),
            || self.inner.list_indexes(),
            |indexes, limits| ops::indexes_count(indexes, limits),
        )
    }

    fn delete_index(&self, name: &str) -> Result<(), Self::Error> {
        self.instrumentation
            .trace(ops::delete_index(name), || self.inner.delete_index(name), |_, _| Vec::new())
    }

    fn index(&self, name: &str) -> Result<Self::Index, Self::Error> {
        self.inner
            .index(name)
            .map(|index| TracedIndex::new(index, self.instrumentation.clone()))
    }
}

pub struct TracedIndex<I> {
    inner: I,
    instrumentation: Arc<Instrumentation>,
}

impl<I> TracedIndex<I> {
    pub fn new(inner: I, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

impl<I: PineconeIndex> PineconeIndex for TracedIndex<I> {
    type Error = I::Error;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn upsert(&self, request: UpsertRequest) -> Result<UpsertResponse, Self::Error> {
        let op = ops::upsert(&request);
        self.instrumentation
            .trace(op, || self.inner.upsert(request), ops::upserted_count)
    }

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, Self::Error> {
        let op = ops::query(&request);
        let include_values = request.include_values;
        self.instrumentation.trace(op, || self.inner.query(request), |response, limits| {
            ops::query_result(response, include_values, limits)
        })
    }

    fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error> {
        let op = ops::delete(&request);
        self.instrumentation
            .trace(op, || self.inner.delete(request), |_, _| Vec::new())
    }

    fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Self::Error> {
        let op = ops::fetch(&request);
        self.instrumentation
            .trace(op, || self.inner.fetch(request), ops::fetch_result)
    }

    fn update(&self, request: UpdateRequest) -> Result<(), Self::Error> {
        let op = ops::update(&request);
        self.instrumentation
            .trace(op, || self.inner.update(request), |_, _| Vec::new())
    }
}

pub struct TracedAsyncPineconeClient<C> {
    inner: C,
    instrumentation: Arc<Instrumentation>,
}

impl<C: AsyncPineconeClient> TracedAsyncPineconeClient<C> {
    pub fn new(inner: C, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: AsyncPineconeClient> AsyncPineconeClient for TracedAsyncPineconeClient<C> {
    type Error = C::Error;
    type Index = TracedAsyncIndex<C::Index>;

    async fn create_index(&self, request: CreateIndexRequest) -> Result<(), Self::Error> {
        let op = ops::create_index(&request);
        self.instrumentation
            .trace_async(op, self.inner.create_index(request), |_, _| Vec::new())
            .await
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescription>, Self::Error> {
        self.instrumentation
            .trace_async(ops::list_indexes(), self.inner.list_indexes(), |indexes, limits| {
                ops::indexes_count(indexes, limits)
            })
            .await
    }

    async fn delete_index(&self, name: &str) -> Result<(), Self::Error> {
        self.instrumentation
            .trace_async(ops::delete_index(name), self.inner.delete_index(name), |_, _| Vec::new())
            .await
    }

    fn index(&self, name: &str) -> Result<Self::Index, Self::Error> {
        self.inner
            .index(name)
            .map(|index| TracedAsyncIndex::new(index, self.instrumentation.clone()))
    }
}

pub struct TracedAsyncIndex<I> {
    inner: I,
    instrumentation: Arc<Instrumentation>,
}

impl<I> TracedAsyncIndex<I> {
    pub fn new(inner: I, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

#[async_trait]
impl<I: AsyncPineconeIndex> AsyncPineconeIndex for TracedAsyncIndex<I> {
    type Error = I::Error;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertResponse, Self::Error> {
        let op = ops::upsert(&request);
        self.instrumentation
            .trace_async(op, self.inner.upsert(request), ops::upserted_count)
            .await
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, Self::Error> {
        let op = ops::query(&request);
        let include_values = request.include_values;

        self.instrumentation
            .trace_async(op, self.inner.query(request), |response, limits| {
                ops::query_result(response, include_values, limits)
            })
            .await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error> {
        let op = ops::delete(&request);
        self.instrumentation
            .trace_async(op, self.inner.delete(request), |_, _| Vec::new())
            .await
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Self::Error> {
        let op = ops::fetch(&request);
        self.instrumentation
            .trace_async(op, self.inner.fetch(request), ops::fetch_result)
            .await
    }

    async fn update(&self, request: UpdateRequest) -> Result<(), Self::Error> {
        let op = ops::update(&request);
        self.instrumentation
            .trace_async(op, self.inner.update(request), |_, _| Vec::new())
            .await
    }
}

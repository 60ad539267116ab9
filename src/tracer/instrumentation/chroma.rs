//! Chroma client and collection tracing.
//!
//! The blocking client is modelled by [`ChromaClient`]/[`ChromaCollection`] and the async
//! client by [`AsyncChromaClient`]/[`AsyncChromaCollection`]; both share the span
//! conventions in `ops`. Collections returned by a traced client are wrapped and traced too.

use super::attributes::*;
use super::{Instrumentation, Operation, RetrievedDocument, TruncationLimits, VectorDb};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Records written by `add` and `update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecords {
    pub ids: Vec<String>,
    #[serde(default)]
    pub embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub documents: Option<Vec<String>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Map<String, Value>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query_embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub query_texts: Option<Vec<String>>,
    pub n_results: usize,
    #[serde(default, rename = "where")]
    pub where_filter: Option<Value>,
    #[serde(default)]
    pub where_document: Option<Value>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            query_embeddings: None,
            query_texts: None,
            n_results: 10,
            where_filter: None,
            where_document: None,
        }
    }
}

impl QueryRequest {
    pub fn texts(texts: Vec<String>, n_results: usize) -> Self {
        Self {
            query_texts: Some(texts),
            n_results,
            ..Default::default()
        }
    }
}

/// Query results, one inner list per query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Map<String, Value>>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    #[serde(default, rename = "where")]
    pub where_filter: Option<Value>,
    #[serde(default)]
    pub where_document: Option<Value>,
}

pub trait ChromaCollection {
    type Error: std::error::Error;

    fn name(&self) -> &str;
    fn id(&self) -> &str;
    fn add(&self, records: CollectionRecords) -> Result<(), Self::Error>;
    fn query(&self, request: QueryRequest) -> Result<QueryResult, Self::Error>;
    fn update(&self, records: CollectionRecords) -> Result<(), Self::Error>;
    fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error>;
}

pub trait ChromaClient {
    type Error: std::error::Error;
    type Collection: ChromaCollection<Error = Self::Error>;

    fn create_collection(
        &self,
        name: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self::Collection, Self::Error>;
    fn get_collection(&self, name: &str) -> Result<Self::Collection, Self::Error>;
    fn list_collections(&self) -> Result<Vec<Self::Collection>, Self::Error>;
    fn delete_collection(&self, name: &str) -> Result<(), Self::Error>;
}

#[async_trait]
pub trait AsyncChromaCollection: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;
    fn id(&self) -> &str;
    async fn add(&self, records: CollectionRecords) -> Result<(), Self::Error>;
    async fn query(&self, request: QueryRequest) -> Result<QueryResult, Self::Error>;
    async fn update(&self, records: CollectionRecords) -> Result<(), Self::Error>;
    async fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error>;
}

#[async_trait]
pub trait AsyncChromaClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Collection: AsyncChromaCollection<Error = Self::Error>;

    async fn create_collection(
        &self,
        name: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self::Collection, Self::Error>;
    async fn get_collection(&self, name: &str) -> Result<Self::Collection, Self::Error>;
    async fn list_collections(&self) -> Result<Vec<Self::Collection>, Self::Error>;
    async fn delete_collection(&self, name: &str) -> Result<(), Self::Error>;
}

mod ops {
    use super::*;

    fn op(operation: &'static str, span_name: &'static str) -> Operation {
        Operation::new(VectorDb::Chroma, operation, span_name)
    }

    fn with_records(op: Operation, records: &CollectionRecords) -> Operation {
        op.count(DB_IDS_COUNT, records.ids.len())
            .count(DB_VECTOR_COUNT, records.embeddings.as_ref().map_or(0, Vec::len))
            .count(DB_DOCUMENTS_COUNT, records.documents.as_ref().map_or(0, Vec::len))
            .count(DB_METADATAS_COUNT, records.metadatas.as_ref().map_or(0, Vec::len))
    }

    fn with_filters(op: Operation, where_filter: &Option<Value>, where_document: &Option<Value>) -> Operation {
        op.attr_if(DB_FILTER, where_filter.as_ref().filter(|f| !is_empty(f)).map(safe_json))
            .attr_if(
                DB_WHERE_DOCUMENT,
                where_document.as_ref().filter(|f| !is_empty(f)).map(safe_json),
            )
    }

    fn is_empty(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Object(m) => m.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        }
    }

    pub fn create_collection(name: &str) -> Operation {
        op("create_collection", "chroma.create_collection").collection(name)
    }

    pub fn get_collection(name: &str) -> Operation {
        op("get_collection", "chroma.get_collection").collection(name)
    }

    pub fn list_collections() -> Operation {
        op("list_collections", "chroma.list_collections")
    }

    pub fn delete_collection(name: &str) -> Operation {
        op("delete_collection", "chroma.delete_collection").collection(name)
    }

    pub fn add(collection: &str, records: &CollectionRecords) -> Operation {
        with_records(op("add", "chroma.collection.add").collection(collection), records)
    }

    pub fn update(collection: &str, records: &CollectionRecords) -> Operation {
        with_records(op("update", "chroma.collection.update").collection(collection), records)
    }

    pub fn query(collection: &str, request: &QueryRequest) -> Operation {
        let op = op("query", "chroma.collection.query")
            .collection(collection)
            .attr(DB_N_RESULTS, request.n_results as i64)
            .count(DB_DOCUMENTS_COUNT, request.query_texts.as_ref().map_or(0, Vec::len))
            .count(DB_VECTOR_COUNT, request.query_embeddings.as_ref().map_or(0, Vec::len));
        with_filters(op, &request.where_filter, &request.where_document)
    }

    pub fn delete(collection: &str, request: &DeleteRequest) -> Operation {
        let op = op("delete", "chroma.collection.delete")
            .collection(collection)
            .count(DB_IDS_COUNT, request.ids.as_ref().map_or(0, Vec::len));
        with_filters(op, &request.where_filter, &request.where_document)
    }

    pub fn collection_id(id: &str) -> Vec<KeyValue> {
        vec![KeyValue::new(DB_COLLECTION_ID, id.to_string())]
    }

    pub fn collections_count(count: usize) -> Vec<KeyValue> {
        vec![KeyValue::new(DB_COLLECTIONS_COUNT, count as i64)]
    }

    fn first_query<T>(lists: &Option<Vec<Vec<T>>>) -> Option<&Vec<T>> {
        lists.as_ref()?.first()
    }

    /// Attributes for the first query's hits.
    pub fn query_result(result: &QueryResult, limits: &TruncationLimits) -> Vec<KeyValue> {
        let Some(ids) = result.ids.first() else {
            return Vec::new();
        };

        let distances = first_query(&result.distances);
        let documents = first_query(&result.documents);
        let metadatas = first_query(&result.metadatas);

        let docs: Vec<RetrievedDocument> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut doc = RetrievedDocument::new(id.as_str());
                if let Some(score) = distances.as_ref().and_then(|d| d.get(i)) {
                    doc = doc.score(f64::from(*score));
                }
                doc.content(documents.as_ref().and_then(|d| d.get(i)).map(|t| limits.text(t)))
                    .metadata(metadatas.as_ref().and_then(|m| m.get(i)))
            })
            .collect();

        let mut attributes = vec![KeyValue::new(DB_IDS_COUNT, ids.len() as i64)];
        if !docs.is_empty() {
            attributes.push(KeyValue::new(DB_QUERY_RETRIEVED_DOCUMENTS, retrieved_documents(&docs)));
        }
        attributes
    }
}

pub struct TracedChromaClient<C> {
    inner: C,
    instrumentation: Arc<Instrumentation>,
}

impl<C: ChromaClient> TracedChromaClient<C> {
    pub fn new(inner: C, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn wrap(&self, collection: C::Collection) -> TracedCollection<C::Collection> {
        TracedCollection::new(collection, self.instrumentation.clone())
    }
}

impl<C: ChromaClient> ChromaClient for TracedChromaClient<C> {
    type Error = C::Error;
    type Collection = TracedCollection<C::Collection>;

    fn create_collection(
        &self,
        name: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self::Collection, Self::Error> {
        self.instrumentation
            .trace(
                ops::create_collection(name),
                || self.inner.create_collection(name, metadata),
                |collection, _| ops::collection_id(collection.id()),
            )
            .map(|c| self.wrap(c))
    }

    fn get_collection(&self, name: &str) -> Result<Self::Collection, Self::Error> {
        self.instrumentation
            .trace(
                ops::get_collection(name),
                || self.inner.get_collection(name),
                |collection, _| ops::collection_id(collection.id()),
            )
            .map(|c| self.wrap(c))
    }

    fn list_collections(&self) -> Result<Vec<Self::Collection>, Self::Error> {
        self.instrumentation
            .trace(
                ops::list_collections(),
                || self.inner.list_collections(),
                |collections, _| ops::collections_count(collections.len()),
            )
            .map(|all| all.into_iter().map(|c| self.wrap(c)).collect())
    }

    fn delete_collection(&self, name: &str) -> Result<(), Self::Error> {
        self.instrumentation.trace(
            ops::delete_collection(name),
            || self.inner.delete_collection(name),
            |_, _| Vec::new(),
        )
    }
}

pub struct TracedCollection<T> {
    inner: T,
    instrumentation: Arc<Instrumentation>,
}

impl<T> TracedCollection<T> {
    pub fn new(inner: T, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: ChromaCollection> ChromaCollection for TracedCollection<T> {
    type Error = T::Error;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    fn add(&self, records: CollectionRecords) -> Result<(), Self::Error> {
        let op = ops::add(self.inner.name(), &records);
        self.instrumentation
            .trace(op, || self.inner.add(records), |_, _| Vec::new())
    }

    fn query(&self, request: QueryRequest) -> Result<QueryResult, Self::Error> {
        let op = ops::query(self.inner.name(), &request);
        self.instrumentation
            .trace(op, || self.inner.query(request), ops::query_result)
    }

    fn update(&self, records: CollectionRecords) -> Result<(), Self::Error> {
        let op = ops::update(self.inner.name(), &records);
        self.instrumentation
            .trace(op, || self.inner.update(records), |_, _| Vec::new())
    }

    fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error> {
        let op = ops::delete(self.inner.name(), &request);
        self.instrumentation
            .trace(op, || self.inner.delete(request), |_, _| Vec::new())
    }
}

pub struct TracedAsyncChromaClient<C> {
    inner: C,
    instrumentation: Arc<Instrumentation>,
}

impl<C: AsyncChromaClient> TracedAsyncChromaClient<C> {
    pub fn new(inner: C, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn wrap(&self, collection: C::Collection) -> TracedAsyncCollection<C::Collection> {
        TracedAsyncCollection::new(collection, self.instrumentation.clone())
    }
}

#[async_trait]
impl<C: AsyncChromaClient> AsyncChromaClient for TracedAsyncChromaClient<C> {
    type Error = C::Error;
    type Collection = TracedAsyncCollection<C::Collection>;

    async fn create_collection(
        &self,
        name: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self::Collection, Self::Error> {
        self.instrumentation
            .trace_async(
                ops::create_collection(name),
                self.inner.create_collection(name, metadata),
                |collection, _| ops::collection_id(collection.id()),
            )
            .await
            .map(|c| self.wrap(c))
    }

    async fn get_collection(&self, name: &str) -> Result<Self::Collection, Self::Error> {
        self.instrumentation
            .trace_async(
                ops::get_collection(name),
                self.inner.get_collection(name),
                |collection, _| ops::collection_id(collection.id()),
            )
            .await
            .map(|c| self.wrap(c))
    }

    async fn list_collections(&self) -> Result<Vec<Self::Collection>, Self::Error> {
        self.instrumentation
            .trace_async(
                ops::list_collections(),
                self.inner.list_collections(),
                |collections, _| ops::collections_count(collections.len()),
            )
            .await
            .map(|all| all.into_iter().map(|c| self.wrap(c)).collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), Self::Error> {
        self.instrumentation
            .trace_async(
                ops::delete_collection(name),
                self.inner.delete_collection(name),
                |_, _| Vec::new(),
            )
            .await
    }
}

pub struct TracedAsyncCollection<T> {
    inner: T,
    instrumentation: Arc<Instrumentation>,
}

impl<T> TracedAsyncCollection<T> {
    pub fn new(inner: T, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: AsyncChromaCollection> AsyncChromaCollection for TracedAsyncCollection<T> {
    type Error = T::Error;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn add(&self, records: CollectionRecords) -> Result<(), Self::Error> {
        let op = ops::add(self.inner.name(), &records);
        self.instrumentation
            .trace_async(op, self.inner.add(records), |_, _| Vec::new())
            .await
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResult, Self::Error> {
        let op = ops::query(self.inner.name(), &request);
        self.instrumentation
            .trace_async(op, self.inner.query(request), ops::query_result)
            .await
    }

    async fn update(&self, records: CollectionRecords) -> Result<(), Self::Error> {
        let op = ops::update(self.inner.name(), &records);
        self.instrumentation
            .trace_async(op, self.inner.update(records), |_, _| Vec::new())
            .await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<(), Self::Error> {
        let op = ops::delete(self.inner.name(), &request);
        self.instrumentation
            .trace_async(op, self.inner.delete(request), |_, _| Vec::new())
            .await
    }
}

//! Qdrant client tracing.
//!
//! Qdrant ships a blocking and an async client with the same surface. Both decorators
//! build their spans from the same operation and result helpers below.

use super::attributes::*;
use super::{Instrumentation, Operation, RetrievedDocument, TruncationLimits, VectorDb};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}

impl From<&PointId> for Value {
    fn from(id: &PointId) -> Self {
        match id {
            PointId::Num(n) => Value::from(*n),
            PointId::Uuid(s) => Value::from(s.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorParams {
    pub size: usize,
    pub distance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointStruct {
    pub id: PointId,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    #[serde(default)]
    pub operation_id: Option<u64>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub collection_name: String,
    pub query_vector: Vec<f32>,
    #[serde(default)]
    pub query_filter: Option<Value>,
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    pub with_payload: bool,
    #[serde(default)]
    pub with_vectors: bool,
}

impl SearchRequest {
    pub fn new(collection_name: impl Into<String>, query_vector: Vec<f32>, limit: usize) -> Self {
        Self {
            collection_name: collection_name.into(),
            query_vector,
            query_filter: None,
            limit,
            offset: 0,
            with_payload: true,
            with_vectors: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

/// A stored point as returned by `scroll` and `get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: PointId,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointsSelector {
    Points(Vec<PointId>),
    Filter(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollRequest {
    pub collection_name: String,
    #[serde(default)]
    pub scroll_filter: Option<Value>,
    pub limit: usize,
    #[serde(default)]
    pub offset: Option<PointId>,
    pub with_payload: bool,
    #[serde(default)]
    pub with_vectors: bool,
}

impl ScrollRequest {
    pub fn new(collection_name: impl Into<String>, limit: usize) -> Self {
        Self {
            collection_name: collection_name.into(),
            scroll_filter: None,
            limit,
            offset: None,
            with_payload: true,
            with_vectors: false,
        }
    }
}

/// A page of records and the offset of the next page.
pub type ScrollResult = (Vec<Record>, Option<PointId>);

pub trait QdrantClient {
    type Error: std::error::Error;

    fn create_collection(&self, collection_name: &str, vectors_config: VectorParams) -> Result<bool, Self::Error>;
    fn get_collections(&self) -> Result<Vec<String>, Self::Error>;
    fn delete_collection(&self, collection_name: &str) -> Result<bool, Self::Error>;
    fn upsert(&self, collection_name: &str, points: Vec<PointStruct>) -> Result<UpdateResult, Self::Error>;
    fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, Self::Error>;
    fn delete(&self, collection_name: &str, selector: PointsSelector) -> Result<UpdateResult, Self::Error>;
    fn scroll(&self, request: ScrollRequest) -> Result<ScrollResult, Self::Error>;
    fn get(
        &self,
        collection_name: &str,
        ids: Vec<PointId>,
        with_vectors: bool,
    ) -> Result<Vec<Record>, Self::Error>;
}

#[async_trait]
pub trait AsyncQdrantClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn create_collection(&self, collection_name: &str, vectors_config: VectorParams) -> Result<bool, Self::Error>;
    async fn get_collections(&self) -> Result<Vec<String>, Self::Error>;
    async fn delete_collection(&self, collection_name: &str) -> Result<bool, Self::Error>;
    async fn upsert(&self, collection_name: &str, points: Vec<PointStruct>) -> Result<UpdateResult, Self::Error>;
    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, Self::Error>;
    async fn delete(&self, collection_name: &str, selector: PointsSelector) -> Result<UpdateResult, Self::Error>;
    async fn scroll(&self, request: ScrollRequest) -> Result<ScrollResult, Self::Error>;
    async fn get(
        &self,
        collection_name: &str,
        ids: Vec<PointId>,
        with_vectors: bool,
    ) -> Result<Vec<Record>, Self::Error>;
}

mod ops {
    use super::*;

    fn op(operation: &'static str, span_name: &'static str) -> Operation {
        Operation::new(VectorDb::Qdrant, operation, span_name)
    }

    fn with_filter(op: Operation, filter: &Option<Value>) -> Operation {
        op.attr_if(DB_FILTER, filter.as_ref().filter(|f| !f.is_null()).map(safe_json))
    }

    pub fn create_collection(name: &str, config: &VectorParams) -> Operation {
        op("create_collection", "qdrant.create_collection")
            .collection(name)
            .attr(DB_COLLECTION_DIMENSION, config.size as i64)
    }

    pub fn get_collections() -> Operation {
        op("list_collections", "qdrant.get_collections")
    }

    pub fn delete_collection(name: &str) -> Operation {
        op("delete_collection", "qdrant.delete_collection").collection(name)
    }

    pub fn upsert(name: &str, points: &[PointStruct]) -> Operation {
        op("upsert", "qdrant.upsert")
            .collection(name)
            .attr(DB_VECTOR_COUNT, points.len() as i64)
            .attr(DB_IDS_COUNT, points.len() as i64)
    }

    pub fn search(request: &SearchRequest) -> Operation {
        let op = op("query", "qdrant.search")
            .collection(&request.collection_name)
            .attr(DB_N_RESULTS, request.limit as i64)
            .attr(DB_OFFSET, request.offset as i64);
        with_filter(op, &request.query_filter)
            .attr_if(DB_VECTOR_COUNT, (!request.query_vector.is_empty()).then_some(1i64))
    }

    pub fn delete(name: &str, selector: &PointsSelector) -> Operation {
        let op = op("delete", "qdrant.delete").collection(name);
        match selector {
            PointsSelector::Points(ids) => op.attr(DB_IDS_COUNT, ids.len() as i64),
            PointsSelector::Filter(filter) => op.attr(DB_FILTER, safe_json(filter)),
        }
    }

    pub fn scroll(request: &ScrollRequest) -> Operation {
        let op = op("scroll", "qdrant.scroll")
            .collection(&request.collection_name)
            .attr(DB_LIMIT, request.limit as i64)
            .attr_if(DB_OFFSET, request.offset.as_ref().map(|o| o.to_string()));
        with_filter(op, &request.scroll_filter)
    }

    pub fn get(name: &str, ids: &[PointId]) -> Operation {
        op("get", "qdrant.get")
            .collection(name)
            .attr(DB_IDS_COUNT, ids.len() as i64)
    }

    pub fn collections_count(collections: &[String], _: &TruncationLimits) -> Vec<KeyValue> {
        vec![KeyValue::new(DB_COLLECTIONS_COUNT, collections.len() as i64)]
    }

    pub fn operation_id(result: &UpdateResult, _: &TruncationLimits) -> Vec<KeyValue> {
        result
            .operation_id
            .map(|id| KeyValue::new(DB_OPERATION_ID, id as i64))
            .into_iter()
            .collect()
    }

    fn vector_content(vector: &Option<Vec<f32>>, with_vectors: bool, limits: &TruncationLimits) -> Option<String> {
        vector
            .as_ref()
            .filter(|v| with_vectors && !v.is_empty())
            .map(|v| limits.vector(v))
    }

    pub fn scored_points(
        points: &[ScoredPoint],
        with_vectors: bool,
        limits: &TruncationLimits,
    ) -> Vec<KeyValue> {
        if points.is_empty() {
            return Vec::new();
        }
        let docs: Vec<RetrievedDocument> = points
            .iter()
            .map(|p| {
                RetrievedDocument::new(&p.id)
                    .score(f64::from(p.score))
                    .metadata(p.payload.as_ref())
                    .content(vector_content(&p.vector, with_vectors, limits))
            })
            .collect();
        vec![
            KeyValue::new(DB_IDS_COUNT, points.len() as i64),
            KeyValue::new(DB_QUERY_RETRIEVED_DOCUMENTS, retrieved_documents(&docs)),
        ]
    }

    /// `count_key` is `db.ids_count` for scroll and `db.vector_count` for get.
    pub fn records(
        records: &[Record],
        count_key: &'static str,
        with_vectors: bool,
        limits: &TruncationLimits,
    ) -> Vec<KeyValue> {
        if records.is_empty() {
            return Vec::new();
        }
        let docs: Vec<RetrievedDocument> = records
            .iter()
            .map(|r| {
                RetrievedDocument::new(&r.id)
                    .metadata(r.payload.as_ref())
                    .content(vector_content(&r.vector, with_vectors, limits))
            })
            .collect();
        vec![
            KeyValue::new(count_key, records.len() as i64),
            KeyValue::new(DB_QUERY_RETRIEVED_DOCUMENTS, retrieved_documents(&docs)),
        ]
    }
}

pub struct TracedQdrantClient<C> {
    inner: C,
    instrumentation: Arc<Instrumentation>,
}

impl<C: QdrantClient> TracedQdrantClient<C> {
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

impl<C: QdrantClient> QdrantClient for TracedQdrantClient<C> {
    type Error = C::Error;

    fn create_collection(&self, collection_name: &str, vectors_config: VectorParams) -> Result<bool, Self::Error> {
        self.instrumentation.trace(
            ops::create_collection(collection_name, &vectors_config),
            || self.inner.create_collection(collection_name, vectors_config),
            |_, _| Vec::new(),
        )
    }

    fn get_collections(&self) -> Result<Vec<String>, Self::Error> {
        self.instrumentation.trace(
            ops::get_collections(),
            || self.inner.get_collections(),
            |c, limits| ops::collections_count(c, limits),
        )
    }

    fn delete_collection(&self, collection_name: &str) -> Result<bool, Self::Error> {
        self.instrumentation.trace(
            ops::delete_collection(collection_name),
            || self.inner.delete_collection(collection_name),
            |_, _| Vec::new(),
        )
    }

    fn upsert(&self, collection_name: &str, points: Vec<PointStruct>) -> Result<UpdateResult, Self::Error> {
        self.instrumentation.trace(
            ops::upsert(collection_name, &points),
            || self.inner.upsert(collection_name, points),
            ops::operation_id,
        )
    }

    fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, Self::Error> {
        let with_vectors = request.with_vectors;
        self.instrumentation.trace(
            ops::search(&request),
            || self.inner.search(request),
            |points, limits| ops::scored_points(points, with_vectors, limits),
        )
    }

    fn delete(&self, collection_name: &str, selector: PointsSelector) -> Result<UpdateResult, Self::Error> {
        self.instrumentation.trace(
            ops::delete(collection_name, &selector),
            || self.inner.delete(collection_name, selector),
            ops::operation_id,
        )
    }

    fn scroll(&self, request: ScrollRequest) -> Result<ScrollResult, Self::Error> {
        let with_vectors = request.with_vectors;
        self.instrumentation.trace(
            ops::scroll(&request),
            || self.inner.scroll(request),
            |page, limits| ops::records(&page.0, DB_IDS_COUNT, with_vectors, limits),
        )
    }

    fn get(
        &self,
        collection_name: &str,
        ids: Vec<PointId>,
        with_vectors: bool,
    ) -> Result<Vec<Record>, Self::Error> {
        self.instrumentation.trace(
            ops::get(collection_name, &ids),
            || self.inner.get(collection_name, ids, with_vectors),
            |records, limits| ops::records(records, DB_VECTOR_COUNT, with_vectors, limits),
        )
    }
}

pub struct TracedAsyncQdrantClient<C> {
    inner: C,
    instrumentation: Arc<Instrumentation>,
}

impl<C: AsyncQdrantClient> TracedAsyncQdrantClient<C> {
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
impl<C: AsyncQdrantClient> AsyncQdrantClient for TracedAsyncQdrantClient<C> {
    type Error = C::Error;

    async fn create_collection(&self, collection_name: &str, vectors_config: VectorParams) -> Result<bool, Self::Error> {
        let op = ops::create_collection(collection_name, &vectors_config);
        self.instrumentation
            .trace_async(
                op,
                self.inner.create_collection(collection_name, vectors_config),
                |_, _| Vec::new(),
            )
            .await
    }

    async fn get_collections(&self) -> Result<Vec<String>, Self::Error> {
        self.instrumentation
            .trace_async(ops::get_collections(), self.inner.get_collections(), |c, limits| {
                ops::collections_count(c, limits)
            })
            .await
    }

    async fn delete_collection(&self, collection_name: &str) -> Result<bool, Self::Error> {
        self.instrumentation
            .trace_async(
                ops::delete_collection(collection_name),
                self.inner.delete_collection(collection_name),
                |_, _| Vec::new(),
            )
            .await
    }

    async fn upsert(&self, collection_name: &str, points: Vec<PointStruct>) -> Result<UpdateResult, Self::Error> {
        let op = ops::upsert(collection_name, &points);
        self.instrumentation
            .trace_async(op, self.inner.upsert(collection_name, points), ops::operation_id)
            .await
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, Self::Error> {
        let op = ops::search(&request);
        let with_vectors = request.with_vectors;
        self.instrumentation
            .trace_async(op, self.inner.search(request), |points, limits| {
                ops::scored_points(points, with_vectors, limits)
            })
            .await
    }

    async fn delete(&self, collection_name: &str, selector: PointsSelector) -> Result<UpdateResult, Self::Error> {
        let op = ops::delete(collection_name, &selector);
        self.instrumentation
            .trace_async(op, self.inner.delete(collection_name, selector), ops::operation_id)
            .await
    }

    async fn scroll(&self, request: ScrollRequest) -> Result<ScrollResult, Self::Error> {
        let op = ops::scroll(&request);
        let with_vectors = request.with_vectors;
        self.instrumentation
            .trace_async(op, self.inner.scroll(request), |page, limits| {
                ops::records(&page.0, DB_IDS_COUNT, with_vectors, limits)
            })
            .await
    }

    async fn get(
        &self,
        collection_name: &str,
        ids: Vec<PointId>,
        with_vectors: bool,
    ) -> Result<Vec<Record>, Self::Error> {
        let op = ops::get(collection_name, &ids);
        self.instrumentation
            .trace_async(op, self.inner.get(collection_name, ids, with_vectors), |records, limits| {
                ops::records(records, DB_VECTOR_COUNT, with_vectors, limits)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{attr, provider, spans, FakeError};
    use super::super::Instrumentor;
    use super::*;
    use opentelemetry_sdk::trace::InMemorySpanExporter;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryQdrant {
        points: Mutex<Vec<PointStruct>>,
    }

    impl MemoryQdrant {
        fn records(&self, with_vectors: bool) -> Vec<Record> {
            self.points
                .lock()
                .unwrap()
                .iter()
                .map(|p| Record {
                    id: p.id.clone(),
                    payload: p.payload.clone(),
                    vector: with_vectors.then(|| p.vector.clone()),
                })
                .collect()
        }
    }

    impl QdrantClient for MemoryQdrant {
        type Error = FakeError;

        fn create_collection(&self, _: &str, _: VectorParams) -> Result<bool, FakeError> {
            Ok(true)
        }

        fn get_collections(&self) -> Result<Vec<String>, FakeError> {
            Ok(vec!["docs".to_string(), "faq".to_string()])
        }

        fn delete_collection(&self, name: &str) -> Result<bool, FakeError> {
            if name == "docs" {
                Ok(true)
            } else {
                Err(FakeError("collection not found"))
            }
        }

        fn upsert(&self, _: &str, points: Vec<PointStruct>) -> Result<UpdateResult, FakeError> {
            self.points.lock().unwrap().extend(points);
            Ok(UpdateResult { operation_id: Some(42), status: "completed".to_string() })
        }

        fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, FakeError> {
            Ok(self
                .records(request.with_vectors)
                .into_iter()
                .take(request.limit)
                .map(|r| ScoredPoint { id: r.id, score: 0.75, payload: r.payload, vector: r.vector })
                .collect())
        }

        fn delete(&self, _: &str, _: PointsSelector) -> Result<UpdateResult, FakeError> {
            Ok(UpdateResult { operation_id: None, status: "acknowledged".to_string() })
        }

        fn scroll(&self, request: ScrollRequest) -> Result<ScrollResult, FakeError> {
            Ok((self.records(request.with_vectors), None))
        }

        fn get(&self, _: &str, ids: Vec<PointId>, with_vectors: bool) -> Result<Vec<Record>, FakeError> {
            Ok(self
                .records(with_vectors)
                .into_iter()
                .filter(|r| ids.contains(&r.id))
                .collect())
        }
    }

    #[async_trait]
    impl AsyncQdrantClient for MemoryQdrant {
        type Error = FakeError;

        async fn create_collection(&self, name: &str, config: VectorParams) -> Result<bool, FakeError> {
            QdrantClient::create_collection(self, name, config)
        }
        async fn get_collections(&self) -> Result<Vec<String>, FakeError> {
            QdrantClient::get_collections(self)
        }
        async fn delete_collection(&self, name: &str) -> Result<bool, FakeError> {
            QdrantClient::delete_collection(self, name)
        }
        async fn upsert(&self, name: &str, points: Vec<PointStruct>) -> Result<UpdateResult, FakeError> {
            QdrantClient::upsert(self, name, points)
        }
        async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredPoint>, FakeError> {
            QdrantClient::search(self, request)
        }
        async fn delete(&self, name: &str, selector: PointsSelector) -> Result<UpdateResult, FakeError> {
            QdrantClient::delete(self, name, selector)
        }
        async fn scroll(&self, request: ScrollRequest) -> Result<ScrollResult, FakeError> {
            QdrantClient::scroll(self, request)
        }
        async fn get(&self, name: &str, ids: Vec<PointId>, with_vectors: bool) -> Result<Vec<Record>, FakeError> {
            QdrantClient::get(self, name, ids, with_vectors)
        }
    }

    fn instrumentation() -> (Arc<Instrumentation>, InMemorySpanExporter) {
        let (provider, exporter) = provider();
        let instrumentation = Arc::new(Instrumentation::new(
            VectorDb::Qdrant,
            &provider,
            TruncationLimits::default(),
        ));
        instrumentation.instrument();
        (instrumentation, exporter)
    }

    fn point(id: u64, text: &str) -> PointStruct {
        PointStruct {
            id: PointId::Num(id),
            vector: vec![0.1, 0.2],
            payload: Some([("text".to_string(), json!(text))].into_iter().collect()),
        }
    }

    #[test]
    fn test_sync_client_spans() {
        let (instrumentation, exporter) = instrumentation();
        let client = TracedQdrantClient::new(MemoryQdrant::default(), instrumentation);

        client
            .create_collection("docs", VectorParams { size: 384, distance: "Cosine".to_string() })
            .unwrap();
        client.upsert("docs", vec![point(1, "hello"), point(2, "world")]).unwrap();
        let hits = client.search(SearchRequest::new("docs", vec![0.1, 0.2], 5)).unwrap();
        assert_eq!(hits.len(), 2);

        let spans = spans(&exporter);
        let names: Vec<&str> = spans.iter().map(|s| s.name.as_ref()).collect();
        assert_eq!(names, vec!["qdrant.create_collection", "qdrant.upsert", "qdrant.search"]);

        assert_eq!(attr(&spans[0], "db.collection.dimension"), Some(384i64.into()));
        assert_eq!(attr(&spans[1], "db.operation.id"), Some(42i64.into()));
        assert_eq!(attr(&spans[2], "db.operation"), Some("query".into()));
        assert_eq!(attr(&spans[2], "db.n_results"), Some(5i64.into()));
        assert_eq!(attr(&spans[2], "db.ids_count"), Some(2i64.into()));

        let docs: Value =
            serde_json::from_str(&attr(&spans[2], "db.query.retrieved_documents").unwrap().as_str())
                .unwrap();
        assert_eq!(docs[0]["document.id"], 1);
        assert_eq!(docs[0]["document.metadata"], r#"{"text":"hello"}"#);
        assert!(docs[0].get("document.content").is_none());
    }

    #[test]
    fn test_sync_delete_collection_error() {
        let (instrumentation, exporter) = instrumentation();
        let client = TracedQdrantClient::new(MemoryQdrant::default(), instrumentation);

        assert_eq!(client.delete_collection("faq").unwrap_err().0, "collection not found");

        let span = spans(&exporter).pop().unwrap();
        assert_eq!(attr(&span, "db.operation.status"), Some("error".into()));
        assert_eq!(attr(&span, "db.collection.name"), Some("faq".into()));
    }

    #[tokio::test]
    async fn test_async_client_shares_attributes() {
        let (instrumentation, exporter) = instrumentation();
        let client = TracedAsyncQdrantClient::new(MemoryQdrant::default(), instrumentation);

        AsyncQdrantClient::upsert(&client, "docs", vec![point(7, "a")]).await.unwrap();
        let (page, next) = AsyncQdrantClient::scroll(
            &client,
            ScrollRequest { with_vectors: true, ..ScrollRequest::new("docs", 10) },
        )
        .await
        .unwrap();
        assert_eq!(page.len(), 1);
        assert!(next.is_none());
        let records = AsyncQdrantClient::get(&client, "docs", vec![PointId::Num(7)], false)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let collections = AsyncQdrantClient::get_collections(&client).await.unwrap();
        assert_eq!(collections.len(), 2);

        let spans = spans(&exporter);
        assert_eq!(spans[1].name, "qdrant.scroll");
        assert_eq!(attr(&spans[1], "db.limit"), Some(10i64.into()));
        assert_eq!(attr(&spans[1], "db.ids_count"), Some(1i64.into()));
        let docs: Value =
            serde_json::from_str(&attr(&spans[1], "db.query.retrieved_documents").unwrap().as_str())
                .unwrap();
        assert_eq!(docs[0]["document.content"], "[0.1, 0.2]");

        assert_eq!(spans[2].name, "qdrant.get");
        assert_eq!(attr(&spans[2], "db.vector_count"), Some(1i64.into()));
        assert_eq!(spans[3].name, "qdrant.get_collections");
        assert_eq!(attr(&spans[3], "db.collections.count"), Some(2i64.into()));
    }

    #[tokio::test]
    async fn test_delete_by_filter_records_filter() {
        let (instrumentation, exporter) = instrumentation();
        let client = TracedAsyncQdrantClient::new(MemoryQdrant::default(), instrumentation.clone());

        AsyncQdrantClient::delete(&client, "docs", PointsSelector::Filter(json!({"must": []})))
            .await
            .unwrap();
        instrumentation.uninstrument();
        AsyncQdrantClient::delete(&client, "docs", PointsSelector::Points(vec![PointId::Num(1)]))
            .await
            .unwrap();

        let spans = spans(&exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(attr(&spans[0], "db.filter"), Some(r#"{"must":[]}"#.into()));
        assert_eq!(attr(&spans[0], "db.operation.id"), None);
    }
}

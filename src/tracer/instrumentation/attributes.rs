//! Span attribute keys and value formatting shared by every instrumentor.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;

pub const DB_SYSTEM_NAME: &str = "db.system.name";
pub const DB_OPERATION: &str = "db.operation";
pub const DB_OPERATION_STATUS: &str = "db.operation.status";
pub const DB_OPERATION_ID: &str = "db.operation.id";
pub const DB_COLLECTION_NAME: &str = "db.collection.name";
pub const DB_COLLECTION_ID: &str = "db.collection.id";
pub const DB_COLLECTION_DIMENSION: &str = "db.collection.dimension";
pub const DB_COLLECTIONS_COUNT: &str = "db.collections.count";
pub const DB_INDEX_NAME: &str = "db.index.name";
pub const DB_INDEX_DIMENSION: &str = "db.index.dimension";
pub const DB_INDEXES_COUNT: &str = "db.indexes.count";
pub const DB_CREATE_INDEX_METRIC: &str = "db.create_index.metric";
pub const DB_CREATE_INDEX_SPEC: &str = "db.create_index.spec";
pub const DB_IDS_COUNT: &str = "db.ids_count";
pub const DB_VECTOR_COUNT: &str = "db.vector_count";
pub const DB_DOCUMENTS_COUNT: &str = "db.documents_count";
pub const DB_METADATAS_COUNT: &str = "db.metadatas_count";
pub const DB_UPSERTED_COUNT: &str = "db.upserted_count";
pub const DB_N_RESULTS: &str = "db.n_results";
pub const DB_FILTER: &str = "db.filter";
pub const DB_WHERE_DOCUMENT: &str = "db.where_document";
pub const DB_QUERY_NAMESPACE: &str = "db.query.namespace";
pub const DB_QUERY_TYPE: &str = "db.query.type";
pub const DB_QUERY_RETRIEVED_DOCUMENTS: &str = "db.query.retrieved_documents";
pub const DB_DELETE_ALL: &str = "db.delete_all";
pub const DB_UPDATE_ID: &str = "db.update.id";
pub const DB_UPDATE_METADATA: &str = "db.update.metadata";
pub const DB_OFFSET: &str = "db.offset";
pub const DB_LIMIT: &str = "db.limit";

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_ERROR: &str = "error";

/// Bounds applied to payload data copied into span attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationLimits {
    /// Longest document text kept, in characters.
    pub max_content_chars: usize,
    /// Leading vector components kept when a vector is rendered as content.
    pub max_vector_values: usize,
}

impl Default for TruncationLimits {
    fn default() -> Self {
        Self {
            max_content_chars: 1000,
            max_vector_values: 10,
        }
    }
}

impl TruncationLimits {
    pub fn text(&self, text: &str) -> String {
        match text.char_indices().nth(self.max_content_chars) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text.to_string(),
        }
    }

    /// Render the leading components of a vector, e.g. `[0.1, 0.2]`.
    pub fn vector(&self, values: &[f32]) -> String {
        let end = values.len().min(self.max_vector_values);
        format!("{:?}", &values[..end])
    }
}

/// JSON encoding of an attribute value, falling back to its `Debug` form.
pub fn safe_json<T: Serialize + Debug + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

/// One document or point returned by a query, as reported on the span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedDocument {
    pub id: Value,
    pub score: Option<f64>,
    pub content: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl RetrievedDocument {
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn content(mut self, content: Option<String>) -> Self {
        self.content = content;
        self
    }

    /// Empty metadata is omitted.
    pub fn metadata(mut self, metadata: Option<&Map<String, Value>>) -> Self {
        self.metadata = metadata.filter(|m| !m.is_empty()).cloned();
        self
    }

    fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("document.id".to_string(), self.id.clone());
        if let Some(score) = self.score {
            doc.insert("document.score".to_string(), Value::from(score));
        }
        if let Some(content) = &self.content {
            doc.insert("document.content".to_string(), Value::from(content.as_str()));
        }
        if let Some(metadata) = &self.metadata {
            doc.insert("document.metadata".to_string(), Value::from(safe_json(metadata)));
        }
        Value::Object(doc)
    }
}

/// Value of `db.query.retrieved_documents`: a JSON array of document objects whose
/// metadata is itself a JSON-encoded string.
pub fn retrieved_documents(documents: &[RetrievedDocument]) -> String {
    let docs: Vec<Value> = documents.iter().map(RetrievedDocument::to_json).collect();
    safe_json(&docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retrieved_documents_format() {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!("wiki"));

        let encoded = retrieved_documents(&[
            RetrievedDocument::new("doc1")
                .score(0.25)
                .content(Some("Paris is the capital of France".to_string()))
                .metadata(Some(&metadata)),
            RetrievedDocument::new(7),
        ]);

        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded[0]["document.id"], "doc1");
        assert_eq!(decoded[0]["document.score"], 0.25);
        assert_eq!(decoded[0]["document.metadata"], r#"{"source":"wiki"}"#);
        assert_eq!(decoded[1], json!({"document.id": 7}));
    }

    #[test]
    fn test_empty_metadata_is_omitted() {
        let doc = RetrievedDocument::new("a").metadata(Some(&Map::new()));
        assert!(doc.metadata.is_none());
    }

    #[test]
    fn test_truncation() {
        let limits = TruncationLimits {
            max_content_chars: 3,
            max_vector_values: 2,
        };
        assert_eq!(limits.text("héllo"), "hél");
        assert_eq!(limits.text("hi"), "hi");
        assert_eq!(limits.vector(&[0.5, 1.0, 2.0]), "[0.5, 1.0]");
    }
}

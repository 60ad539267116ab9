use super::{de, segment, Filters};
use crate::error::{QuotientError, Result};
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Row uploads in flight at once.
const ROW_UPLOAD_CONCURRENCY: usize = 4;

fn default_annotation() -> Option<String> {
    Some("ungraded".to_string())
}

/// Grading state of a row: `good`, `bad` or `ungraded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRowMetadata {
    #[serde(default = "default_annotation")]
    pub annotation: Option<String>,
    #[serde(default)]
    pub annotation_note: Option<String>,
}

impl Default for DatasetRowMetadata {
    fn default() -> Self {
        Self {
            annotation: default_annotation(),
            annotation_note: None,
        }
    }
}

/// A stored row of a dataset. `expected` is optional to allow reference-free evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(rename = "dataset_row_id", alias = "id", deserialize_with = "de::id")]
    pub id: String,
    pub input: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(flatten)]
    pub metadata: DatasetRowMetadata,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A row to upload. Only `input` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDatasetRow {
    pub input: String,
    pub context: Option<String>,
    pub expected: Option<String>,
    pub annotation: Option<String>,
    pub annotation_note: Option<String>,
}

impl NewDatasetRow {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub owner_profile_id: Option<String>,
    #[serde(default)]
    pub file_format: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "dataset_rows")]
    pub rows: Vec<DatasetRow>,
}

pub struct DatasetsResource {
    http: HttpClient,
}

impl DatasetsResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// All datasets, without their rows.
    pub async fn list(&self) -> Result<Vec<Dataset>> {
        self.filter(&[]).await
    }

    pub async fn filter(&self, filters: &Filters) -> Result<Vec<Dataset>> {
        self.http.get_with_query("/datasets", filters).await
    }

    /// A dataset with its rows.
    pub async fn get(&self, id: &str) -> Result<Dataset> {
        self.http.get(&format!("/datasets/{}", segment(id))).await
    }

    /// Create a dataset, then upload each row.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        rows: &[NewDatasetRow],
    ) -> Result<Dataset> {
        let body = json!({"name": name, "description": description});
        let mut dataset: Dataset = self.http.post("/datasets", &body).await?;
        debug!("Created dataset {} ({})", dataset.name, dataset.id);

        dataset.rows = self.upload_rows(&dataset.id, rows).await?;
        Ok(dataset)
    }

    /// Rename, re-describe, or edit existing rows of a dataset.
    pub async fn update(
        &self,
        dataset: &Dataset,
        name: Option<&str>,
        description: Option<&str>,
        rows: Option<&[DatasetRow]>,
    ) -> Result<Dataset> {
        let mut body = json!({"name": name, "description": description});
        if let Some(rows) = rows.filter(|r| !r.is_empty()) {
            body["rows"] = rows
                .iter()
                .map(|row| {
                    json!({
                        "id": row.id,
                        "input": row.input,
                        "context": row.context,
                        "expected": row.expected,
                        "annotation": row.metadata.annotation,
                        "annotation_note": row.metadata.annotation_note,
                    })
                })
                .collect();
        }

        self.http
            .patch(&format!("/datasets/{}", segment(&dataset.id)), &body)
            .await
    }

    /// Upload more rows; returns the dataset with the new rows appended.
    pub async fn append(&self, dataset: &Dataset, rows: &[NewDatasetRow]) -> Result<Dataset> {
        let added = self.upload_rows(&dataset.id, rows).await?;
        let mut updated = dataset.clone();
        updated.rows.extend(added);
        Ok(updated)
    }

    /// Delete the whole dataset, or only `rows` when given.
    pub async fn delete(&self, dataset: &Dataset, rows: Option<&[DatasetRow]>) -> Result<()> {
        match rows.filter(|r| !r.is_empty()) {
            Some(rows) => {
                for row in rows {
                    let path = format!(
                        "/datasets/{}/dataset_rows/{}",
                        segment(&dataset.id),
                        segment(&row.id)
                    );
                    expect_no_content(self.http.delete(&path).await?, &format!("row {}", row.id))?;
                }
            }
            None => {
                let path = format!("/datasets/{}", segment(&dataset.id));
                expect_no_content(
                    self.http.delete(&path).await?,
                    &format!("dataset {}", dataset.id),
                )?;
            }
        }
        Ok(())
    }

    /// Rows are posted concurrently; the returned rows keep the input order.
    async fn upload_rows(&self, dataset_id: &str, rows: &[NewDatasetRow]) -> Result<Vec<DatasetRow>> {
        let path = format!("/datasets/{}/dataset_rows", segment(dataset_id));
        stream::iter(rows)
            .map(|row| self.http.post::<DatasetRow, _>(&path, row))
            .buffered(ROW_UPLOAD_CONCURRENCY)
            .try_collect()
            .await
    }
}

fn expect_no_content(status: StatusCode, what: &str) -> Result<()> {
    if status == StatusCode::NO_CONTENT {
        Ok(())
    } else {
        Err(QuotientError::Api {
            status: status.as_u16(),
            message: format!("failed to delete {what}"),
            body: None,
        })
    }
}

use super::{de, Filters};
use crate::error::Result;
use crate::http::HttpClient;
use serde::{Deserialize, Serialize};

/// A dataset bound to a task type and the metrics to score it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub owner_profile_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub name: String,
    pub dataset_id: i64,
    pub task_type: String,
    pub metrics: Vec<String>,
}

pub struct TasksResource {
    http: HttpClient,
}

impl TasksResource {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self, filters: &Filters) -> Result<Vec<Task>> {
        self.http.get_with_query("/tasks", filters).await
    }

    pub async fn create(&self, task: &NewTask) -> Result<Task> {
        self.http.post("/tasks", task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn test_list_tasks_filtered() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks")
            .match_query(mockito::Matcher::UrlEncoded("task_type".into(), "question_answering".into()))
            .with_status(200)
            .with_body(r#"[{"id":1,"name":"squad","dataset_id":2,"dataset_name":"squad-v2","task_type":"question_answering","metrics":["exactmatch","f1"]}]"#)
            .create();

        let config = ClientConfig::with_api_key("k").base_url(server.url()).token_path(None);
        let filters = vec![("task_type".to_string(), "question_answering".to_string())];
        let tasks = TasksResource::new(HttpClient::new(&config).unwrap())
            .list(&filters)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(tasks[0].dataset_id.as_deref(), Some("2"));
        assert_eq!(tasks[0].metrics, vec!["exactmatch", "f1"]);
    }
}

//! Authenticated JSON transport for the Quotient API.
//!
//! Every resource client goes through [`HttpClient`]. It strips `null` fields from request
//! bodies, maps non-success status codes onto [`QuotientError`] variants, and picks up
//! refreshed JWTs from the `X-JWT-Token` response header.

mod token;

pub use token::TokenStore;

use crate::config::ClientConfig;
use crate::error::{QuotientError, Result};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const JWT_HEADER: &str = "X-JWT-Token";

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: String,
    tokens: Arc<TokenStore>,
}

impl HttpClient {
    /// Build a transport from configuration. Fails when no API key can be found.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        let mut client_builder = Client::builder();
        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        let client = client_builder
            .build()
            .map_err(|e| QuotientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            tokens: Arc::new(TokenStore::load(config.token_path.clone())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let value = self.request(Method::GET, path, query, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = strip_nulls(serde_json::to_value(body)?);
        let value = self.request(Method::POST, path, &[], Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = strip_nulls(serde_json::to_value(body)?);
        let value = self.request(Method::PATCH, path, &[], Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// DELETE a resource. Returns the status so callers can insist on `204 No Content`.
    pub async fn delete(&self, path: &str) -> Result<StatusCode> {
        let response = self.send(Method::DELETE, path, &[], None).await?;
        Ok(response.status())
    }

    /// DELETE with a JSON body, used for removing dataset rows in bulk.
    pub async fn delete_with_body<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<StatusCode> {
        let body = strip_nulls(serde_json::to_value(body)?);
        let response = self.send(Method::DELETE, path, &[], Some(body)).await?;
        Ok(response.status())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value> {
        let response = self.send(method, path, query, body).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(self.bearer_token());
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        self.capture_token(&response);

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &text))
    }

    fn bearer_token(&self) -> String {
        self.tokens
            .valid_token()
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn capture_token(&self, response: &Response) {
        let Some(token) = response
            .headers()
            .get(JWT_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };

        self.tokens.store(token);
    }
}

/// Drop top-level `null` members so optional fields never reach the API.
pub(crate) fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        Value::Array(items) => Value::Array(items.into_iter().filter(|v| !v.is_null()).collect()),
        other => other,
    }
}

fn map_transport_error(err: reqwest::Error) -> QuotientError {
    if err.is_timeout() {
        QuotientError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        QuotientError::Connection(format!("please try again later. ({})", err))
    } else {
        QuotientError::Http(err)
    }
}

pub(crate) fn error_for_status(status: StatusCode, text: &str) -> QuotientError {
    let body: Option<Value> = serde_json::from_str(text).ok();
    let code = status.as_u16();

    match code {
        400 => QuotientError::BadRequest(
            "the server could not understand the request due to invalid syntax.".to_string(),
        ),
        401 => QuotientError::Authentication(
            "the request requires user authentication. ensure your API key is correct."
                .to_string(),
        ),
        403 => QuotientError::PermissionDenied(
            "the server understood the request, but it refuses to authorize it.".to_string(),
        ),
        404 => QuotientError::NotFound(
            "the server can not find the requested resource.".to_string(),
        ),
        409 => QuotientError::Conflict(
            detail_message(body.as_ref()).unwrap_or_else(|| "resource already exists.".to_string()),
        ),
        422 => QuotientError::Validation(unprocessable_message(body.as_ref())),
        429 => QuotientError::RateLimit(
            "too many requests. please slow down and try again later.".to_string(),
        ),
        500..=599 => QuotientError::Server {
            status: code,
            message: detail_message(body.as_ref())
                .unwrap_or_else(|| "contact support@quotientai.co for help.".to_string()),
        },
        _ => QuotientError::Api {
            status: code,
            message: "contact support@quotientai.co for help.".to_string(),
            body,
        },
    }
}

fn detail_message(body: Option<&Value>) -> Option<String> {
    body?["detail"].as_str().map(String::from)
}

/// Summarise a 422 body, naming the fields the API reported as missing.
fn unprocessable_message(body: Option<&Value>) -> String {
    let missing: Vec<String> = body
        .and_then(|b| b["detail"].as_array())
        .map(|details| {
            details
                .iter()
                .filter(|d| d["type"] == "missing")
                .filter_map(|d| d["loc"].as_array()?.last().map(loc_to_string))
                .collect()
        })
        .unwrap_or_default();

    if missing.is_empty() {
        return detail_message(body)
            .unwrap_or_else(|| "data returned by API invalid for expected schema.".to_string());
    }

    format!("missing required fields: {}", missing.join(", "))
}

fn loc_to_string(value: &Value) -> String {
    value
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> HttpClient {
        let config = ClientConfig::with_api_key("test-key")
            .base_url(server.url())
            .token_path(None);
        HttpClient::new(&config).unwrap()
    }

    #[test]
    fn test_strip_nulls_removes_top_level_nulls_only() {
        let value = json!({"name": "a", "description": null, "nested": {"x": null}});
        assert_eq!(
            strip_nulls(value),
            json!({"name": "a", "nested": {"x": null}})
        );
    }

    #[test]
    fn test_unprocessable_lists_missing_fields() {
        let err = error_for_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"type":"missing","loc":["body","name"]},{"type":"missing","loc":["body","rows"]},{"type":"string_type","loc":["body","x"]}]}"#,
        );
        assert_eq!(err.to_string(), "missing required fields: name, rows");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, ""),
            QuotientError::Authentication(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, ""),
            QuotientError::NotFound(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, ""),
            QuotientError::RateLimit(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, ""),
            QuotientError::Server { status: 502, .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::IM_A_TEAPOT, ""),
            QuotientError::Api { status: 418, .. }
        ));
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = ClientConfig {
            api_key: None,
            base_url: "http://localhost".to_string(),
            timeout: None,
            token_path: None,
        };
        assert!(matches!(
            HttpClient::new(&config),
            Err(QuotientError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_get_sends_bearer_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/profile")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(r#"{"id":"user-1"}"#)
            .create();

        let client = client_for(&server);
        let profile: Value = client.get("/auth/profile").await.unwrap();

        mock.assert();
        assert_eq!(profile["id"], "user-1");
    }

    #[tokio::test]
    async fn test_post_strips_null_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/prompts")
            .match_body(mockito::Matcher::JsonString(r#"{"name":"greeting"}"#.to_string()))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create();

        let client = client_for(&server);
        let _: Value = client
            .post("/prompts", &json!({"name": "greeting", "system_prompt": null}))
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_error_status_is_mapped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/models").with_status(401).create();

        let client = client_for(&server);
        let result: Result<Value> = client.get("/models").await;

        mock.assert();
        assert!(matches!(result, Err(QuotientError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_delete_returns_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("DELETE", "/prompts/p1").with_status(204).create();

        let client = client_for(&server);
        let status = client.delete("/prompts/p1").await.unwrap();

        mock.assert();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let config = ClientConfig::with_api_key("k")
            .base_url("http://127.0.0.1:1")
            .token_path(None);
        let client = HttpClient::new(&config).unwrap();

        let result: Result<Value> = client.get("/models").await;
        assert!(result.unwrap_err().is_transport());
    }
}

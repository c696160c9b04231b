//! REST adapter for the remote document store
//!
//! | Operation | Request | Notes |
//! |-----------|---------|-------|
//! | get | `GET {base}/v1/{path}` | `404` → `None` |
//! | set | `PUT {base}/v1/{path}` | |
//! | compare_and_set | `PUT {base}/v1/{path}` + `If-Match: <version>` | `If-None-Match: *` for version 0, `412` → conflict |
//! | list | `GET {base}/v1/{collection}` | `{ "documents": [...] }` |
//!
//! Timeouts are enforced by the HTTP client; a timed out request is
//! reported as `Unavailable` and left for the caller's next trigger.

use super::{Document, DocumentStore, StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Document as returned by the REST API
#[derive(Debug, Deserialize)]
struct RemoteDocument {
    id: String,
    version: u64,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RemoteCollection {
    #[serde(default)]
    documents: Vec<RemoteDocument>,
}

#[derive(Debug, Deserialize)]
struct WriteResult {
    version: u64,
}

/// HTTP client for the remote document store
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStore {
    /// Create a new store client with the given request timeout
    pub fn new(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Rejected(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a bearer token obtained by the authentication layer
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        self.authorize(request).send().await.map_err(classify_transport_error)
    }
}

fn classify_transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Rejected(e.to_string())
    }
}

/// Map a non-success status to a store error
async fn status_error(path: &str, response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(path, status, &body)
}

fn classify_status(path: &str, status: StatusCode, body: &str) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(path.to_string()),
        StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
            StoreError::Conflict(path.to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Unauthenticated(format!("{status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            StoreError::Unavailable(format!("{status}: {body}"))
        }
        s if s.is_server_error() => StoreError::Unavailable(format!("{status}: {body}")),
        _ => StoreError::Rejected(format!("{status}: {body}")),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> StoreResult<T> {
    let bytes = response.bytes().await.map_err(classify_transport_error)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn into_document(path: &str, remote: RemoteDocument) -> Document {
    Document {
        id: remote.id,
        path: path.to_string(),
        version: remote.version,
        data: remote.data,
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Document>> {
        let response = self.send(self.client.get(self.url(path))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(path, response).await);
        }
        let remote: RemoteDocument = read_json(response).await?;
        Ok(Some(into_document(path, remote)))
    }

    async fn set(&self, path: &str, data: Value) -> StoreResult<u64> {
        let response = self
            .send(self.client.put(self.url(path)).json(&data))
            .await?;
        if !response.status().is_success() {
            return Err(status_error(path, response).await);
        }
        let result: WriteResult = read_json(response).await?;
        Ok(result.version)
    }

    async fn compare_and_set(
        &self,
        path: &str,
        expected_version: u64,
        data: Value,
    ) -> StoreResult<u64> {
        let request = self.client.put(self.url(path)).json(&data);
        let request = if expected_version == 0 {
            request.header("If-None-Match", "*")
        } else {
            request.header("If-Match", expected_version.to_string())
        };

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(status_error(path, response).await);
        }
        let result: WriteResult = read_json(response).await?;
        Ok(result.version)
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let response = self.send(self.client.get(self.url(collection))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(status_error(collection, response).await);
        }
        let remote: RemoteCollection = read_json(response).await?;
        let base = collection.trim_matches('/');
        let mut docs: Vec<Document> = remote
            .documents
            .into_iter()
            .map(|doc| {
                let path = format!("{base}/{}", doc.id);
                into_document(&path, doc)
            })
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let store = HttpStore::new("https://store.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.url("pharmacies/p1/inventory/i1"),
            "https://store.example.com/v1/pharmacies/p1/inventory/i1"
        );
        assert_eq!(
            store.url("/users/u1/orders/"),
            "https://store.example.com/v1/users/u1/orders"
        );
    }

    #[test]
    fn test_remote_document_parsing() {
        let raw = r#"{"documents":[{"id":"b","version":3,"data":{"stock":2}},{"id":"a","version":1}]}"#;
        let parsed: RemoteCollection = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.documents.len(), 2);
        assert_eq!(parsed.documents[0].version, 3);
        assert_eq!(parsed.documents[1].data, Value::Null);
    }

    #[test]
    fn test_status_classification() {
        let path = "users/u1/orders/o1";
        assert!(matches!(
            classify_status(path, StatusCode::UNAUTHORIZED, "token expired"),
            StoreError::Unauthenticated(_)
        ));
        assert!(matches!(
            classify_status(path, StatusCode::FORBIDDEN, ""),
            StoreError::Unauthenticated(_)
        ));
        assert!(matches!(
            classify_status(path, StatusCode::PRECONDITION_FAILED, ""),
            StoreError::Conflict(_)
        ));
        assert!(classify_status(path, StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(path, StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(matches!(
            classify_status(path, StatusCode::BAD_REQUEST, "bad field"),
            StoreError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments
        let store = HttpStore::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = store.get("pharmacies/p1").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}

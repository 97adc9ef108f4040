//! Transport abstraction
//!
//! The retrieval engine talks to TOS through `ObjectTransport`. The production
//! implementation is the signed reqwest client in `client`; tests drive the
//! engine with in-memory responses.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::header::CONTENT_LENGTH;
use http::HeaderMap;
use tos_core::{TosError, TosResult};

/// Response body as a stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// A GET against the service root, a bucket, or an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRequest {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub query: Vec<(String, String)>,
}

impl GetRequest {
    pub fn service() -> Self {
        Self::default()
    }

    pub fn bucket(bucket: &str, query: Vec<(String, String)>) -> Self {
        Self {
            bucket: Some(bucket.to_string()),
            key: None,
            query,
        }
    }

    pub fn object(bucket: &str, key: &str, query: Vec<(String, String)>) -> Self {
        Self {
            bucket: Some(bucket.to_string()),
            key: Some(key.to_string()),
            query,
        }
    }
}

/// Status, headers and the not-yet-consumed body of a response.
///
/// Dropping the value releases the underlying connection.
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl TransportResponse {
    /// Raw `content-length` header value, if present.
    pub fn content_length_header(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
    }

    /// Read the whole body. Only for small payloads (listings, error bodies).
    pub async fn bytes(mut self) -> TosResult<Vec<u8>> {
        let mut content = Vec::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk.map_err(|e| TosError::Transport(e.to_string()))?;
            content.extend_from_slice(&chunk);
        }
        Ok(content)
    }

    /// Read the whole body as text, replacing invalid UTF-8.
    pub async fn text(self) -> String {
        match self.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => format!("<unreadable response body: {}>", e),
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Signed HTTP transport to the storage service
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    async fn get(&self, request: &GetRequest) -> TosResult<TransportResponse>;
}

#[async_trait]
impl<T: ObjectTransport + ?Sized> ObjectTransport for std::sync::Arc<T> {
    async fn get(&self, request: &GetRequest) -> TosResult<TransportResponse> {
        (**self).get(request).await
    }
}

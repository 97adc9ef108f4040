//! Bucket and object listing.
//!
//! One-shot JSON calls: no streaming and no size gate. The configured bucket
//! allow-list is enforced here.

use serde_json::Value;
use tos_core::{TosError, TosResult};

use crate::traits::{GetRequest, ObjectTransport};

pub struct BucketResource<T> {
    transport: T,
    allowed: Vec<String>,
}

impl<T: ObjectTransport> BucketResource<T> {
    /// `allowed` empty means every bucket is visible.
    pub fn new(transport: T, allowed: Vec<String>) -> Self {
        Self { transport, allowed }
    }

    fn is_allowed(&self, bucket: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|b| b == bucket)
    }

    /// List buckets, restricted to the allow-list when one is configured.
    pub async fn list_buckets(&self) -> TosResult<Value> {
        let mut listing = self
            .get_json("list buckets", None, GetRequest::service())
            .await?;

        if !self.allowed.is_empty() {
            if let Some(Value::Array(buckets)) = listing.get_mut("Buckets") {
                buckets.retain(|b| {
                    b.get("Name")
                        .and_then(Value::as_str)
                        .map(|name| self.is_allowed(name))
                        .unwrap_or(false)
                });
            }
        }

        Ok(listing)
    }

    /// One page of a bucket listing (`list-type=2`).
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        start_after: Option<&str>,
        continuation_token: Option<&str>,
    ) -> TosResult<Value> {
        if !self.is_allowed(bucket) {
            return Err(TosError::BucketNotAllowed(bucket.to_string()));
        }

        let mut query = vec![("list-type".to_string(), "2".to_string())];
        for (name, value) in [
            ("prefix", prefix),
            ("start-after", start_after),
            ("continuation-token", continuation_token),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                query.push((name.to_string(), value.to_string()));
            }
        }

        self.get_json("list objects", Some(bucket), GetRequest::bucket(bucket, query))
            .await
    }

    async fn get_json(
        &self,
        operation: &'static str,
        bucket: Option<&str>,
        request: GetRequest,
    ) -> TosResult<Value> {
        let response = self.transport.get(&request).await?;
        let status = response.status;

        if !(200..300).contains(&status) {
            let body = response.text().await;
            tracing::warn!(bucket = ?bucket, status = status, operation, "TOS rejected request");
            return Err(TosError::Upstream {
                operation,
                bucket: bucket.map(String::from),
                key: None,
                status,
                body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| TosError::Transport(format!("{} returned invalid JSON: {}", operation, e)))
    }
}

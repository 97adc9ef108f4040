//! Signed HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use tos_core::{AddressingStyle, Settings, TosConfig, TosError, TosResult};

use crate::signer::{self, SigningRequest};
use crate::traits::{GetRequest, ObjectTransport, TransportResponse};

/// Build the HTTP client shared by every request.
///
/// The client holds no credentials; those live in the per-request
/// `TosConfig` passed to `TosClient::new`. The timeout bounds connecting and
/// each read, not the whole transfer, so a large body on a slow link is not
/// cut off while it is still making progress.
pub fn build_http_client(settings: &Settings) -> TosResult<Client> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|e| TosError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Where a request goes, plus the encoded pieces that get signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub url: String,
    pub host: String,
    pub path: String,
    pub query: String,
}

/// One request's view of TOS: a shared HTTP client plus that request's config.
#[derive(Clone, Debug)]
pub struct TosClient {
    http: Client,
    config: TosConfig,
}

impl TosClient {
    pub fn new(http: Client, config: TosConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &TosConfig {
        &self.config
    }

    /// Host header value for a request to `bucket`.
    fn host_for(&self, bucket: Option<&str>) -> String {
        let endpoint = self.config.settings().endpoint_host();
        match (self.config.settings().addressing_style, bucket) {
            (AddressingStyle::VirtualHosted, Some(bucket)) => format!("{}.{}", bucket, endpoint),
            _ => endpoint.to_string(),
        }
    }

    /// Encoded request path.
    fn path_for(&self, bucket: Option<&str>, key: Option<&str>) -> String {
        let key = key.map(signer::encode_path).unwrap_or_default();
        match (self.config.settings().addressing_style, bucket) {
            (AddressingStyle::Path, Some(bucket)) if key.is_empty() => {
                format!("/{}", signer::encode_path(bucket))
            }
            (AddressingStyle::Path, Some(bucket)) => {
                format!("/{}/{}", signer::encode_path(bucket), key)
            }
            _ => format!("/{}", key),
        }
    }

    pub fn target_for(&self, request: &GetRequest) -> RequestTarget {
        let host = self.host_for(request.bucket.as_deref());
        let path = self.path_for(request.bucket.as_deref(), request.key.as_deref());
        let query = signer::canonical_query(&request.query);
        let url = if query.is_empty() {
            format!("{}://{}{}", self.config.settings().scheme(), host, path)
        } else {
            format!("{}://{}{}?{}", self.config.settings().scheme(), host, path, query)
        };
        RequestTarget {
            url,
            host,
            path,
            query,
        }
    }
}

#[async_trait]
impl ObjectTransport for TosClient {
    async fn get(&self, request: &GetRequest) -> TosResult<TransportResponse> {
        let target = self.target_for(request);

        let signed = signer::sign(
            self.config.credential(),
            self.config.region(),
            &SigningRequest {
                method: "GET",
                host: &target.host,
                path: &target.path,
                query: &target.query,
            },
            chrono::Utc::now(),
        );

        let mut builder = self.http.get(&target.url);
        for (name, value) in &signed.headers {
            builder = builder.header(*name, value);
        }

        tracing::debug!(
            bucket = ?request.bucket,
            key = ?request.key,
            url = %target.url,
            "Sending signed TOS request"
        );

        let response = builder.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = ?request.bucket,
                key = ?request.key,
                "TOS request failed"
            );
            TosError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        Ok(TransportResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tos_core::{Credential, DeployMode, McpTransport};

    fn client(endpoint: &str, addressing_style: AddressingStyle) -> TosClient {
        let settings = Settings {
            deploy_mode: DeployMode::Hosted,
            region: "cn-beijing".to_string(),
            endpoint: endpoint.to_string(),
            max_object_size: 1024,
            buckets: vec![],
            addressing_style,
            request_timeout_secs: 5,
            static_credential: None,
            transport: McpTransport::Stdio,
            bind_address: "127.0.0.1:8000".to_string(),
        };
        let http = build_http_client(&settings).unwrap();
        let config = TosConfig::new(Arc::new(settings), Credential::new("ak", "sk", None));
        TosClient::new(http, config)
    }

    #[test]
    fn test_virtual_hosted_url() {
        let client = client("tos-cn-beijing.volces.com", AddressingStyle::VirtualHosted);
        let request = GetRequest::object(
            "media",
            "clips/a b.mp4",
            vec![("x-tos-process".to_string(), "video/info".to_string())],
        );

        let target = client.target_for(&request);
        assert_eq!(
            target.url,
            "https://media.tos-cn-beijing.volces.com/clips/a%20b.mp4?x-tos-process=video%2Finfo"
        );
        assert_eq!(target.host, "media.tos-cn-beijing.volces.com");
        assert_eq!(target.path, "/clips/a%20b.mp4");
        assert_eq!(target.query, "x-tos-process=video%2Finfo");
    }

    #[test]
    fn test_path_style_url() {
        let client = client("http://127.0.0.1:9000", AddressingStyle::Path);

        let target = client.target_for(&GetRequest::object("media", "a.json", vec![]));
        assert_eq!(target.url, "http://127.0.0.1:9000/media/a.json");
        assert_eq!(target.host, "127.0.0.1:9000");

        let target = client.target_for(&GetRequest::bucket(
            "media",
            vec![("list-type".to_string(), "2".to_string())],
        ));
        assert_eq!(target.url, "http://127.0.0.1:9000/media?list-type=2");
    }

    #[test]
    fn test_service_root_url() {
        let client = client("tos-cn-beijing.volces.com", AddressingStyle::VirtualHosted);
        let target = client.target_for(&GetRequest::service());
        assert_eq!(target.url, "https://tos-cn-beijing.volces.com/");
        assert_eq!(target.host, "tos-cn-beijing.volces.com");
        assert_eq!(target.path, "/");
    }

    #[test]
    fn test_virtual_hosted_bucket_listing_url() {
        let client = client("tos-cn-beijing.volces.com", AddressingStyle::VirtualHosted);
        let target = client.target_for(&GetRequest::bucket("media", vec![]));
        assert_eq!(target.url, "https://media.tos-cn-beijing.volces.com/");
    }
}

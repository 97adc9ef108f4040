//! Object retrieval engine
//!
//! One signed GET per call. The declared `content-length` is checked against
//! the size limit before any body byte is read; the body is then read in
//! fixed-size chunks, in order, into a buffer owned by the call, and encoded
//! as text or base64 depending on the key and the directive.
//!
//! The response is owned by the call and dropped on every return path, which
//! releases the connection whether the call succeeds, hits the size gate, or
//! fails to decode.

use base64::Engine;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tos_core::{TosError, TosResult};

use crate::directive::{ProcessDirective, VideoSnapshotParams};
use crate::text::is_text_file;
use crate::traits::{GetRequest, ObjectTransport, TransportResponse};

/// Read buffer size for response bodies.
pub const CHUNK_SIZE: usize = 69 * 1024;

/// Upper bound on the up-front buffer reservation. The declared length is
/// only a hint; the buffer grows past this as chunks arrive.
const MAX_PREALLOCATION: u64 = CHUNK_SIZE as u64 * 16;

pub struct ObjectRetrieval<T> {
    transport: T,
    max_object_size: u64,
}

impl<T: ObjectTransport> ObjectRetrieval<T> {
    pub fn new(transport: T, max_object_size: u64) -> Self {
        Self {
            transport,
            max_object_size,
        }
    }

    /// Fetch an object: UTF-8 text for text keys, base64 otherwise.
    pub async fn get_object(&self, bucket: &str, key: &str) -> TosResult<String> {
        let content = self.fetch(bucket, key, &ProcessDirective::None).await?;

        if is_text_file(key) {
            decode_text(bucket, key, content)
        } else {
            Ok(encode_binary(&content))
        }
    }

    /// Video metadata as the JSON text the service returns.
    pub async fn video_info(&self, bucket: &str, key: &str) -> TosResult<String> {
        let content = self.fetch(bucket, key, &ProcessDirective::VideoInfo).await?;
        decode_text(bucket, key, content)
    }

    /// Snapshot a video frame.
    ///
    /// With a save-as object the service stores the image and answers with a
    /// JSON description, returned as text. Otherwise the image bytes are
    /// returned base64-encoded.
    pub async fn video_snapshot(
        &self,
        bucket: &str,
        key: &str,
        params: VideoSnapshotParams,
    ) -> TosResult<String> {
        let saves_object = params.saves_object();
        let directive = ProcessDirective::VideoSnapshot(params);
        let content = self.fetch(bucket, key, &directive).await?;

        if saves_object {
            decode_text(bucket, key, content)
        } else {
            Ok(encode_binary(&content))
        }
    }

    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        directive: &ProcessDirective,
    ) -> TosResult<Vec<u8>> {
        let start = std::time::Instant::now();
        let request = GetRequest::object(bucket, key, directive.query());

        let response = self.transport.get(&request).await?;

        if response.status != 200 && response.status != 206 {
            let status = response.status;
            let body = response.text().await;
            tracing::warn!(
                bucket = %bucket,
                key = %key,
                status = status,
                operation = directive.operation(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "TOS rejected request"
            );
            return Err(TosError::Upstream {
                operation: directive.operation(),
                bucket: Some(bucket.to_string()),
                key: Some(key.to_string()),
                status,
                body,
            });
        }

        let size = declared_size(&response)?;
        if size > self.max_object_size {
            drop(response);
            tracing::warn!(
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                limit_bytes = self.max_object_size,
                "TOS object exceeds size limit"
            );
            return Err(TosError::TooLarge {
                bucket: bucket.to_string(),
                key: key.to_string(),
                limit: self.max_object_size,
                size,
            });
        }

        let mut reader = StreamReader::new(response.body);
        let mut content = Vec::with_capacity(size.min(MAX_PREALLOCATION) as usize);
        let mut chunk = vec![0u8; CHUNK_SIZE];

        loop {
            let bytes_read = reader.read(&mut chunk).await.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    bytes_read = content.len(),
                    "TOS body read failed"
                );
                TosError::Transport(format!(
                    "Failed to read bucket: {} object: {}: {}",
                    bucket, key, e
                ))
            })?;

            if bytes_read == 0 {
                break;
            }

            content.extend_from_slice(&chunk[..bytes_read]);
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            operation = directive.operation(),
            size_bytes = content.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "TOS get successful"
        );

        Ok(content)
    }
}

/// Declared body size. A missing header counts as 0 and passes the gate.
fn declared_size(response: &TransportResponse) -> TosResult<u64> {
    match response.content_length_header() {
        None => Ok(0),
        Some(value) => value.trim().parse::<u64>().map_err(|_| {
            TosError::Transport(format!("invalid content-length header: {}", value))
        }),
    }
}

fn decode_text(bucket: &str, key: &str, content: Vec<u8>) -> TosResult<String> {
    String::from_utf8(content).map_err(|source| TosError::Decode {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source,
    })
}

fn encode_binary(content: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{OutputFormat, PROCESS_PARAM, SAVE_OBJECT_PARAM};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use futures::StreamExt;
    use http::header::CONTENT_LENGTH;
    use http::{HeaderMap, HeaderValue};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Sets its flag when dropped, i.e. when the response body is released.
    struct ReleaseFlag(Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct FakeTransport {
        status: u16,
        content_length: Option<String>,
        chunks: Vec<Vec<u8>>,
        chunks_polled: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
        requests: Mutex<Vec<GetRequest>>,
    }

    impl FakeTransport {
        fn new(status: u16, content_length: Option<&str>, chunks: Vec<Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                status,
                content_length: content_length.map(String::from),
                chunks,
                chunks_polled: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicBool::new(false)),
                requests: Mutex::new(Vec::new()),
            })
        }

        /// Body with an accurate content-length.
        fn ok(body: &[u8]) -> Arc<Self> {
            Self::new(200, Some(&body.len().to_string()), vec![body.to_vec()])
        }

        fn last_request(&self) -> GetRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        fn query_value(&self, name: &str) -> Option<String> {
            self.last_request()
                .query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[async_trait]
    impl ObjectTransport for FakeTransport {
        async fn get(&self, request: &GetRequest) -> TosResult<TransportResponse> {
            self.requests.lock().unwrap().push(request.clone());

            let mut headers = HeaderMap::new();
            if let Some(len) = &self.content_length {
                headers.insert(CONTENT_LENGTH, HeaderValue::from_str(len).unwrap());
            }

            let polled = self.chunks_polled.clone();
            let flag = ReleaseFlag(self.released.clone());
            let body = stream::iter(self.chunks.clone()).map(move |chunk| {
                let _held = &flag;
                polled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(Bytes::from(chunk))
            });

            Ok(TransportResponse {
                status: self.status,
                headers,
                body: Box::pin(body),
            })
        }
    }

    #[tokio::test]
    async fn test_text_object_returned_verbatim() {
        let transport = FakeTransport::new(200, Some("500"), vec![br#"{"x":1}"#.to_vec()]);
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        let result = engine.get_object("media", "a.json").await.unwrap();

        assert_eq!(result, r#"{"x":1}"#);
        assert!(transport.last_request().query.is_empty());
        assert!(transport.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_binary_object_is_base64_of_exact_bytes() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let transport = FakeTransport::ok(&bytes);
        let engine = ObjectRetrieval::new(transport, 4096);

        let result = engine.get_object("media", "photo.JPG").await.unwrap();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(result)
            .unwrap();
        assert_eq!(decoded, bytes);
    }

    #[tokio::test]
    async fn test_chunks_concatenated_in_order() {
        let chunks = vec![
            vec![b'a'; CHUNK_SIZE + 17],
            b"middle".to_vec(),
            vec![b'z'; 3],
        ];
        let expected: Vec<u8> = chunks.concat();
        let transport = FakeTransport::new(200, None, chunks);
        let engine = ObjectRetrieval::new(transport, 0);

        let result = engine.get_object("media", "big.log").await.unwrap();

        assert_eq!(result.as_bytes(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_oversized_object_rejected_before_body_read() {
        let transport = FakeTransport::new(200, Some("5000"), vec![vec![0u8; 5000]]);
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        let err = engine.get_object("media", "a.json").await.unwrap_err();

        match err {
            TosError::TooLarge {
                bucket,
                key,
                limit,
                size,
            } => {
                assert_eq!(bucket, "media");
                assert_eq!(key, "a.json");
                assert_eq!(limit, 1000);
                assert_eq!(size, 5000);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
        assert_eq!(transport.chunks_polled.load(Ordering::SeqCst), 0);
        assert!(transport.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_size_gate_applies_to_every_directive() {
        let transport = FakeTransport::new(200, Some("1001"), vec![vec![0u8; 1001]]);
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        assert!(matches!(
            engine.video_info("media", "clip.mp4").await,
            Err(TosError::TooLarge { .. })
        ));
        assert!(matches!(
            engine
                .video_snapshot("media", "clip.mp4", VideoSnapshotParams::default())
                .await,
            Err(TosError::TooLarge { .. })
        ));
        assert_eq!(transport.chunks_polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_size_equal_to_limit_is_accepted() {
        let transport = FakeTransport::ok(&[b'x'; 1000]);
        let engine = ObjectRetrieval::new(transport, 1000);
        assert_eq!(engine.get_object("media", "a.txt").await.unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_missing_content_length_bypasses_gate() {
        let transport = FakeTransport::new(200, None, vec![vec![b'x'; 2000]]);
        let engine = ObjectRetrieval::new(transport, 1000);

        let result = engine.get_object("media", "notes.txt").await.unwrap();
        assert_eq!(result.len(), 2000);
    }

    #[tokio::test]
    async fn test_huge_declared_length_does_not_reserve_it() {
        let transport = FakeTransport::new(200, Some("18446744073709551615"), vec![b"x".to_vec()]);
        let engine = ObjectRetrieval::new(transport, u64::MAX);

        let result = engine.get_object("media", "a.txt").await.unwrap();
        assert_eq!(result, "x");
    }

    #[tokio::test]
    async fn test_partial_content_is_success() {
        let transport = FakeTransport::new(206, Some("5"), vec![b"hello".to_vec()]);
        let engine = ObjectRetrieval::new(transport, 1000);
        assert_eq!(engine.get_object("media", "a.txt").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_upstream_error_carries_body() {
        let transport = FakeTransport::new(
            404,
            Some("21"),
            vec![br#"{"error":"NoSuchKey"}"#.to_vec()],
        );
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        let err = engine.get_object("media", "missing.json").await.unwrap_err();

        match &err {
            TosError::Upstream {
                operation,
                status,
                body,
                ..
            } => {
                assert_eq!(*operation, "get object");
                assert_eq!(*status, 404);
                assert_eq!(body, r#"{"error":"NoSuchKey"}"#);
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
        assert!(err.to_string().contains(r#"{"error":"NoSuchKey"}"#));
        assert!(transport.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_other_success_statuses_are_failures() {
        let transport = FakeTransport::new(204, Some("0"), vec![]);
        let engine = ObjectRetrieval::new(transport, 1000);
        assert!(matches!(
            engine.get_object("media", "a.txt").await,
            Err(TosError::Upstream { status: 204, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_is_decode_error() {
        let transport = FakeTransport::ok(&[0xff, 0xfe, 0xfd]);
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        let err = engine.get_object("media", "broken.txt").await.unwrap_err();

        assert!(matches!(err, TosError::Decode { .. }));
        assert!(transport.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_invalid_content_length_header() {
        let transport = FakeTransport::new(200, Some("lots"), vec![b"x".to_vec()]);
        let engine = ObjectRetrieval::new(transport, 1000);
        assert!(matches!(
            engine.get_object("media", "a.txt").await,
            Err(TosError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_video_info_always_text() {
        let body = br#"{"format":{"duration":"12.5"}}"#;
        let transport = FakeTransport::ok(body);
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        let result = engine.video_info("media", "clip.mp4").await.unwrap();

        assert_eq!(result.as_bytes(), body);
        assert_eq!(
            transport.query_value(PROCESS_PARAM).as_deref(),
            Some("video/info")
        );
    }

    #[tokio::test]
    async fn test_video_snapshot_inline_image_is_base64() {
        let image = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a];
        let transport = FakeTransport::ok(&image);
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        let params = VideoSnapshotParams {
            time_ms: Some(2000),
            output_format: Some(OutputFormat::Png),
            ..Default::default()
        };
        let result = engine
            .video_snapshot("media", "clip.mp4", params)
            .await
            .unwrap();

        assert_eq!(
            base64::engine::general_purpose::STANDARD
                .decode(result)
                .unwrap(),
            image
        );
        assert_eq!(
            transport.query_value(PROCESS_PARAM).as_deref(),
            Some("video/snapshot,t_2000,f_png")
        );
        assert_eq!(transport.query_value(SAVE_OBJECT_PARAM), None);
    }

    #[tokio::test]
    async fn test_video_snapshot_saveas_returns_json_text() {
        let body = br#"{"bucket":"media","object":"foo.jpg"}"#;
        let transport = FakeTransport::ok(body);
        let engine = ObjectRetrieval::new(transport.clone(), 1000);

        let params = VideoSnapshotParams {
            saveas_object: Some("foo.jpg".to_string()),
            ..Default::default()
        };
        let result = engine
            .video_snapshot("media", "clip.mp4", params)
            .await
            .unwrap();

        assert_eq!(result.as_bytes(), body);
        assert_eq!(
            transport.query_value(SAVE_OBJECT_PARAM).as_deref(),
            Some("Zm9vLmpwZw==")
        );
    }

    #[tokio::test]
    async fn test_snapshot_upstream_error_names_operation() {
        let transport = FakeTransport::new(400, None, vec![br#"{"Code":"InvalidArgument"}"#.to_vec()]);
        let engine = ObjectRetrieval::new(transport, 1000);

        let err = engine
            .video_snapshot("media", "clip.mp4", VideoSnapshotParams::default())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("get video snapshot failed"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        struct Unreachable;

        #[async_trait]
        impl ObjectTransport for Unreachable {
            async fn get(&self, _request: &GetRequest) -> TosResult<TransportResponse> {
                Err(TosError::Transport("connection refused".to_string()))
            }
        }

        let engine = ObjectRetrieval::new(Unreachable, 1000);
        assert!(matches!(
            engine.get_object("media", "a.txt").await,
            Err(TosError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_body_stream_error_surfaces_as_transport_error() {
        struct Broken;

        #[async_trait]
        impl ObjectTransport for Broken {
            async fn get(&self, _request: &GetRequest) -> TosResult<TransportResponse> {
                let body = stream::iter(vec![
                    Ok(Bytes::from_static(b"partial")),
                    Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
                ]);
                Ok(TransportResponse {
                    status: 200,
                    headers: HeaderMap::new(),
                    body: Box::pin(body),
                })
            }
        }

        let engine = ObjectRetrieval::new(Broken, 1000);
        let err = engine.get_object("media", "a.txt").await.unwrap_err();
        assert!(matches!(err, TosError::Transport(_)));
    }
}

//! TOS Storage Library
//!
//! Signed access to the Volcengine TOS HTTP API: the object retrieval engine
//! (size-gated, chunked GETs with text/base64 encoding), the video processing
//! directives, bucket listing, and the reqwest transport they run on.

pub mod bucket;
pub mod client;
pub mod directive;
pub mod object;
pub mod signer;
pub mod text;
pub mod traits;

// Re-export commonly used types
pub use bucket::BucketResource;
pub use client::{build_http_client, TosClient};
pub use directive::{AutoRotate, OutputFormat, ProcessDirective, SnapshotMode, VideoSnapshotParams};
pub use object::ObjectRetrieval;
pub use text::is_text_file;
pub use traits::{GetRequest, ObjectTransport, TransportResponse};
pub use tos_core::{TosError, TosResult};

//! Error types module
//!
//! Every failure a tool call can hit is a `TosError`. The first four variants
//! map to the retrieval taxonomy (size gate, upstream rejection, text decode,
//! credential); the rest cover configuration and transport problems.

use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum TosError {
    #[error("Bucket: {bucket} object: {key} is too large, more than {limit} bytes (content-length: {size})")]
    TooLarge {
        bucket: String,
        key: String,
        limit: u64,
        size: u64,
    },

    #[error("{operation} failed{}, tos server return ({status}): {body}", target(.bucket, .key))]
    Upstream {
        operation: &'static str,
        bucket: Option<String>,
        key: Option<String>,
        status: u16,
        body: String,
    },

    #[error("Bucket: {bucket} object: {key} is not valid UTF-8 text: {source}")]
    Decode {
        bucket: String,
        key: String,
        #[source]
        source: FromUtf8Error,
    },

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Bucket not allowed: {0}")]
    BucketNotAllowed(String),
}

fn target(bucket: &Option<String>, key: &Option<String>) -> String {
    match (bucket, key) {
        (Some(bucket), Some(key)) => format!(" for bucket: {} object: {}", bucket, key),
        (Some(bucket), None) => format!(" for bucket: {}", bucket),
        _ => String::new(),
    }
}

/// Result type for TOS operations
pub type TosResult<T> = Result<T, TosError>;

//! Access credentials used to sign TOS requests.
//!
//! In hosted mode the credential arrives per request as a base64-encoded STS
//! JSON blob:
//!
//! ```json
//! {"CurrentTime": "...", "ExpiredTime": "...", "AccessKeyId": "...",
//!  "SecretAccessKey": "...", "SessionToken": "..."}
//! ```

use std::fmt;

use base64::Engine;
use serde::Deserialize;

use crate::error::{TosError, TosResult};

/// Time-boxed access credential. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_key: String,
    pub secret_key: String,
    pub security_token: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StsPayload {
    #[serde(rename = "CurrentTime")]
    #[allow(dead_code)]
    current_time: Option<String>,
    #[serde(rename = "ExpiredTime")]
    expired_time: Option<String>,
    #[serde(rename = "AccessKeyId")]
    access_key_id: Option<String>,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: Option<String>,
    #[serde(rename = "SessionToken")]
    session_token: Option<String>,
}

impl Credential {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        security_token: Option<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            security_token,
            expires_at: None,
        }
    }

    /// Decode an `authorization` value carrying the STS blob.
    ///
    /// A scheme prefix such as `Bearer ` is stripped (everything up to the
    /// first space). Access key, secret and session token are all required.
    pub fn from_authorization(value: &str) -> TosResult<Self> {
        let encoded = match value.split_once(' ') {
            Some((_, rest)) => rest,
            None => value,
        }
        .trim();

        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| TosError::Credential(format!("authorization is not base64: {}", e)))?;
        let json = String::from_utf8(raw)
            .map_err(|e| TosError::Credential(format!("authorization is not UTF-8: {}", e)))?;
        let payload: StsPayload = serde_json::from_str(&json)
            .map_err(|e| TosError::Credential(format!("authorization is not STS JSON: {}", e)))?;

        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        match (
            non_empty(payload.access_key_id),
            non_empty(payload.secret_access_key),
            non_empty(payload.session_token),
        ) {
            (Some(access_key), Some(secret_key), Some(token)) => Ok(Self {
                access_key,
                secret_key,
                security_token: Some(token),
                expires_at: payload.expired_time,
            }),
            _ => Err(TosError::Credential(
                "Invalid credentials ak, sk, session_token is null".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

//! TOS v4 request signing (`TOS4-HMAC-SHA256`).
//!
//! Canonical request, string to sign and key derivation follow the usual v4
//! scheme, with the `tos` service name and no prefix on the secret key.
//! Signing is a pure function of its inputs so the clock is passed in.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use tos_core::Credential;

pub const ALGORITHM: &str = "TOS4-HMAC-SHA256";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

pub const HEADER_DATE: &str = "x-tos-date";
pub const HEADER_CONTENT_SHA256: &str = "x-tos-content-sha256";
pub const HEADER_SECURITY_TOKEN: &str = "x-tos-security-token";

/// Everything outside the RFC 3986 unreserved set.
const URI_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const PATH_ENCODE: &AsciiSet = &URI_ENCODE.remove(b'/');

/// Percent-encode a query key or value.
pub fn encode_query_component(s: &str) -> String {
    utf8_percent_encode(s, URI_ENCODE).to_string()
}

/// Percent-encode an object key for the request path, keeping `/`.
pub fn encode_path(s: &str) -> String {
    utf8_percent_encode(s, PATH_ENCODE).to_string()
}

/// Sorted, encoded query string. Used both for signing and on the wire so the
/// two can never disagree.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (encode_query_component(k), encode_query_component(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// The parts of a request that go into the signature.
#[derive(Debug)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// Host header value, including a non-default port.
    pub host: &'a str,
    /// Already-encoded request path.
    pub path: &'a str,
    /// Already-canonical query string.
    pub query: &'a str,
}

/// Headers to attach to a signed request (host is set by the HTTP client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub headers: Vec<(&'static str, String)>,
}

impl SignedHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

pub fn sign(
    credential: &Credential,
    region: &str,
    request: &SigningRequest<'_>,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let date_time = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = &date_time[..8];

    let mut canonical_headers: Vec<(&'static str, String)> = vec![
        ("host", request.host.to_string()),
        (HEADER_CONTENT_SHA256, UNSIGNED_PAYLOAD.to_string()),
        (HEADER_DATE, date_time.clone()),
    ];
    if let Some(token) = &credential.security_token {
        canonical_headers.push((HEADER_SECURITY_TOKEN, token.clone()));
    }
    canonical_headers.sort_by(|a, b| a.0.cmp(b.0));

    let header_block: String = canonical_headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_header_names = canonical_headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.path,
        request.query,
        header_block,
        signed_header_names,
        UNSIGNED_PAYLOAD
    );

    let scope = format!("{}/{}/tos/request", date, region);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        date_time,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credential.secret_key, date, region);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credential.access_key, scope, signed_header_names, signature
    );

    let mut headers = vec![
        (HEADER_DATE, date_time),
        (HEADER_CONTENT_SHA256, UNSIGNED_PAYLOAD.to_string()),
    ];
    if let Some(token) = &credential.security_token {
        headers.push((HEADER_SECURITY_TOKEN, token.clone()));
    }
    headers.push(("authorization", authorization));

    SignedHeaders { headers }
}

fn signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"tos");
    hmac_sha256(&k_service, b"request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_encoding() {
        assert_eq!(encode_path("videos/a b.mp4"), "videos/a%20b.mp4");
        assert_eq!(encode_query_component("video/info"), "video%2Finfo");
        assert_eq!(encode_query_component("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(encode_path("中文.txt"), "%E4%B8%AD%E6%96%87.txt");
    }

    #[test]
    fn test_canonical_query_is_sorted() {
        let query = vec![
            ("x-tos-save-object".to_string(), "Zm9vLmpwZw==".to_string()),
            ("x-tos-process".to_string(), "video/snapshot,t_10".to_string()),
        ];
        assert_eq!(
            canonical_query(&query),
            "x-tos-process=video%2Fsnapshot%2Ct_10&x-tos-save-object=Zm9vLmpwZw%3D%3D"
        );
        assert_eq!(canonical_query(&[]), "");
    }

    #[test]
    fn test_known_signature() {
        let credential = Credential::new("AKLTtest", "secret", None);
        let query = canonical_query(&[("x-tos-process".to_string(), "video/info".to_string())]);
        let path = format!("/{}", encode_path("videos/a b.mp4"));
        let request = SigningRequest {
            method: "GET",
            host: "media.tos-cn-beijing.volces.com",
            path: &path,
            query: &query,
        };

        let signed = sign(&credential, "cn-beijing", &request, fixed_now());

        assert_eq!(signed.get(HEADER_DATE), Some("20240501T083000Z"));
        assert_eq!(signed.get(HEADER_CONTENT_SHA256), Some(UNSIGNED_PAYLOAD));
        assert_eq!(signed.get(HEADER_SECURITY_TOKEN), None);
        assert_eq!(
            signed.get("authorization"),
            Some(
                "TOS4-HMAC-SHA256 Credential=AKLTtest/20240501/cn-beijing/tos/request, \
                 SignedHeaders=host;x-tos-content-sha256;x-tos-date, \
                 Signature=d2652b3e3dd393558259d28e2ba49a89d83f56db869169a3f9ca767a8a3a7891"
            )
        );
    }

    #[test]
    fn test_security_token_is_signed() {
        let credential = Credential::new("ak", "sk", Some("session".to_string()));
        let request = SigningRequest {
            method: "GET",
            host: "tos-cn-beijing.volces.com",
            path: "/",
            query: "",
        };

        let signed = sign(&credential, "cn-beijing", &request, fixed_now());

        assert_eq!(signed.get(HEADER_SECURITY_TOKEN), Some("session"));
        let authorization = signed.get("authorization").unwrap();
        assert!(authorization
            .contains("SignedHeaders=host;x-tos-content-sha256;x-tos-date;x-tos-security-token"));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let request = SigningRequest {
            method: "GET",
            host: "tos-cn-beijing.volces.com",
            path: "/",
            query: "",
        };
        let a = sign(&Credential::new("ak", "one", None), "cn-beijing", &request, fixed_now());
        let b = sign(&Credential::new("ak", "two", None), "cn-beijing", &request, fixed_now());
        assert_ne!(a.get("authorization"), b.get("authorization"));
    }
}

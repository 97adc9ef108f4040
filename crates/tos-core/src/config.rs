//! Configuration module
//!
//! `Settings` holds the static deployment settings read once at startup.
//! `TosConfig` is the per-request value built from those settings plus the
//! credential resolved for that request. It is rebuilt for every call and
//! never mutated, so concurrent requests cannot observe each other's keys.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;

use crate::credential::Credential;
use crate::error::{TosError, TosResult};

const MAX_OBJECT_SIZE: u64 = 100 * 1024 * 1024;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const SERVER_HOST: &str = "127.0.0.1";
const SERVER_PORT: u16 = 8000;

/// Where the server runs, which decides where credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Static keys from the environment.
    Local,
    /// Per-request STS credential from the `authorization` channel.
    Hosted,
}

impl FromStr for DeployMode {
    type Err = TosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(DeployMode::Local),
            "hosted" | "remote" | "cloud" => Ok(DeployMode::Hosted),
            _ => Err(TosError::Config(format!("Invalid deploy mode: {}", s))),
        }
    }
}

impl Display for DeployMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DeployMode::Local => write!(f, "local"),
            DeployMode::Hosted => write!(f, "hosted"),
        }
    }
}

/// How bucket names are placed in request URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingStyle {
    /// `https://{bucket}.{endpoint}/{key}`
    VirtualHosted,
    /// `https://{endpoint}/{bucket}/{key}`, used for local gateways and tests.
    Path,
}

impl FromStr for AddressingStyle {
    type Err = TosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "virtual" | "virtual-hosted" | "virtual_hosted" => Ok(AddressingStyle::VirtualHosted),
            "path" => Ok(AddressingStyle::Path),
            _ => Err(TosError::Config(format!("Invalid addressing style: {}", s))),
        }
    }
}

/// How the MCP server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    Stdio,
    /// Streamable HTTP; hosted credentials may arrive per request in the
    /// `authorization` header.
    StreamableHttp,
}

impl FromStr for McpTransport {
    type Err = TosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdio" => Ok(McpTransport::Stdio),
            "streamable-http" | "streamable_http" | "http" => Ok(McpTransport::StreamableHttp),
            _ => Err(TosError::Config(format!("Invalid MCP transport: {}", s))),
        }
    }
}

impl Display for McpTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            McpTransport::Stdio => write!(f, "stdio"),
            McpTransport::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

/// Static deployment settings
#[derive(Clone, Debug)]
pub struct Settings {
    pub deploy_mode: DeployMode,
    pub region: String,
    /// Endpoint host, optionally with an explicit `http://` or `https://` scheme.
    pub endpoint: String,
    pub max_object_size: u64,
    /// Bucket allow-list. Empty means every bucket is reachable.
    pub buckets: Vec<String>,
    pub addressing_style: AddressingStyle,
    /// Connect and per-read timeout for TOS requests.
    pub request_timeout_secs: u64,
    /// Static credential for local mode.
    pub static_credential: Option<Credential>,
    pub transport: McpTransport,
    /// `host:port` for the streamable HTTP listener.
    pub bind_address: String,
}

impl Settings {
    pub fn from_env() -> TosResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build settings from any variable lookup (the process environment in
    /// production, a map in tests).
    pub fn from_vars<F>(var: F) -> TosResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let deploy_mode = var("TOS_DEPLOY_MODE")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(DeployMode::Local);

        let region = var("TOS_REGION")
            .ok_or_else(|| TosError::Config("TOS_REGION must be set".to_string()))?;

        let endpoint = var("TOS_ENDPOINT").unwrap_or_else(|| format!("tos-{}.volces.com", region));

        let max_object_size = match var("TOS_MAX_OBJECT_SIZE") {
            Some(s) => s.parse::<u64>().map_err(|_| {
                TosError::Config("TOS_MAX_OBJECT_SIZE must be a byte count".to_string())
            })?,
            None => MAX_OBJECT_SIZE,
        };

        let buckets = var("TOS_BUCKETS")
            .map(|s| {
                s.split(',')
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let addressing_style = var("TOS_ADDRESSING_STYLE")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(AddressingStyle::VirtualHosted);

        let request_timeout_secs = match var("TOS_REQUEST_TIMEOUT_SECS") {
            Some(s) => s.parse::<u64>().map_err(|_| {
                TosError::Config("TOS_REQUEST_TIMEOUT_SECS must be a number of seconds".to_string())
            })?,
            None => REQUEST_TIMEOUT_SECS,
        };

        let static_credential = match (var("TOS_ACCESS_KEY"), var("TOS_SECRET_KEY")) {
            (Some(ak), Some(sk)) => Some(Credential::new(ak, sk, var("TOS_SECURITY_TOKEN"))),
            _ => None,
        };

        let transport = var("MCP_TRANSPORT")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(McpTransport::Stdio);

        let port = match var("PORT") {
            Some(s) => s
                .parse::<u16>()
                .map_err(|_| TosError::Config("PORT must be a TCP port number".to_string()))?,
            None => SERVER_PORT,
        };
        let host = var("MCP_SERVER_HOST").unwrap_or_else(|| SERVER_HOST.to_string());

        let settings = Settings {
            deploy_mode,
            region,
            endpoint,
            max_object_size,
            buckets,
            addressing_style,
            request_timeout_secs,
            static_credential,
            transport,
            bind_address: format!("{}:{}", host, port),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> TosResult<()> {
        if self.region.is_empty() {
            return Err(TosError::Config("TOS_REGION must be set".to_string()));
        }

        if self.endpoint_host().is_empty() {
            return Err(TosError::Config("TOS_ENDPOINT must name a host".to_string()));
        }

        if self.deploy_mode == DeployMode::Local && self.static_credential.is_none() {
            return Err(TosError::Config(
                "TOS_ACCESS_KEY and TOS_SECRET_KEY must be set in local deploy mode".to_string(),
            ));
        }

        Ok(())
    }

    /// URL scheme of the endpoint, `https` unless the endpoint says otherwise.
    pub fn scheme(&self) -> &str {
        match self.endpoint.split_once("://") {
            Some((scheme, _)) => scheme,
            None => "https",
        }
    }

    /// Endpoint host (and port) without scheme or trailing slash.
    pub fn endpoint_host(&self) -> &str {
        let host = match self.endpoint.split_once("://") {
            Some((_, rest)) => rest,
            None => self.endpoint.as_str(),
        };
        host.trim_end_matches('/')
    }

    pub fn is_bucket_allowed(&self, bucket: &str) -> bool {
        self.buckets.is_empty() || self.buckets.iter().any(|b| b == bucket)
    }
}

/// Per-request configuration: static settings plus the request's credential.
#[derive(Clone, Debug)]
pub struct TosConfig {
    settings: Arc<Settings>,
    credential: Credential,
}

impl TosConfig {
    pub fn new(settings: Arc<Settings>, credential: Credential) -> Self {
        Self {
            settings,
            credential,
        }
    }

    /// Config for local mode, signed with the static credential.
    pub fn local(settings: Arc<Settings>) -> TosResult<Self> {
        let credential = settings.static_credential.clone().ok_or_else(|| {
            TosError::Credential("no static credential configured for local mode".to_string())
        })?;
        Ok(Self::new(settings, credential))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn region(&self) -> &str {
        &self.settings.region
    }
}

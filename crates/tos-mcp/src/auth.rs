//! Per-call credential resolution.
//!
//! Local mode signs with the static keys from settings. Hosted mode decodes
//! an STS blob on every call: from the `authorization` header of the inbound
//! HTTP request when the server runs over streamable HTTP, otherwise from the
//! `authorization` environment variable (the stdio case, where the value is
//! whatever the launching process provided).

use std::env;
use std::sync::Arc;

use http::request::Parts;
use tos_core::{Credential, DeployMode, Settings, TosConfig, TosError, TosResult};

pub const AUTHORIZATION_VAR: &str = "authorization";

#[derive(Clone, Debug)]
pub struct CredentialResolver {
    settings: Arc<Settings>,
}

impl CredentialResolver {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Build the configuration for one tool call. `parts` are the inbound
    /// HTTP request's head, absent over stdio.
    pub fn config(&self, parts: Option<&Parts>) -> TosResult<TosConfig> {
        self.config_from(authorization(parts, || env::var(AUTHORIZATION_VAR).ok()))
    }

    pub fn config_from(&self, authorization: Option<String>) -> TosResult<TosConfig> {
        match self.settings.deploy_mode {
            DeployMode::Local => TosConfig::local(self.settings.clone()),
            DeployMode::Hosted => {
                let authorization = authorization
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| TosError::Credential("Missing authorization info.".to_string()))?;

                let credential = Credential::from_authorization(&authorization).map_err(|e| {
                    tracing::error!(error = %e, "Error get credentials");
                    e
                })?;

                tracing::debug!(
                    access_key = %credential.access_key,
                    expires_at = ?credential.expires_at,
                    "Resolved request credential"
                );

                Ok(TosConfig::new(self.settings.clone(), credential))
            }
        }
    }
}

/// The request's `authorization` header, falling back to `fallback` when the
/// header is missing or blank.
fn authorization<F>(parts: Option<&Parts>, fallback: F) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    parts
        .and_then(|p| p.headers.get(http::header::AUTHORIZATION))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(String::from)
        .or_else(fallback)
}

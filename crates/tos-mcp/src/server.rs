//! MCP server using rmcp SDK
//!
//! Exposes TOS bucket listing, object retrieval, and video processing as MCP
//! tools over stdio or streamable HTTP. Every call resolves its own
//! credential and builds its own `TosConfig`; nothing about one call is
//! visible to another.

use crate::auth::CredentialResolver;
use crate::tools::*;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use http::request::Parts;
use rmcp::model::*;
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, RoleServer, ServerHandler};
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use tos_core::{Settings, TosError};
use tos_storage::{build_http_client, BucketResource, ObjectRetrieval, TosClient};

fn text_content(s: impl Into<String>) -> Content {
    Content {
        raw: RawContent::Text(RawTextContent { text: s.into() }),
        annotations: None,
    }
}

/// Map a TOS failure to an MCP error, keeping the message verbatim.
fn tool_error(e: TosError) -> ErrorData {
    let code = match e {
        TosError::BucketNotAllowed(_) => ErrorCode(-32602),
        _ => ErrorCode(-32603),
    };
    ErrorData {
        code,
        message: Cow::from(e.to_string()),
        data: None,
    }
}

fn serialize_error(e: serde_json::Error) -> ErrorData {
    ErrorData {
        code: ErrorCode(-32603),
        message: Cow::from(e.to_string()),
        data: None,
    }
}

#[derive(Debug, Clone)]
pub struct TosService {
    settings: Arc<Settings>,
    http: reqwest::Client,
    resolver: CredentialResolver,
    tool_router: ToolRouter<TosService>,
}

#[tool_router]
impl TosService {
    pub fn new(settings: Settings) -> Result<Self, TosError> {
        let http = build_http_client(&settings)?;
        let settings = Arc::new(settings);
        Ok(Self {
            resolver: CredentialResolver::new(settings.clone()),
            settings,
            http,
            tool_router: Self::tool_router(),
        })
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), ErrorData> {
        if self.settings.is_bucket_allowed(bucket) {
            Ok(())
        } else {
            Err(tool_error(TosError::BucketNotAllowed(bucket.to_string())))
        }
    }

    /// Both the source bucket and a non-empty save-as bucket must be allowed.
    fn check_snapshot_buckets(&self, req: &VideoSnapshotRequest) -> Result<(), ErrorData> {
        self.check_bucket(&req.bucket)?;
        match req.saveas_bucket.as_deref() {
            Some(target) if !target.is_empty() => self.check_bucket(target),
            _ => Ok(()),
        }
    }

    /// Signed client for one call. `parts` is the HTTP request head when the
    /// call arrived over streamable HTTP.
    fn client_for(&self, parts: Option<&Parts>) -> Result<TosClient, ErrorData> {
        let config = self.resolver.config(parts).map_err(tool_error)?;
        Ok(TosClient::new(self.http.clone(), config))
    }

    fn objects(
        &self,
        context: &RequestContext<RoleServer>,
    ) -> Result<ObjectRetrieval<TosClient>, ErrorData> {
        Ok(ObjectRetrieval::new(
            self.client_for(context.extensions.get::<Parts>())?,
            self.settings.max_object_size,
        ))
    }

    fn buckets(
        &self,
        context: &RequestContext<RoleServer>,
    ) -> Result<BucketResource<TosClient>, ErrorData> {
        Ok(BucketResource::new(
            self.client_for(context.extensions.get::<Parts>())?,
            self.settings.buckets.clone(),
        ))
    }

    #[tool(description = "List all buckets in TOS")]
    async fn list_buckets(
        &self,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = self
            .buckets(&context)?
            .list_buckets()
            .await
            .map_err(tool_error)?;
        let text = serde_json::to_string(&result).map_err(serialize_error)?;
        Ok(CallToolResult::success(vec![text_content(text)]))
    }

    #[tool(description = "List objects in a bucket, optionally filtered by prefix")]
    async fn list_objects(
        &self,
        Parameters(req): Parameters<ListObjectsRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.check_bucket(&req.bucket)?;
        let result = self
            .buckets(&context)?
            .list_objects(
                &req.bucket,
                req.prefix.as_deref(),
                req.start_after.as_deref(),
                req.continuation_token.as_deref(),
            )
            .await
            .map_err(tool_error)?;
        let text = serde_json::to_string(&result).map_err(serialize_error)?;
        Ok(CallToolResult::success(vec![text_content(text)]))
    }

    #[tool(
        description = "Retrieve an object from TOS by its full key. Text objects are returned as text, binary objects as a base64 encoded string"
    )]
    async fn get_object(
        &self,
        Parameters(req): Parameters<GetObjectRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.check_bucket(&req.bucket)?;
        let content = self
            .objects(&context)?
            .get_object(&req.bucket, &req.key)
            .await
            .map_err(tool_error)?;
        Ok(CallToolResult::success(vec![text_content(content)]))
    }

    #[tool(
        description = "Retrieve video file information (video/info) as a JSON string"
    )]
    async fn video_info(
        &self,
        Parameters(req): Parameters<VideoInfoRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.check_bucket(&req.bucket)?;
        let content = self
            .objects(&context)?
            .video_info(&req.bucket, &req.key)
            .await
            .map_err(tool_error)?;
        Ok(CallToolResult::success(vec![text_content(content)]))
    }

    #[tool(
        description = "Capture a video frame (video/snapshot). Returns the image as a base64 encoded string, or the saved object's JSON description when saveas_object is set"
    )]
    async fn video_snapshot(
        &self,
        Parameters(req): Parameters<VideoSnapshotRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.check_snapshot_buckets(&req)?;
        let params = req.params();
        let content = self
            .objects(&context)?
            .video_snapshot(&req.bucket, &req.key, params)
            .await
            .map_err(tool_error)?;
        Ok(CallToolResult::success(vec![text_content(content)]))
    }
}

#[tool_handler]
impl ServerHandler for TosService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "tos-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: Some(
                "TOS MCP: list buckets and objects, read objects, and inspect or snapshot videos \
                 stored in Volcengine TOS. Set TOS_REGION and credentials (TOS_ACCESS_KEY/TOS_SECRET_KEY \
                 locally, or the authorization STS blob in hosted mode, sent as the authorization \
                 header over HTTP)."
                    .to_string(),
            ),
        }
    }
}

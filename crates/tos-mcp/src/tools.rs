//! MCP tool request types with JSON Schema for AI parameter generation

use schemars::JsonSchema;
use serde::Deserialize;
use tos_storage::{AutoRotate, OutputFormat, SnapshotMode, VideoSnapshotParams};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListObjectsRequest {
    #[schemars(description = "The name of the bucket")]
    pub bucket: String,
    #[schemars(description = "Only list keys starting with this prefix")]
    pub prefix: Option<String>,
    #[schemars(description = "Only list keys after this key")]
    pub start_after: Option<String>,
    #[schemars(description = "Continuation token from a previous listing page")]
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetObjectRequest {
    #[schemars(description = "The name of the bucket")]
    pub bucket: String,
    #[schemars(description = "The full key of the object")]
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct VideoInfoRequest {
    #[serde(alias = "bucket_name")]
    #[schemars(description = "The name of the bucket")]
    pub bucket: String,
    #[schemars(description = "The key of the video object")]
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct VideoSnapshotRequest {
    #[serde(alias = "bucket_name")]
    #[schemars(description = "The name of the bucket")]
    pub bucket: String,
    #[schemars(description = "The key of the video object")]
    pub key: String,
    #[schemars(description = "Snapshot time in milliseconds")]
    pub time: Option<u64>,
    #[schemars(
        description = "Snapshot width in pixels; 0 computes it from the height and aspect ratio"
    )]
    pub width: Option<u32>,
    #[schemars(
        description = "Snapshot height in pixels; 0 computes it from the width and aspect ratio"
    )]
    pub height: Option<u32>,
    #[schemars(
        description = "Snapshot mode; fast takes the nearest keyframe before the time, default is frame-exact"
    )]
    pub mode: Option<SnapshotModeParam>,
    #[schemars(description = "Image format of the snapshot (jpg by default)")]
    pub output_format: Option<OutputFormatParam>,
    #[schemars(
        description = "Rotation: auto follows the video metadata, w forces landscape, h forces portrait"
    )]
    pub auto_rotate: Option<AutoRotateParam>,
    #[schemars(
        description = "Save the snapshot as this object instead of returning the image"
    )]
    pub saveas_object: Option<String>,
    #[schemars(description = "Bucket for the saved snapshot; defaults to the source bucket")]
    pub saveas_bucket: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotModeParam {
    Default,
    Fast,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatParam {
    Jpg,
    Png,
}

#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AutoRotateParam {
    Auto,
    W,
    H,
}

impl From<SnapshotModeParam> for SnapshotMode {
    fn from(mode: SnapshotModeParam) -> Self {
        match mode {
            SnapshotModeParam::Default => SnapshotMode::Default,
            SnapshotModeParam::Fast => SnapshotMode::Fast,
        }
    }
}

impl From<OutputFormatParam> for OutputFormat {
    fn from(format: OutputFormatParam) -> Self {
        match format {
            OutputFormatParam::Jpg => OutputFormat::Jpg,
            OutputFormatParam::Png => OutputFormat::Png,
        }
    }
}

impl From<AutoRotateParam> for AutoRotate {
    fn from(rotate: AutoRotateParam) -> Self {
        match rotate {
            AutoRotateParam::Auto => AutoRotate::Auto,
            AutoRotateParam::W => AutoRotate::Width,
            AutoRotateParam::H => AutoRotate::Height,
        }
    }
}

impl VideoSnapshotRequest {
    pub fn params(&self) -> VideoSnapshotParams {
        VideoSnapshotParams {
            time_ms: self.time,
            width: self.width,
            height: self.height,
            mode: self.mode.map(Into::into),
            output_format: self.output_format.map(Into::into),
            auto_rotate: self.auto_rotate.map(Into::into),
            saveas_object: self.saveas_object.clone(),
            saveas_bucket: self.saveas_bucket.clone(),
        }
    }
}

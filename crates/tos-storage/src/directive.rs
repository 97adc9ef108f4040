//! Processing directives and the query parameters they produce.
//!
//! A directive selects what the service does with the object before
//! returning it: nothing, `video/info`, or `video/snapshot` with optional
//! parameters. Snapshot parameters are only encoded when supplied; nothing is
//! defaulted client-side.

use std::fmt::{Display, Formatter, Result as FmtResult};

use base64::Engine;

pub const PROCESS_PARAM: &str = "x-tos-process";
pub const SAVE_OBJECT_PARAM: &str = "x-tos-save-object";
pub const SAVE_BUCKET_PARAM: &str = "x-tos-save-bucket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Exact frame at the requested time.
    Default,
    /// Nearest keyframe before the requested time.
    Fast,
}

impl Display for SnapshotMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SnapshotMode::Default => write!(f, "default"),
            SnapshotMode::Fast => write!(f, "fast"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpg,
    Png,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutputFormat::Jpg => write!(f, "jpg"),
            OutputFormat::Png => write!(f, "png"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRotate {
    /// Rotate from the video's rotation metadata.
    Auto,
    /// Force landscape.
    Width,
    /// Force portrait.
    Height,
}

impl Display for AutoRotate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AutoRotate::Auto => write!(f, "auto"),
            AutoRotate::Width => write!(f, "w"),
            AutoRotate::Height => write!(f, "h"),
        }
    }
}

/// Parameters of a `video/snapshot` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoSnapshotParams {
    /// Capture time in milliseconds.
    pub time_ms: Option<u64>,
    /// Width in pixels; 0 scales from the height.
    pub width: Option<u32>,
    /// Height in pixels; 0 scales from the width.
    pub height: Option<u32>,
    pub mode: Option<SnapshotMode>,
    pub output_format: Option<OutputFormat>,
    pub auto_rotate: Option<AutoRotate>,
    /// Persist the snapshot under this key instead of returning it.
    pub saveas_object: Option<String>,
    /// Bucket for the persisted snapshot; the source bucket when unset.
    pub saveas_bucket: Option<String>,
}

impl VideoSnapshotParams {
    /// `video/snapshot` followed by one `,<code>_<value>` fragment per
    /// supplied field, always in the order t, w, h, m, f, ar.
    pub fn process_value(&self) -> String {
        let fragments = [
            ("t", self.time_ms.map(|v| v.to_string())),
            ("w", self.width.map(|v| v.to_string())),
            ("h", self.height.map(|v| v.to_string())),
            ("m", self.mode.map(|v| v.to_string())),
            ("f", self.output_format.map(|v| v.to_string())),
            ("ar", self.auto_rotate.map(|v| v.to_string())),
        ];

        let mut value = String::from("video/snapshot");
        for (code, field) in fragments {
            if let Some(field) = field {
                value.push_str(&format!(",{}_{}", code, field));
            }
        }
        value
    }

    /// Save-as object name; an empty name counts as not supplied.
    pub fn saveas_object(&self) -> Option<&str> {
        self.saveas_object.as_deref().filter(|s| !s.is_empty())
    }

    pub fn saveas_bucket(&self) -> Option<&str> {
        self.saveas_bucket.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether the service will store the snapshot and answer with JSON.
    pub fn saves_object(&self) -> bool {
        self.saveas_object().is_some()
    }
}

/// What the service should do with the object before returning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessDirective {
    None,
    VideoInfo,
    VideoSnapshot(VideoSnapshotParams),
}

impl ProcessDirective {
    /// Query parameters for this directive.
    pub fn query(&self) -> Vec<(String, String)> {
        match self {
            ProcessDirective::None => Vec::new(),
            ProcessDirective::VideoInfo => {
                vec![(PROCESS_PARAM.to_string(), "video/info".to_string())]
            }
            ProcessDirective::VideoSnapshot(params) => {
                let mut query = vec![(PROCESS_PARAM.to_string(), params.process_value())];
                if let Some(object) = params.saveas_object() {
                    query.push((SAVE_OBJECT_PARAM.to_string(), encode_name(object)));
                }
                if let Some(bucket) = params.saveas_bucket() {
                    query.push((SAVE_BUCKET_PARAM.to_string(), encode_name(bucket)));
                }
                query
            }
        }
    }

    /// Operation name used in error messages and logs.
    pub fn operation(&self) -> &'static str {
        match self {
            ProcessDirective::None => "get object",
            ProcessDirective::VideoInfo => "get video info",
            ProcessDirective::VideoSnapshot(_) => "get video snapshot",
        }
    }
}

/// Standard base64 of the UTF-8 bytes of a save-as name.
fn encode_name(name: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(name.as_bytes())
}

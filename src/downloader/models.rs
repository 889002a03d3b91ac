// Common data models for the acquisition pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Extension of the finished artifact
    pub fn target_ext(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Rung of the quality ladder, or "whatever is best"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    Best,
    /// Maximum frame height in pixels
    Height(u32),
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Height(h) => write!(f, "{}p", h),
        }
    }
}

/// Fully-resolved user choice, handed to the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub url: String,
    pub kind: MediaKind,
    pub quality: Quality,
}

impl SelectionRequest {
    pub fn new(url: impl Into<String>, kind: MediaKind, quality: Quality) -> Self {
        Self {
            url: url.into(),
            kind,
            quality,
        }
    }
}

/// Result of a size probe. `Unknown` is distinct from a confirmed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeEstimate {
    Bytes(u64),
    Unknown,
}

impl SizeEstimate {
    /// Exact size preferred, approximate next. Zero counts as unknown.
    pub fn from_reported(exact: Option<u64>, approx: Option<u64>) -> Self {
        match exact.filter(|b| *b > 0).or(approx.filter(|b| *b > 0)) {
            Some(bytes) => Self::Bytes(bytes),
            None => Self::Unknown,
        }
    }

    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Bytes(b) => Some(*b),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for SizeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "{:.1} MB", *b as f64 / 1_048_576.0),
            Self::Unknown => write!(f, "unknown size"),
        }
    }
}

/// Display metadata pulled from the extractor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub thumbnail: Option<String>,
}

/// What a metadata-only extractor call reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeInfo {
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    /// Container of the selected format(s), e.g. "webm" or "m4a"
    pub ext: Option<String>,
    pub metadata: MediaMetadata,
}

/// A finished local artifact. Files registered with `cleanup` are removed
/// when this value is dropped.
#[derive(Debug)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub title: String,
    pub author: String,
    #[allow(dead_code)] // held for its Drop
    pub(crate) cleanup: super::fetch::TempCleanup,
}

/// Terminal result of one request
#[derive(Debug)]
pub enum DeliveryOutcome {
    LocalFile(LocalArtifact),
    HostedLink { url: String },
    Failure { reason: String },
}

impl DeliveryOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Network configuration for the extractor
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Socket timeout in seconds
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}

// Why did the source refuse? Matches yt-dlp stderr against known phrases so
// an ExtractionFailed reply can say something actionable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    DrmProtected,
    UnsupportedUrl,
    /// No candidate in the format chain matched
    FormatUnavailable,
    AgeRestricted,
    PrivateVideo,
    Removed,
    GeoBlocked,
    RateLimited,
    Forbidden,
    /// Includes our own wall-clock timeout
    Network,
    Unknown,
}

/// Checked top to bottom; the first hit wins, so narrower phrases go first
const PATTERNS: &[(BlockingReason, &[&str])] = &[
    (
        BlockingReason::DrmProtected,
        &["drm", "widevine", "playready", "fairplay", "requires purchase"],
    ),
    (BlockingReason::UnsupportedUrl, &["unsupported url"]),
    (BlockingReason::FormatUnavailable, &["requested format is not available"]),
    (
        BlockingReason::AgeRestricted,
        &["age-restricted", "sign in to confirm your age", "age_verification"],
    ),
    (
        BlockingReason::PrivateVideo,
        &["private video", "video is private", "sign in if you've been granted access"],
    ),
    (
        BlockingReason::Removed,
        &["video unavailable", "has been removed", "no longer available", "video is unavailable"],
    ),
    (
        BlockingReason::GeoBlocked,
        &["not available in your country", "blocked in your country", "geo restricted", "geo-restricted"],
    ),
    (BlockingReason::RateLimited, &["429", "rate limit", "too many requests"]),
    (BlockingReason::Forbidden, &["403", "forbidden"]),
    (
        BlockingReason::Network,
        &["timeout", "timed out", "connection refused", "network unreachable", "name resolution"],
    ),
];

impl BlockingReason {
    /// Second line of the error reply, when there is something to add
    pub fn user_explanation(&self) -> Option<&'static str> {
        let text = match self {
            Self::DrmProtected => "This media is DRM-protected and cannot be saved as a file.",
            Self::UnsupportedUrl => "This site is not supported.",
            Self::FormatUnavailable => "No format matching that choice exists. Try another quality.",
            Self::AgeRestricted => "Age-restricted videos need a logged-in session.",
            Self::PrivateVideo => "This video is private. Only the uploader can make it available.",
            Self::Removed => "This video has been removed or is no longer available.",
            Self::GeoBlocked => "This video is not available from the bot's region.",
            Self::RateLimited => "The source is rate-limiting requests. Try again later.",
            Self::Forbidden | Self::Network | Self::Unknown => return None,
        };
        Some(text)
    }
}

/// `None` only for empty stderr
pub fn diagnose_error(stderr: &str) -> Option<BlockingReason> {
    if stderr.trim().is_empty() {
        return None;
    }
    let lower = stderr.to_lowercase();
    let reason = PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(reason, _)| *reason)
        .unwrap_or(BlockingReason::Unknown);
    Some(reason)
}

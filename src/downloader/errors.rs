// Error types for the acquisition pipeline

use thiserror::Error;

use super::extractors::diagnose_error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Size probe gave no usable number. Never surfaced to users; the router
    /// treats it as "assume large".
    #[error("Size probe inconclusive")]
    ProbeInconclusive,

    /// Streaming endpoint answered with something that is not the expected JSON
    #[error("stream rejected")]
    UpstreamRejected,

    /// Remote storage did not hand out an upload endpoint
    #[error("GoFile API Error: {0}")]
    HandshakeFailed(String),

    /// No format matched, or the source could not be reached
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Transcode / tag / thumbnail step did not produce the expected file
    #[error("Post-processing failed: {0}")]
    PostProcessFailed(String),

    /// Final hand-off to the messaging surface failed
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// The conversation has no stored link any more
    #[error("Link expired. Please send the link again.")]
    LinkExpired,

    /// yt-dlp, curl or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Failed to parse extractor JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),
}

impl DownloadError {
    /// Short reason carried by a failed outcome
    pub fn reason(&self) -> String {
        match self {
            Self::UpstreamRejected => "stream rejected".to_string(),
            Self::HandshakeFailed(_) => "GoFile API Error".to_string(),
            Self::ExtractionFailed(msg) => {
                let line = first_error_line(msg);
                match diagnose_error(msg).and_then(|r| r.user_explanation()) {
                    Some(explanation) => format!("{}\n\n{}", line, explanation),
                    None => line,
                }
            }
            other => other.to_string(),
        }
    }

    /// Text sent back to the originating conversation
    pub fn user_message(&self) -> String {
        format!("❌ {}", self.reason())
    }
}

/// Pick the most meaningful line of an extractor's stderr.
fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(|l| l.trim())
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().map(|l| l.trim()).find(|l| !l.is_empty()))
        .unwrap_or("Unknown error")
        .chars()
        .take(300)
        .collect()
}

// Classify raw extractor stderr
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("command not found") || lower.contains("no such file or directory") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("postprocessing") || lower.contains("ffmpeg") || lower.contains("ffprobe") {
            return Self::PostProcessFailed(s);
        }

        if lower.contains("invalid json") {
            return Self::ParseError(s);
        }

        Self::ExtractionFailed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_rejected_message() {
        assert_eq!(DownloadError::UpstreamRejected.to_string(), "stream rejected");
    }

    #[test]
    fn test_handshake_message_names_api() {
        let err = DownloadError::HandshakeFailed("status=error".to_string());
        assert!(err.to_string().starts_with("GoFile API Error"));
        assert_eq!(err.reason(), "GoFile API Error");
        assert_eq!(err.user_message(), "❌ GoFile API Error");
    }

    #[test]
    fn test_stderr_classification() {
        let e = DownloadError::from("ERROR: Requested format is not available".to_string());
        assert!(matches!(e, DownloadError::ExtractionFailed(_)));

        let e = DownloadError::from("ERROR: Postprocessing: ffprobe and ffmpeg not found".to_string());
        assert!(matches!(e, DownloadError::PostProcessFailed(_)));
    }

    #[test]
    fn test_extraction_message_uses_error_line() {
        let e = DownloadError::ExtractionFailed(
            "WARNING: something\nERROR: [youtube] abc: Private video. Sign in if you've been granted access".to_string(),
        );
        let msg = e.user_message();
        assert!(msg.starts_with("❌ ERROR: [youtube] abc: Private video"));
        assert!(msg.contains("private"));
    }
}

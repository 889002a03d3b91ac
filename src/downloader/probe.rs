// Size probe - metadata-only size lookup, best effort, never retried

use tracing::{info, warn};

use super::errors::DownloadError;
use super::extractors::Extractor;
use super::format_selector::FormatSpec;
use super::models::{MediaMetadata, SizeEstimate};

/// Probe outcome. Metadata is kept when the probe succeeded so the streaming
/// path can name the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub estimate: SizeEstimate,
    pub metadata: Option<MediaMetadata>,
    pub ext: Option<String>,
}

impl ProbeReport {
    pub fn unknown() -> Self {
        Self {
            estimate: SizeEstimate::Unknown,
            metadata: None,
            ext: None,
        }
    }

    /// Confirmed size, or `ProbeInconclusive` for the router to treat as large
    pub fn confirmed_bytes(&self) -> Result<u64, DownloadError> {
        self.estimate.bytes().ok_or(DownloadError::ProbeInconclusive)
    }
}

/// Any extractor error is swallowed and reported as `Unknown`.
pub async fn probe_size(extractor: &dyn Extractor, url: &str, spec: &FormatSpec) -> ProbeReport {
    match extractor.probe(url, spec).await {
        Ok(info) => {
            let estimate = SizeEstimate::from_reported(info.filesize, info.filesize_approx);
            info!(
                url,
                extractor = extractor.name(),
                exact = ?info.filesize,
                approx = ?info.filesize_approx,
                %estimate,
                "size probe finished"
            );
            ProbeReport {
                estimate,
                metadata: Some(info.metadata),
                ext: info.ext,
            }
        }
        Err(e) => {
            warn!(url, extractor = extractor.name(), error = %e, "size probe inconclusive");
            ProbeReport::unknown()
        }
    }
}

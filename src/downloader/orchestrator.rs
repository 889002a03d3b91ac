// MediaRouter - probe, route, execute
//
// Stages run strictly in order for one request. Nothing here retries; a
// failure at any stage becomes a `Failure` outcome for the caller to render.

use std::sync::Arc;
use tracing::{debug, info};

use super::extractors::Extractor;
use super::fetch::LocalFetch;
use super::format_selector::FormatSpec;
use super::models::{DeliveryOutcome, SelectionRequest};
use super::pipe::PipeExecutor;
use super::probe::{probe_size, ProbeReport};
use super::router::{route, Route};
use super::traits::ProgressSink;
use super::utils::sanitize_filename;

pub struct MediaRouter {
    extractor: Arc<dyn Extractor>,
    pipe: PipeExecutor,
    local: LocalFetch,
    threshold_bytes: u64,
}

impl MediaRouter {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        pipe: PipeExecutor,
        local: LocalFetch,
        threshold_bytes: u64,
    ) -> Self {
        Self {
            extractor,
            pipe,
            local,
            threshold_bytes,
        }
    }

    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    /// Probe and decide without executing
    pub async fn plan(&self, request: &SelectionRequest) -> (FormatSpec, ProbeReport, Route) {
        let spec = FormatSpec::resolve(request);
        let report = probe_size(self.extractor.as_ref(), &request.url, &spec).await;
        let decision = route(report.estimate, self.threshold_bytes);
        if let Err(e) = report.confirmed_bytes() {
            debug!(url = %request.url, reason = %e, "assuming large artifact");
        }
        info!(
            url = %request.url,
            kind = %request.kind,
            quality = %request.quality,
            estimate = %report.estimate,
            threshold = self.threshold_bytes,
            route = %decision,
            "route decided"
        );
        (spec, report, decision)
    }

    /// Run one request to its terminal outcome. `request_id` names local
    /// files and must be unique per request.
    pub async fn acquire(
        &self,
        request: &SelectionRequest,
        request_id: &str,
        progress: &dyn ProgressSink,
    ) -> DeliveryOutcome {
        progress.emit("🔎 Checking file size...").await;
        let (spec, report, decision) = self.plan(request).await;

        match decision {
            Route::Stream => {
                progress
                    .emit(&format!(
                        "☁️ Large file ({}). Streaming to hosted storage...",
                        report.estimate
                    ))
                    .await;
                let filename = upload_filename(&report, &spec, request_id);
                self.pipe
                    .execute(self.extractor.as_ref(), &request.url, &spec, &filename)
                    .await
            }
            Route::LocalFetch => {
                progress.emit("⬇️ Downloading...").await;
                match self
                    .local
                    .fetch(self.extractor.as_ref(), &request.url, &spec, request_id)
                    .await
                {
                    Ok(artifact) => {
                        progress.emit("📤 Uploading file...").await;
                        DeliveryOutcome::LocalFile(artifact)
                    }
                    Err(e) => DeliveryOutcome::failure(e.reason()),
                }
            }
        }
    }
}

/// `<title>.<ext>`; ext is what the extractor will actually emit on stdout.
/// Nothing is transcoded on this path, so audio never claims `.mp3`.
fn upload_filename(report: &ProbeReport, spec: &FormatSpec, request_id: &str) -> String {
    let stem = report
        .metadata
        .as_ref()
        .map(|m| sanitize_filename(&m.title, request_id))
        .unwrap_or_else(|| request_id.to_string());
    let ext = report
        .ext
        .as_deref()
        .filter(|e| !e.is_empty())
        .unwrap_or(spec.stream_ext());
    format!("{}.{}", stem, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{MediaMetadata, SizeEstimate};

    #[test]
    fn test_upload_filename_from_probe() {
        let report = ProbeReport {
            estimate: SizeEstimate::Bytes(1),
            metadata: Some(MediaMetadata {
                title: "Live: at the \"Hall\"".to_string(),
                ..Default::default()
            }),
            ext: Some("webm".to_string()),
        };
        assert_eq!(
            upload_filename(&report, &FormatSpec::audio(), "1-x"),
            "Live at the Hall.webm"
        );
    }

    #[test]
    fn test_upload_filename_without_probe() {
        assert_eq!(
            upload_filename(&ProbeReport::unknown(), &FormatSpec::audio(), "5-abc"),
            "5-abc.m4a"
        );
    }

    #[test]
    fn test_upload_filename_video_without_probe() {
        let spec = FormatSpec::video(crate::downloader::models::Quality::Height(720));
        assert_eq!(upload_filename(&ProbeReport::unknown(), &spec, "6-def"), "6-def.mp4");
    }
}

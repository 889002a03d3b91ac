// Local fetch & post-process pipeline
//
// Files are named `<request-id>.<ext>` inside the work dir. Everything that
// starts with `<request-id>.` belongs to one request and is removed by
// `TempCleanup` when the request's artifact (or the failed attempt) is dropped.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::extractors::{Extractor, FetchTarget};
use super::format_selector::FormatSpec;
use super::models::LocalArtifact;

/// Removes every file of one request when dropped
#[derive(Debug)]
pub struct TempCleanup {
    dir: PathBuf,
    stem: String,
}

impl TempCleanup {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    fn owned_files(&self) -> Vec<PathBuf> {
        let prefix = format!("{}.", self.stem);
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .map(|e| e.path())
            .collect()
    }
}

impl Drop for TempCleanup {
    fn drop(&mut self) {
        for path in self.owned_files() {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed transient file"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove transient file"),
            }
        }
    }
}

pub struct LocalFetch {
    work_dir: PathBuf,
}

impl LocalFetch {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Download, post-process and locate the finished file. On any error the
    /// request's files are already gone when this returns.
    pub async fn fetch(
        &self,
        extractor: &dyn Extractor,
        url: &str,
        spec: &FormatSpec,
        request_id: &str,
    ) -> Result<LocalArtifact, DownloadError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("work dir: {}", e)))?;

        let target = FetchTarget::new(&self.work_dir, request_id);
        let cleanup = TempCleanup::new(&self.work_dir, request_id);

        info!(url, request_id, kind = %spec.kind, "fetching to local storage");
        let metadata = extractor.fetch(url, spec, &target).await?;

        let expected = locate_artifact(&target, spec).await.ok_or_else(|| {
            DownloadError::PostProcessFailed(format!(
                "none of {}.{{{}}} was produced",
                target.stem,
                spec.accepted_exts().join(",")
            ))
        })?;

        info!(path = %expected.display(), title = %metadata.title, "local artifact ready");
        Ok(LocalArtifact {
            path: expected,
            title: metadata.title,
            author: metadata.uploader,
            cleanup,
        })
    }
}

/// First finished artifact in preference order. Intermediate files (the
/// source container before transcoding, thumbnails) never match.
async fn locate_artifact(target: &FetchTarget, spec: &FormatSpec) -> Option<PathBuf> {
    for ext in spec.accepted_exts() {
        let candidate = target.path_with_ext(ext);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            if *ext != spec.output_ext() {
                warn!(path = %candidate.display(), "artifact kept its fallback container");
            }
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::extractors::CommandSpec;
    use crate::downloader::models::{MediaMetadata, ProbeInfo, Quality};
    use async_trait::async_trait;

    /// Writes the given extensions for the target stem, then succeeds or fails
    struct WritingExtractor {
        exts: Vec<&'static str>,
        fail: Option<DownloadError>,
    }

    #[async_trait]
    impl Extractor for WritingExtractor {
        fn name(&self) -> &'static str {
            "writing"
        }

        async fn probe(&self, _url: &str, _spec: &FormatSpec) -> Result<ProbeInfo, DownloadError> {
            Ok(ProbeInfo::default())
        }

        async fn fetch(
            &self,
            _url: &str,
            _spec: &FormatSpec,
            target: &FetchTarget,
        ) -> Result<MediaMetadata, DownloadError> {
            for ext in &self.exts {
                std::fs::write(target.path_with_ext(ext), b"data").unwrap();
            }
            if let Some(e) = &self.fail {
                return Err(e.clone());
            }
            Ok(MediaMetadata {
                id: "id1".to_string(),
                title: "A Song".to_string(),
                uploader: "Band".to_string(),
                thumbnail: None,
            })
        }

        fn stream_command(&self, _url: &str, _spec: &FormatSpec) -> CommandSpec {
            CommandSpec::new("true", vec![])
        }
    }

    fn files_in(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_artifact_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = LocalFetch::new(dir.path());
        let ex = WritingExtractor { exts: vec!["mp3", "jpg"], fail: None };

        let artifact = fetch
            .fetch(&ex, "https://x", &FormatSpec::audio(), "7-abc")
            .await
            .unwrap();
        assert_eq!(artifact.path, dir.path().join("7-abc.mp3"));
        assert_eq!(artifact.title, "A Song");
        assert_eq!(artifact.author, "Band");
        assert!(artifact.path.exists());

        let path = artifact.path.clone();
        drop(artifact);
        assert!(!path.exists());
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_transcoded_file_is_post_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = LocalFetch::new(dir.path());
        // Transcode "forgot" to run: only the source container is on disk
        let ex = WritingExtractor { exts: vec!["webm"], fail: None };

        let err = fetch
            .fetch(&ex, "https://x", &FormatSpec::audio(), "8-def")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::PostProcessFailed(_)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_extractor_error_cleans_partials() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = LocalFetch::new(dir.path());
        let ex = WritingExtractor {
            exts: vec!["mp4.part", "webp"],
            fail: Some(DownloadError::ExtractionFailed("ERROR: boom".to_string())),
        };

        let err = fetch
            .fetch(&ex, "https://x", &FormatSpec::video(Quality::Height(720)), "9-ghi")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ExtractionFailed(_)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_other_requests_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("other.mp3"), b"keep").unwrap();
        std::fs::write(dir.path().join("10-jkl2.mp3"), b"keep").unwrap();

        let fetch = LocalFetch::new(dir.path());
        let ex = WritingExtractor { exts: vec!["mp3"], fail: None };
        let artifact = fetch
            .fetch(&ex, "https://x", &FormatSpec::audio(), "10-jkl")
            .await
            .unwrap();
        drop(artifact);

        let mut left = files_in(dir.path());
        left.sort();
        assert_eq!(left, vec!["10-jkl2.mp3".to_string(), "other.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_video_in_fallback_container_is_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = LocalFetch::new(dir.path());
        // Single-file fallback that stayed webm, next to its thumbnail
        let ex = WritingExtractor { exts: vec!["webm", "jpg"], fail: None };

        let artifact = fetch
            .fetch(&ex, "https://x", &FormatSpec::video(Quality::Best), "11-mno")
            .await
            .unwrap();
        assert_eq!(artifact.path, dir.path().join("11-mno.webm"));

        drop(artifact);
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_mp4_preferred_over_leftover_source() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = LocalFetch::new(dir.path());
        let ex = WritingExtractor { exts: vec!["webm", "mp4"], fail: None };

        let artifact = fetch
            .fetch(&ex, "https://x", &FormatSpec::video(Quality::Height(480)), "12-pqr")
            .await
            .unwrap();
        assert_eq!(artifact.path, dir.path().join("12-pqr.mp4"));
    }
}

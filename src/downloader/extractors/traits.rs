// Extractor trait and common types

use async_trait::async_trait;
use std::path::PathBuf;

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSpec;
use crate::downloader::models::{MediaMetadata, NetworkConfig, ProbeInfo};

/// Configuration for the extraction collaborator
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Path to the yt-dlp binary
    pub ytdlp_path: String,
    /// Proxy and socket timeout
    pub network: NetworkConfig,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    /// Wall-clock limit for a metadata-only call, in seconds
    pub probe_timeout_secs: u64,
    /// Wall-clock limit for a full local fetch, in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            network: NetworkConfig::default(),
            cookies_path: None,
            probe_timeout_secs: 60,
            fetch_timeout_secs: 1800,
        }
    }
}

impl ExtractorConfig {
    pub fn with_ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.network.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.network.timeout = Some(seconds);
        self
    }

    pub fn with_probe_timeout(mut self, seconds: u64) -> Self {
        self.probe_timeout_secs = seconds;
        self
    }

    pub fn with_fetch_timeout(mut self, seconds: u64) -> Self {
        self.fetch_timeout_secs = seconds;
        self
    }
}

/// Where a local fetch writes: `<dir>/<stem>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub dir: PathBuf,
    pub stem: String,
}

impl FetchTarget {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    pub fn path_with_ext(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, ext))
    }
}

/// A program plus its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// The extraction collaborator
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Metadata-only resolution; must not transfer payload bytes
    async fn probe(&self, url: &str, spec: &FormatSpec) -> Result<ProbeInfo, DownloadError>;

    /// Download and post-process into `target`. The finished file is expected
    /// at `target.path_with_ext(spec.output_ext())`.
    async fn fetch(
        &self,
        url: &str,
        spec: &FormatSpec,
        target: &FetchTarget,
    ) -> Result<MediaMetadata, DownloadError>;

    /// Command that writes the payload to stdout, for the pipe executor
    fn stream_command(&self, url: &str, spec: &FormatSpec) -> CommandSpec;
}

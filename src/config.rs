// Runtime configuration
//
// Every option is a CLI flag with an environment fallback. The threshold is
// fixed for the life of the process.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::downloader::extractors::{CliExtractor, ExtractorConfig};
use crate::downloader::fetch::LocalFetch;
use crate::downloader::models::NetworkConfig;
use crate::downloader::pipe::{GofileHost, PipeExecutor, ProcessPipeLauncher, DEFAULT_STREAM_TIMEOUT_SECS};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::{DownloadError, MediaRouter, DEFAULT_THRESHOLD_BYTES};
use crate::session::EvictionPolicy;

pub const DEFAULT_STORAGE_API: &str = "https://api.gofile.io";

#[derive(Debug, Clone, Args)]
pub struct RouterConfig {
    /// Artifacts larger than this (or of unknown size) are streamed to hosted storage
    #[arg(long, env = "MEDIA_ROUTER_THRESHOLD", default_value_t = DEFAULT_THRESHOLD_BYTES, global = true)]
    pub threshold_bytes: u64,

    /// Scratch directory for local fetches [default: <cache dir>/media-router]
    #[arg(long, env = "MEDIA_ROUTER_WORK_DIR", global = true)]
    pub work_dir: Option<PathBuf>,

    /// yt-dlp executable [default: auto-detect]
    #[arg(long, env = "MEDIA_ROUTER_YTDLP", global = true)]
    pub ytdlp: Option<String>,

    /// curl executable [default: auto-detect]
    #[arg(long, env = "MEDIA_ROUTER_CURL", global = true)]
    pub curl: Option<String>,

    /// Proxy for both the extractor and the uploader, e.g. socks5://127.0.0.1:1080
    #[arg(long, env = "MEDIA_ROUTER_PROXY", global = true)]
    pub proxy: Option<String>,

    /// Netscape cookies file handed to yt-dlp
    #[arg(long, env = "MEDIA_ROUTER_COOKIES", global = true)]
    pub cookies: Option<String>,

    #[arg(long, default_value_t = 30, global = true)]
    pub socket_timeout: u32,

    #[arg(long, default_value_t = 60, global = true)]
    pub probe_timeout: u64,

    /// Wall-clock limit for a local download plus post-processing, in seconds
    #[arg(long, default_value_t = 1800, global = true)]
    pub fetch_timeout: u64,

    /// Wall-clock limit for one streamed upload, in seconds
    #[arg(long, default_value_t = DEFAULT_STREAM_TIMEOUT_SECS, global = true)]
    pub stream_timeout: u64,

    #[arg(long, default_value_t = 1800, global = true)]
    pub session_ttl: u64,

    #[arg(long, default_value_t = 10_000, global = true)]
    pub session_capacity: usize,

    #[arg(long, env = "MEDIA_ROUTER_STORAGE_API", default_value = DEFAULT_STORAGE_API, global = true)]
    pub storage_api: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            work_dir: None,
            ytdlp: None,
            curl: None,
            proxy: None,
            cookies: None,
            socket_timeout: 30,
            probe_timeout: 60,
            fetch_timeout: 1800,
            stream_timeout: DEFAULT_STREAM_TIMEOUT_SECS,
            session_ttl: 1800,
            session_capacity: 10_000,
            storage_api: DEFAULT_STORAGE_API.to_string(),
        }
    }
}

impl RouterConfig {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("media-router")
        })
    }

    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            proxy: self.proxy.clone().filter(|p| !p.trim().is_empty()),
            timeout: Some(self.socket_timeout),
        }
    }

    pub fn ytdlp_path(&self) -> String {
        self.ytdlp
            .clone()
            .unwrap_or_else(|| ToolManager::new().resolve_path(ToolType::YtDlp))
    }

    pub fn curl_path(&self) -> String {
        self.curl
            .clone()
            .unwrap_or_else(|| ToolManager::new().resolve_path(ToolType::Curl))
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig::default()
            .with_ytdlp_path(self.ytdlp_path())
            .with_proxy(self.network().proxy)
            .with_cookies_path(self.cookies.clone())
            .with_socket_timeout(self.socket_timeout)
            .with_probe_timeout(self.probe_timeout)
            .with_fetch_timeout(self.fetch_timeout)
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            ttl: Duration::from_secs(self.session_ttl),
            capacity: self.session_capacity.max(1),
        }
    }

    /// Wire the production collaborators: yt-dlp, GoFile, curl
    pub fn build_router(&self) -> Result<MediaRouter, DownloadError> {
        let network = self.network();
        let extractor = Arc::new(CliExtractor::new(self.extractor_config()));
        let host = Arc::new(GofileHost::new(self.storage_api.clone(), &network)?);
        let launcher = Arc::new(ProcessPipeLauncher::new(self.stream_timeout));
        let pipe = PipeExecutor::new(host, launcher, self.curl_path(), network);
        let local = LocalFetch::new(self.work_dir());

        Ok(MediaRouter::new(extractor, pipe, local, self.threshold_bytes))
    }
}

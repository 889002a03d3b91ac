// CLI Extractor - uses native `yt-dlp` binary
//
// Three modes, all built as argument vectors:
// - probe: `--dump-json --skip-download` with the FormatSpec selector
// - fetch: full download into a work dir, postprocessors from the FormatSpec chain
// - stream: payload to stdout (`-o -`) for the pipe executor

use async_trait::async_trait;
use tracing::{debug, warn};

use super::traits::{CommandSpec, Extractor, ExtractorConfig, FetchTarget};
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSpec;
use crate::downloader::models::{MediaMetadata, ProbeInfo};
use crate::downloader::utils::{get_proxy_args, get_timeout_args, run_output_with_timeout};

/// CLI-based extractor using the yt-dlp binary
pub struct CliExtractor {
    config: ExtractorConfig,
}

impl CliExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Flags shared by every invocation
    fn common_args(&self, spec: &FormatSpec) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            spec.selector(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-update".to_string(),
        ];

        args.extend(get_timeout_args(&self.config.network));
        args.extend(get_proxy_args(&self.config.network));

        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        args
    }

    fn build_probe_args(&self, url: &str, spec: &FormatSpec) -> Vec<String> {
        let mut args = self.common_args(spec);
        args.push("--dump-json".to_string());
        args.push("--skip-download".to_string());
        // `--` keeps a URL starting with '-' from being read as an option
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn build_fetch_args(&self, url: &str, spec: &FormatSpec, target: &FetchTarget) -> Vec<String> {
        let mut args = self.common_args(spec);
        args.extend([
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            "--retries".to_string(),
            "3".to_string(),
            "-P".to_string(),
            target.dir.to_string_lossy().to_string(),
            "-o".to_string(),
            format!("{}.%(ext)s", target.stem),
        ]);
        args.extend(spec.post_process_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn build_stream_args(&self, url: &str, spec: &FormatSpec) -> Vec<String> {
        let mut args = self.common_args(spec);
        args.extend(["--quiet".to_string(), "-o".to_string(), "-".to_string()]);
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Parse `--dump-json` output
    pub(crate) fn parse_json(stdout: &[u8]) -> Result<ProbeInfo, DownloadError> {
        // With --no-simulate yt-dlp may print progress lines first; the JSON
        // document is the last non-empty line.
        let text = String::from_utf8_lossy(stdout);
        let line = text
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| DownloadError::ParseError("Invalid JSON: no document".to_string()))?;

        let json: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        let (filesize, filesize_approx) = Self::parse_sizes(&json);

        Ok(ProbeInfo {
            filesize,
            filesize_approx,
            ext: json["ext"].as_str().map(|s| s.to_string()),
            metadata: MediaMetadata {
                id: json["id"].as_str().unwrap_or("unknown").to_string(),
                title: json["title"].as_str().unwrap_or("Unknown").to_string(),
                uploader: json["uploader"]
                    .as_str()
                    .or_else(|| json["channel"].as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
                thumbnail: json["thumbnail"].as_str().map(|s| s.to_string()),
            },
        })
    }

    /// Top-level sizes first; for merged selections sum the requested parts
    fn parse_sizes(json: &serde_json::Value) -> (Option<u64>, Option<u64>) {
        let exact = json["filesize"].as_u64();
        let approx = json["filesize_approx"].as_u64();
        if exact.is_some() || approx.is_some() {
            return (exact, approx);
        }

        let Some(parts) = json["requested_formats"].as_array() else {
            return (None, None);
        };
        if parts.is_empty() {
            return (None, None);
        }

        let exact_sum = parts
            .iter()
            .map(|p| p["filesize"].as_u64())
            .sum::<Option<u64>>();
        let approx_sum = parts
            .iter()
            .map(|p| p["filesize"].as_u64().or_else(|| p["filesize_approx"].as_u64()))
            .sum::<Option<u64>>();

        (exact_sum, approx_sum)
    }
}

#[async_trait]
impl Extractor for CliExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn probe(&self, url: &str, spec: &FormatSpec) -> Result<ProbeInfo, DownloadError> {
        let args = self.build_probe_args(url, spec);
        debug!(program = %self.config.ytdlp_path, ?args, "probing");

        let out = run_output_with_timeout(
            &self.config.ytdlp_path,
            args,
            self.config.probe_timeout_secs,
        )
        .await
        .map_err(DownloadError::ExecutionError)?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).to_string();
            return Err(DownloadError::from(stderr));
        }

        Self::parse_json(&out.stdout)
    }

    async fn fetch(
        &self,
        url: &str,
        spec: &FormatSpec,
        target: &FetchTarget,
    ) -> Result<MediaMetadata, DownloadError> {
        let args = self.build_fetch_args(url, spec, target);
        debug!(program = %self.config.ytdlp_path, ?args, "fetching");

        let out = run_output_with_timeout(
            &self.config.ytdlp_path,
            args,
            self.config.fetch_timeout_secs,
        )
        .await
        .map_err(DownloadError::ExecutionError)?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).to_string();
            warn!(url, "yt-dlp fetch failed");
            return Err(DownloadError::from(stderr));
        }

        // The file is on disk at this point; metadata is only for display.
        match Self::parse_json(&out.stdout) {
            Ok(info) => Ok(info.metadata),
            Err(e) => {
                warn!(error = %e, "fetch succeeded but metadata was unreadable");
                Ok(MediaMetadata {
                    id: target.stem.clone(),
                    title: target.stem.clone(),
                    uploader: "Unknown".to_string(),
                    thumbnail: None,
                })
            }
        }
    }

    fn stream_command(&self, url: &str, spec: &FormatSpec) -> CommandSpec {
        CommandSpec::new(
            self.config.ytdlp_path.clone(),
            self.build_stream_args(url, spec),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::Quality;

    fn extractor() -> CliExtractor {
        CliExtractor::new(
            ExtractorConfig::default()
                .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
                .with_socket_timeout(15),
        )
    }

    #[test]
    fn test_probe_args_are_metadata_only() {
        let spec = FormatSpec::video(Quality::Height(720));
        let args = extractor().build_probe_args("https://youtu.be/x", &spec);
        assert!(args.contains(&"--skip-download".to_string()));
        assert!(args.contains(&"--dump-json".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == spec.selector()));
        assert!(args.windows(2).any(|w| w[0] == "--proxy" && w[1] == "socks5://127.0.0.1:1080"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[test]
    fn test_url_is_single_argument() {
        let spec = FormatSpec::audio();
        let url = "https://example.com/a b; rm -rf /";
        let cmd = extractor().stream_command(url, &spec);
        assert_eq!(cmd.args.last().map(String::as_str), Some(url));
        assert!(cmd.args.windows(2).any(|w| w[0] == "-o" && w[1] == "-"));
    }

    #[test]
    fn test_fetch_args_carry_output_template() {
        let spec = FormatSpec::audio();
        let target = FetchTarget::new("/tmp/work", "42-abc");
        let args = extractor().build_fetch_args("https://x", &spec, &target);
        assert!(args.windows(2).any(|w| w[0] == "-o" && w[1] == "42-abc.%(ext)s"));
        assert!(args.windows(2).any(|w| w[0] == "-P" && w[1] == "/tmp/work"));
        assert!(args.contains(&"--embed-thumbnail".to_string()));
    }

    #[test]
    fn test_parse_sizes_top_level() {
        let json = br#"{"id":"a","title":"T","uploader":"U","filesize":100,"filesize_approx":120}"#;
        let info = CliExtractor::parse_json(json).unwrap();
        assert_eq!(info.filesize, Some(100));
        assert_eq!(info.filesize_approx, Some(120));
        assert_eq!(info.metadata.title, "T");
    }

    #[test]
    fn test_parse_sizes_requested_formats() {
        let json = br#"{"id":"a","title":"T","requested_formats":[{"filesize":10},{"filesize_approx":5}]}"#;
        let info = CliExtractor::parse_json(json).unwrap();
        assert_eq!(info.filesize, None);
        assert_eq!(info.filesize_approx, Some(15));
        assert_eq!(info.metadata.uploader, "Unknown");
    }

    #[test]
    fn test_parse_last_json_line() {
        let out = b"[download] 100%\n{\"id\":\"z\",\"title\":\"Song\",\"uploader\":\"Band\"}\n";
        let info = CliExtractor::parse_json(out).unwrap();
        assert_eq!(info.metadata.id, "z");
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(
            CliExtractor::parse_json(b"<html>denied</html>"),
            Err(DownloadError::ParseError(_))
        ));
    }
}

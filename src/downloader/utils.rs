// Helper functions shared by extractor, pipe executor and storage host

use lazy_static::lazy_static;
use regex::Regex;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::warn;

use crate::downloader::models::NetworkConfig;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[\\/:*?"<>|\x00-\x1f;]+"#).unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Spawn `program`, collect its output, and kill it if it outlives
/// `timeout_secs`. Errors are plain strings so `DownloadError::from` can
/// classify them.
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<Output, String> {
    let child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    // Dropping the future on timeout drops the child, which kills it
    match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(output) => output.map_err(|e| format!("Failed to wait for {}: {}", program, e)),
        Err(_) => {
            warn!(program, timeout_secs, "process timed out, killed");
            Err(format!("Timed out after {}s", timeout_secs))
        }
    }
}

/// HTTP client honouring the configured proxy and timeout
pub fn http_client(config: &NetworkConfig) -> Result<reqwest::Client, String> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout.unwrap_or(30) as u64));

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| format!("Invalid proxy URL {}: {}", proxy_url, e))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))
}

/// `--proxy <url>`; the flag is spelled the same for yt-dlp and curl
pub fn get_proxy_args(config: &NetworkConfig) -> Vec<String> {
    config
        .proxy
        .iter()
        .flat_map(|proxy| ["--proxy".to_string(), proxy.clone()])
        .collect()
}

/// yt-dlp only
pub fn get_timeout_args(config: &NetworkConfig) -> Vec<String> {
    config
        .timeout
        .iter()
        .flat_map(|secs| ["--socket-timeout".to_string(), secs.to_string()])
        .collect()
}

/// Turn a title into something safe to use as an upload filename
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, " ");
    let collapsed = WHITESPACE.replace_all(cleaned.trim(), " ");
    let trimmed: String = collapsed.trim_matches('.').chars().take(120).collect();

    if trimmed.trim().is_empty() {
        fallback.to_string()
    } else {
        trimmed.trim().to_string()
    }
}

// Pipe executor - streams extractor stdout straight into a hosted upload
//
// extract (yt-dlp -o -) ──OS pipe──▶ upload (curl -F file=@-) ──stdout──▶ JSON
//
// Nothing is written to local disk and there is no intermediate buffer: the
// extractor blocks on write whenever the uploader reads slower.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::extractors::{CommandSpec, Extractor};
use super::format_selector::FormatSpec;
use super::models::{DeliveryOutcome, NetworkConfig};
use super::utils::{get_proxy_args, http_client};

/// Remote storage: hands out an upload endpoint
#[async_trait]
pub trait StorageHost: Send + Sync {
    /// Preliminary handshake. Errors mean "storage unavailable".
    async fn upload_endpoint(&self) -> Result<String, DownloadError>;
}

/// Runs two processes joined by a pipe
#[async_trait]
pub trait PipeLauncher: Send + Sync {
    async fn run(&self, extract: &CommandSpec, upload: &CommandSpec) -> Result<PipeOutput, DownloadError>;
}

/// What came out of a finished pipe
#[derive(Debug, Clone, Default)]
pub struct PipeOutput {
    /// Upload process stdout, in full
    pub upload_stdout: Vec<u8>,
    pub extract_succeeded: bool,
    pub extract_stderr: String,
}

// ==================== GoFile ====================

#[derive(Debug, Deserialize)]
struct ServersResponse {
    status: String,
    #[serde(default)]
    data: Option<ServersData>,
}

#[derive(Debug, Deserialize)]
struct ServersData {
    /// Current API: list of upload servers
    #[serde(default)]
    servers: Vec<ServerEntry>,
    /// Legacy `getServer` API: single server name
    #[serde(default)]
    server: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    name: String,
}

/// GoFile storage host
pub struct GofileHost {
    api_base: String,
    client: reqwest::Client,
}

impl GofileHost {
    pub fn new(api_base: impl Into<String>, network: &NetworkConfig) -> Result<Self, DownloadError> {
        let client = http_client(network).map_err(DownloadError::HandshakeFailed)?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Turn the handshake body into an upload URL
    fn endpoint_from_body(body: &str) -> Result<String, DownloadError> {
        let resp: ServersResponse = serde_json::from_str(body)
            .map_err(|e| DownloadError::HandshakeFailed(format!("unreadable handshake: {}", e)))?;

        if resp.status != "ok" {
            return Err(DownloadError::HandshakeFailed(format!("status={}", resp.status)));
        }

        let data = resp
            .data
            .ok_or_else(|| DownloadError::HandshakeFailed("no data in handshake".to_string()))?;

        let server = data
            .servers
            .into_iter()
            .map(|s| s.name)
            .next()
            .or(data.server)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DownloadError::HandshakeFailed("no upload server offered".to_string()))?;

        Ok(format!("https://{}.gofile.io/contents/uploadfile", server))
    }
}

#[async_trait]
impl StorageHost for GofileHost {
    async fn upload_endpoint(&self) -> Result<String, DownloadError> {
        let url = format!("{}/servers", self.api_base);
        debug!(%url, "storage handshake");

        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DownloadError::HandshakeFailed(e.to_string()))?
            .text()
            .await
            .map_err(|e| DownloadError::HandshakeFailed(e.to_string()))?;

        Self::endpoint_from_body(&body)
    }
}

// ==================== Process pipe ====================

/// Default wall-clock limit for one streamed upload, in seconds
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 3600;

/// Spawns real processes via argument vectors. Both children are killed if
/// the pipe outlives `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessPipeLauncher {
    timeout: Duration,
}

impl ProcessPipeLauncher {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for ProcessPipeLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_TIMEOUT_SECS)
    }
}

#[async_trait]
impl PipeLauncher for ProcessPipeLauncher {
    async fn run(&self, extract: &CommandSpec, upload: &CommandSpec) -> Result<PipeOutput, DownloadError> {
        let mut extractor = TokioCommand::new(&extract.program)
            .args(&extract.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::ToolNotFound(format!("{}: {}", extract.program, e)))?;

        let extract_stdout = extractor
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture extractor stdout".to_string()))?;
        let mut extract_stderr = extractor
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture extractor stderr".to_string()))?;

        // Hand the read end straight to the uploader's stdin
        let pipe: Stdio = extract_stdout
            .try_into()
            .map_err(|e: std::io::Error| DownloadError::ExecutionError(format!("pipe: {}", e)))?;

        let mut uploader = match TokioCommand::new(&upload.program)
            .args(&upload.args)
            .stdin(pipe)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let _ = extractor.kill().await;
                return Err(DownloadError::ToolNotFound(format!("{}: {}", upload.program, e)));
            }
        };

        let mut upload_stdout = uploader
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture uploader stdout".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = extract_stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        });
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = upload_stdout.read_to_end(&mut buf).await;
            buf
        });

        let waited = timeout(self.timeout, async { tokio::join!(extractor.wait(), uploader.wait()) }).await;
        let Ok((extract_status, upload_status)) = waited else {
            warn!(
                extractor = %extract.program,
                uploader = %upload.program,
                timeout_secs = self.timeout.as_secs(),
                "pipe timed out, killing"
            );
            let _ = extractor.kill().await;
            let _ = uploader.kill().await;
            stderr_task.abort();
            stdout_task.abort();
            return Err(DownloadError::ExtractionFailed(format!(
                "Timed out after {}s",
                self.timeout.as_secs()
            )));
        };
        let extract_status =
            extract_status.map_err(|e| DownloadError::ExecutionError(format!("extractor: {}", e)))?;
        let upload_status =
            upload_status.map_err(|e| DownloadError::ExecutionError(format!("uploader: {}", e)))?;

        let upload_stdout = stdout_task
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("stdout task failed: {}", e)))?;
        let extract_stderr = stderr_task.await.unwrap_or_default();

        debug!(
            extract = ?extract_status.code(),
            upload = ?upload_status.code(),
            bytes = upload_stdout.len(),
            "pipe finished"
        );

        Ok(PipeOutput {
            upload_stdout,
            extract_succeeded: extract_status.success(),
            extract_stderr,
        })
    }
}

// ==================== Executor ====================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    status: String,
    #[serde(default)]
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    #[serde(rename = "downloadPage")]
    download_page: Option<String>,
}

/// Interpret the uploader's full stdout
pub fn parse_upload_response(stdout: &[u8]) -> Result<String, DownloadError> {
    let resp: UploadResponse =
        serde_json::from_slice(stdout).map_err(|_| DownloadError::UpstreamRejected)?;

    if resp.status != "ok" {
        return Err(DownloadError::DeliveryFailed(format!(
            "upload status={}",
            resp.status
        )));
    }

    resp.data
        .and_then(|d| d.download_page)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DownloadError::DeliveryFailed("upload returned no download page".to_string()))
}

pub struct PipeExecutor {
    host: Arc<dyn StorageHost>,
    launcher: Arc<dyn PipeLauncher>,
    curl_path: String,
    network: NetworkConfig,
}

impl PipeExecutor {
    pub fn new(
        host: Arc<dyn StorageHost>,
        launcher: Arc<dyn PipeLauncher>,
        curl_path: impl Into<String>,
        network: NetworkConfig,
    ) -> Self {
        Self {
            host,
            launcher,
            curl_path: curl_path.into(),
            network,
        }
    }

    /// Multipart upload of stdin, tagged with `filename`
    fn upload_command(&self, endpoint: &str, filename: &str) -> CommandSpec {
        let mut args = vec![
            "--silent".to_string(),
            "--show-error".to_string(),
            "-X".to_string(),
            "POST".to_string(),
            "-F".to_string(),
            format!("file=@-;filename={}", filename),
        ];
        args.extend(get_proxy_args(&self.network));
        args.push(endpoint.to_string());
        CommandSpec::new(self.curl_path.clone(), args)
    }

    /// Single attempt, no retry. Every error becomes a `Failure` outcome.
    pub async fn execute(
        &self,
        extractor: &dyn Extractor,
        url: &str,
        spec: &FormatSpec,
        filename: &str,
    ) -> DeliveryOutcome {
        match self.try_execute(extractor, url, spec, filename).await {
            Ok(link) => {
                info!(url, %link, "stream upload finished");
                DeliveryOutcome::HostedLink { url: link }
            }
            Err(e) => {
                warn!(url, error = %e, "stream upload failed");
                DeliveryOutcome::failure(e.reason())
            }
        }
    }

    async fn try_execute(
        &self,
        extractor: &dyn Extractor,
        url: &str,
        spec: &FormatSpec,
        filename: &str,
    ) -> Result<String, DownloadError> {
        let endpoint = self.host.upload_endpoint().await?;
        info!(url, %endpoint, filename, "streaming to hosted storage");

        let extract = extractor.stream_command(url, spec);
        let upload = self.upload_command(&endpoint, filename);
        let output = self.launcher.run(&extract, &upload).await?;

        // A non-conformant response wins over everything else: it is what an
        // empty pipe (private/blocked source) looks like from here.
        let link = parse_upload_response(&output.upload_stdout)?;

        if !output.extract_succeeded {
            return Err(DownloadError::ExtractionFailed(output.extract_stderr));
        }

        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_json_is_rejected() {
        for body in [&b"<html>403 Forbidden</html>"[..], b"", b"\x00\xff\xfe", b"{\"status\":"] {
            assert_eq!(parse_upload_response(body), Err(DownloadError::UpstreamRejected));
        }
    }

    #[test]
    fn test_ok_response_yields_link() {
        let body = br#"{"status":"ok","data":{"downloadPage":"https://gofile.io/d/AbC","code":"AbC"}}"#;
        assert_eq!(parse_upload_response(body).unwrap(), "https://gofile.io/d/AbC");
    }

    #[test]
    fn test_error_status_is_failure() {
        let body = br#"{"status":"error-rateLimit","data":{}}"#;
        assert!(matches!(
            parse_upload_response(body),
            Err(DownloadError::DeliveryFailed(_))
        ));
    }

    #[test]
    fn test_handshake_shapes() {
        let current = r#"{"status":"ok","data":{"servers":[{"name":"store7","zone":"eu"}]}}"#;
        assert_eq!(
            GofileHost::endpoint_from_body(current).unwrap(),
            "https://store7.gofile.io/contents/uploadfile"
        );

        let legacy = r#"{"status":"ok","data":{"server":"store3"}}"#;
        assert_eq!(
            GofileHost::endpoint_from_body(legacy).unwrap(),
            "https://store3.gofile.io/contents/uploadfile"
        );

        let bad = r#"{"status":"noServer"}"#;
        assert!(matches!(
            GofileHost::endpoint_from_body(bad),
            Err(DownloadError::HandshakeFailed(_))
        ));
        assert!(GofileHost::endpoint_from_body("<html>").is_err());
    }

    #[test]
    fn test_upload_command_tags_filename() {
        struct NoHost;
        #[async_trait]
        impl StorageHost for NoHost {
            async fn upload_endpoint(&self) -> Result<String, DownloadError> {
                Err(DownloadError::HandshakeFailed("unused".to_string()))
            }
        }

        let exec = PipeExecutor::new(
            Arc::new(NoHost),
            Arc::new(ProcessPipeLauncher::default()),
            "curl",
            NetworkConfig::default(),
        );
        let cmd = exec.upload_command("https://store1.gofile.io/contents/uploadfile", "My Song.m4a");
        assert_eq!(cmd.program, "curl");
        assert!(cmd.args.contains(&"file=@-;filename=My Song.m4a".to_string()));
        assert_eq!(
            cmd.args.last().map(String::as_str),
            Some("https://store1.gofile.io/contents/uploadfile")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_pipe_moves_bytes() {
        let extract = CommandSpec::new("printf", vec!["hello".to_string()]);
        let upload = CommandSpec::new("cat", vec![]);
        let out = ProcessPipeLauncher::default().run(&extract, &upload).await.unwrap();
        assert_eq!(out.upload_stdout, b"hello");
        assert!(out.extract_succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_pipe_empty_source() {
        let extract = CommandSpec::new("false", vec![]);
        let upload = CommandSpec::new("cat", vec![]);
        let out = ProcessPipeLauncher::default().run(&extract, &upload).await.unwrap();
        assert!(out.upload_stdout.is_empty());
        assert!(!out.extract_succeeded);
        assert_eq!(
            parse_upload_response(&out.upload_stdout),
            Err(DownloadError::UpstreamRejected)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stalled_pipe_is_killed_at_deadline() {
        let extract = CommandSpec::new("sleep", vec!["30".to_string()]);
        let upload = CommandSpec::new("cat", vec![]);
        let started = std::time::Instant::now();

        let res = ProcessPipeLauncher::new(1).run(&extract, &upload).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        match res {
            Err(DownloadError::ExtractionFailed(msg)) => assert!(msg.starts_with("Timed out")),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }
}

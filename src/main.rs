// media-router command line
//
//   fetch  - run one request end to end, save a local file or print the link
//   probe  - show the size estimate and routing decision only
//   chat   - drive the menu state machine from stdin
//   tools  - report the external executables

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use media_router::dispatch::{self, parse_media_url, Dispatcher, InboundEvent, OutboundMessage, Transport};
use media_router::downloader::tools::ToolManager;
use media_router::downloader::{DownloadError, MediaKind, ProgressSink, Quality, SelectionRequest};
use media_router::selection::SelectionMachine;
use media_router::session::{ConversationId, SessionStore};
use media_router::RouterConfig;

#[derive(Parser)]
#[command(name = "media-router")]
#[command(about = "Probe, stream or fetch media for a chat front-end", version)]
struct Cli {
    #[command(flatten)]
    config: RouterConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Acquire one URL without the menu
    Fetch {
        url: String,
        #[arg(long, value_enum, default_value_t = KindArg::Video)]
        kind: KindArg,
        /// 1080, 720, 480, 360 or best
        #[arg(long, default_value = "best")]
        quality: String,
        /// Where the finished local file is copied
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Size probe and route decision, no download
    Probe {
        url: String,
        #[arg(long, value_enum, default_value_t = KindArg::Video)]
        kind: KindArg,
        #[arg(long, default_value = "best")]
        quality: String,
    },
    /// Interactive console front-end; type a URL, then button payloads like `type|video`
    Chat {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Show paths and versions of yt-dlp, curl and ffmpeg
    Tools,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Mp3,
    Video,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Mp3 => MediaKind::Audio,
            KindArg::Video => MediaKind::Video,
        }
    }
}

fn parse_quality(kind: MediaKind, raw: &str) -> anyhow::Result<Quality> {
    if kind == MediaKind::Audio || raw.eq_ignore_ascii_case("best") {
        return Ok(Quality::Best);
    }
    match format!("qual|{}", raw.trim_end_matches('p')).parse() {
        Ok(media_router::Callback::Quality(q)) => Ok(q),
        _ => bail!("unsupported quality '{}': use 1080, 720, 480, 360 or best", raw),
    }
}

fn request_from_args(url: &str, kind: KindArg, quality: &str) -> anyhow::Result<SelectionRequest> {
    let Some(url) = parse_media_url(url) else {
        bail!("not an http(s) URL: {}", url);
    };
    let kind = MediaKind::from(kind);
    Ok(SelectionRequest::new(url.as_str(), kind, parse_quality(kind, quality)?))
}

/// Prints replies; local files are copied to `out_dir` before the
/// originals are cleaned up
struct ConsoleTransport {
    out_dir: PathBuf,
}

impl ConsoleTransport {
    async fn keep_copy(&self, path: &Path) -> Result<PathBuf, DownloadError> {
        let name = path
            .file_name()
            .ok_or_else(|| DownloadError::DeliveryFailed("artifact has no file name".to_string()))?;
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|e| DownloadError::DeliveryFailed(e.to_string()))?;
        let dest = self.out_dir.join(name);
        tokio::fs::copy(path, &dest)
            .await
            .map_err(|e| DownloadError::DeliveryFailed(e.to_string()))?;
        Ok(dest)
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, conversation: ConversationId, message: OutboundMessage) -> Result<(), DownloadError> {
        match message {
            OutboundMessage::Menu(menu) => {
                println!("[{}] {}", conversation, menu.text);
                for row in &menu.buttons {
                    let row: Vec<String> = row
                        .iter()
                        .map(|b| format!("{} <{}>", b.label, b.payload))
                        .collect();
                    println!("    {}", row.join("   "));
                }
            }
            OutboundMessage::Progress(text) | OutboundMessage::Text(text) | OutboundMessage::Error(text) => {
                println!("[{}] {}", conversation, text)
            }
            OutboundMessage::Link(markdown) => println!("[{}] {}", conversation, markdown),
            OutboundMessage::File { path, title, author } => {
                let saved = self.keep_copy(&path).await?;
                println!("[{}] 📁 {} - {} -> {}", conversation, title, author, saved.display());
            }
        }
        Ok(())
    }
}

struct ConsoleProgress;

#[async_trait]
impl ProgressSink for ConsoleProgress {
    async fn emit(&self, status: &str) {
        eprintln!("{}", status);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("media_router=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Command::Tools => {
            let tools = ToolManager::new().get_all_tools();
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Command::Probe { url, kind, quality } => {
            let request = request_from_args(&url, kind, &quality)?;
            let router = config.build_router().context("building router")?;
            let (spec, report, route) = router.plan(&request).await;
            let summary = serde_json::json!({
                "url": request.url,
                "selector": spec.selector(),
                "estimate": report.estimate.to_string(),
                "bytes": report.estimate.bytes(),
                "title": report.metadata.as_ref().map(|m| m.title.clone()),
                "threshold": router.threshold_bytes(),
                "route": route.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Fetch { url, kind, quality, out } => {
            let request = request_from_args(&url, kind, &quality)?;
            let router = config.build_router().context("building router")?;
            let transport = ConsoleTransport { out_dir: out };
            let conversation: ConversationId = 0;
            let request_id = dispatch::new_request_id(conversation);

            let outcome = router.acquire(&request, &request_id, &ConsoleProgress).await;
            let failed = outcome.is_failure();
            dispatch::deliver(&transport, conversation, outcome).await;
            if failed {
                std::process::exit(1);
            }
        }
        Command::Chat { out } => {
            let router = Arc::new(config.build_router().context("building router")?);
            let sessions = Arc::new(SessionStore::new(config.eviction_policy()));
            let machine = Arc::new(SelectionMachine::new(sessions));
            let transport: Arc<dyn Transport> = Arc::new(ConsoleTransport { out_dir: out });
            let dispatcher = Dispatcher::new(machine, router, transport);

            info!(threshold = config.threshold_bytes, "console chat ready");
            println!("{}", dispatch::USAGE_HINT);

            let conversation: ConversationId = 1;
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut in_flight = Vec::new();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let event = if parse_media_url(line).is_none() && line.contains('|') {
                    InboundEvent::callback(conversation, line)
                } else {
                    InboundEvent::text(conversation, line)
                };
                if let Some(handle) = dispatcher.handle(event).await {
                    in_flight.push(handle);
                }
            }

            for handle in in_flight {
                if let Err(e) = handle.await {
                    warn!(error = %e, "request task aborted");
                }
            }
        }
    }

    Ok(())
}

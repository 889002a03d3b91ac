// Inbound events in, outbound messages out
//
// Menu navigation is answered inline. A resolved selection is handed to its
// own task so a slow probe or upload never holds up other conversations.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::downloader::{DeliveryOutcome, DownloadError, MediaRouter, ProgressSink, SelectionRequest};
use crate::selection::{Menu, SelectionMachine, Step};
use crate::session::ConversationId;

pub const USAGE_HINT: &str = "👋 Send me a link (http or https) to a video and I'll fetch it for you.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    Text(String),
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub conversation: ConversationId,
    pub payload: InboundPayload,
}

impl InboundEvent {
    pub fn text(conversation: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation,
            payload: InboundPayload::Text(text.into()),
        }
    }

    pub fn callback(conversation: ConversationId, payload: impl Into<String>) -> Self {
        Self {
            conversation,
            payload: InboundPayload::Callback(payload.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Menu(Menu),
    Progress(String),
    /// The file at `path` is only guaranteed to exist until `send` returns
    File {
        path: PathBuf,
        title: String,
        author: String,
    },
    /// Markdown
    Link(String),
    Error(String),
    Text(String),
}

/// The messaging surface replies are rendered on
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, conversation: ConversationId, message: OutboundMessage) -> Result<(), DownloadError>;
}

/// Accept only absolute http(s) URLs
pub fn parse_media_url(text: &str) -> Option<Url> {
    let url = Url::parse(text.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

pub fn new_request_id(conversation: ConversationId) -> String {
    format!("{}-{}", conversation, Uuid::new_v4().simple())
}

pub fn link_markdown(url: &str) -> String {
    format!("✅ Uploaded to hosted storage.\n[📥 Download]({})", url)
}

struct TransportProgress {
    transport: Arc<dyn Transport>,
    conversation: ConversationId,
}

#[async_trait]
impl ProgressSink for TransportProgress {
    async fn emit(&self, status: &str) {
        let message = OutboundMessage::Progress(status.to_string());
        if let Err(e) = self.transport.send(self.conversation, message).await {
            debug!(conversation = self.conversation, error = %e, "progress update dropped");
        }
    }
}

pub struct Dispatcher {
    machine: Arc<SelectionMachine>,
    router: Arc<MediaRouter>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(machine: Arc<SelectionMachine>, router: Arc<MediaRouter>, transport: Arc<dyn Transport>) -> Self {
        Self {
            machine,
            router,
            transport,
        }
    }

    /// Answer one event. Returns the handle of the spawned request task when
    /// the event completed a selection.
    pub async fn handle(&self, event: InboundEvent) -> Option<JoinHandle<()>> {
        let conversation = event.conversation;
        let step = match &event.payload {
            InboundPayload::Text(text) => match parse_media_url(text) {
                Some(url) => self.machine.submit_url(conversation, url.as_str()),
                None => {
                    self.reply(conversation, OutboundMessage::Text(USAGE_HINT.to_string()))
                        .await;
                    return None;
                }
            },
            InboundPayload::Callback(payload) => self.machine.handle_callback(conversation, payload),
        };

        match step {
            Step::Menu(menu) => {
                self.reply(conversation, OutboundMessage::Menu(menu)).await;
                None
            }
            Step::Rejected(text) => {
                self.reply(conversation, OutboundMessage::Error(text)).await;
                None
            }
            Step::Resolved(request) => Some(self.spawn_request(conversation, request)),
        }
    }

    fn spawn_request(&self, conversation: ConversationId, request: SelectionRequest) -> JoinHandle<()> {
        let router = Arc::clone(&self.router);
        let transport = Arc::clone(&self.transport);
        let request_id = new_request_id(conversation);
        info!(conversation, request_id = %request_id, url = %request.url, kind = %request.kind, "request accepted");

        tokio::spawn(async move {
            let progress = TransportProgress {
                transport: Arc::clone(&transport),
                conversation,
            };
            let outcome = router.acquire(&request, &request_id, &progress).await;
            deliver(transport.as_ref(), conversation, outcome).await;
        })
    }

    async fn reply(&self, conversation: ConversationId, message: OutboundMessage) {
        if let Err(e) = self.transport.send(conversation, message).await {
            warn!(conversation, error = %e, "reply failed");
        }
    }
}

/// Render a terminal outcome. A local artifact is dropped, and its files
/// removed, only after the transport has finished with it.
pub async fn deliver(transport: &dyn Transport, conversation: ConversationId, outcome: DeliveryOutcome) {
    let message = match outcome {
        DeliveryOutcome::LocalFile(artifact) => {
            let message = OutboundMessage::File {
                path: artifact.path.clone(),
                title: artifact.title.clone(),
                author: artifact.author.clone(),
            };
            let sent = transport.send(conversation, message).await;
            drop(artifact);
            match sent {
                Ok(()) => return,
                Err(e) => {
                    let e = match e {
                        DownloadError::DeliveryFailed(_) => e,
                        other => DownloadError::DeliveryFailed(other.to_string()),
                    };
                    error!(conversation, error = %e, "file delivery failed");
                    OutboundMessage::Error(e.user_message())
                }
            }
        }
        DeliveryOutcome::HostedLink { url } => OutboundMessage::Link(link_markdown(&url)),
        DeliveryOutcome::Failure { reason } => {
            warn!(conversation, reason = %reason, "request failed");
            OutboundMessage::Error(format!("❌ {}", reason))
        }
    };

    if let Err(e) = transport.send(conversation, message).await {
        error!(conversation, error = %e, "could not report outcome");
    }
}

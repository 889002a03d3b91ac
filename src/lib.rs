// Media acquisition router
//
// A chat front-end hands over "format F, quality Q, for URL U"; the router
// probes the size and either streams the payload straight to hosted storage
// or fetches and post-processes it locally for direct delivery.

pub mod config;
pub mod dispatch;
pub mod downloader;
pub mod quota;
pub mod selection;
pub mod session;

pub use config::RouterConfig;
pub use dispatch::{Dispatcher, InboundEvent, InboundPayload, OutboundMessage, Transport};
pub use downloader::{DeliveryOutcome, DownloadError, MediaRouter, SelectionRequest};
pub use selection::{Callback, SelectionMachine, SelectionState};
pub use session::{ConversationId, SessionStore};

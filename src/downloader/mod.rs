// Downloader module - the media acquisition core
//
// selection → FormatSpec → size probe → router → {pipe executor | local fetch}

pub mod errors;
pub mod extractors;
pub mod fetch;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod pipe;
pub mod probe;
pub mod router;
pub mod tools;
pub mod traits;
pub mod utils;

pub use errors::DownloadError;
pub use format_selector::{FormatSpec, QUALITY_LADDER};
pub use models::{DeliveryOutcome, LocalArtifact, MediaKind, Quality, SelectionRequest, SizeEstimate};
pub use orchestrator::MediaRouter;
pub use router::{route, Route, DEFAULT_THRESHOLD_BYTES};
pub use traits::{NoProgress, ProgressSink};

// Extraction collaborator
//
// The `Extractor` trait is the seam between the router and whatever resolves
// a URL into metadata and payload bytes. `CliExtractor` drives the native
// yt-dlp binary; tests substitute stubs.

mod cli;
mod diagnostics;
mod traits;

pub use cli::CliExtractor;
pub use diagnostics::{diagnose_error, BlockingReason};
pub use traits::{CommandSpec, Extractor, ExtractorConfig, FetchTarget};

// Progress reporting seam

use async_trait::async_trait;

/// Receives human-readable progress lines while a request runs
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, status: &str);
}

/// Drops every update
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn emit(&self, _status: &str) {}
}

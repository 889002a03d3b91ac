// Delivery router - picks the execution path from a size estimate

use serde::{Deserialize, Serialize};
use std::fmt;

use super::models::SizeEstimate;

/// Default threshold: the messaging surface's 50 MB attachment ceiling
pub const DEFAULT_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Pipe extractor output straight into a hosted upload
    Stream,
    /// Download locally, post-process, send as attachment
    LocalFetch,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::LocalFetch => write!(f, "local-fetch"),
        }
    }
}

/// Unknown sizes stream: they might exceed the attachment ceiling.
pub fn route(estimate: SizeEstimate, threshold_bytes: u64) -> Route {
    match estimate {
        SizeEstimate::Bytes(bytes) if bytes <= threshold_bytes => Route::LocalFetch,
        _ => Route::Stream,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary() {
        let t = 1_000;
        assert_eq!(route(SizeEstimate::Bytes(t - 1), t), Route::LocalFetch);
        assert_eq!(route(SizeEstimate::Bytes(t), t), Route::LocalFetch);
        assert_eq!(route(SizeEstimate::Bytes(t + 1), t), Route::Stream);
    }

    #[test]
    fn test_unknown_always_streams() {
        for t in [0, 1, DEFAULT_THRESHOLD_BYTES, u64::MAX] {
            assert_eq!(route(SizeEstimate::Unknown, t), Route::Stream);
        }
    }

    #[test]
    fn test_route_matches_rule_across_grid() {
        let values = [0u64, 1, 2, 49, 50, 51, DEFAULT_THRESHOLD_BYTES, u64::MAX - 1, u64::MAX];
        for &t in &values {
            for &b in &values {
                let expected = if b > t { Route::Stream } else { Route::LocalFetch };
                assert_eq!(route(SizeEstimate::Bytes(b), t), expected, "bytes={} t={}", b, t);
            }
        }
    }

    #[test]
    fn test_scenario_thirty_megabytes() {
        assert_eq!(
            route(SizeEstimate::Bytes(30_000_000), 50_000_000),
            Route::LocalFetch
        );
    }
}

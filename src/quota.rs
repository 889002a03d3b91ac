// Daily quota / ban ledger interface
//
// Used by the relay feature only; the acquisition pipeline never calls it.
// Days roll over at local midnight in a fixed offset, not in UTC.

use async_trait::async_trait;
use time::macros::offset;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::downloader::DownloadError;

pub type UserId = i64;

pub const DEFAULT_DAY_OFFSET: UtcOffset = offset!(+8);

#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Count one use for `user` on the current calendar day and return the
    /// count including this one
    async fn check_and_increment(&self, user: UserId) -> Result<u32, DownloadError>;

    async fn is_banned(&self, user: UserId) -> Result<bool, DownloadError>;
}

/// Calendar date of `now` as seen at `offset`
pub fn calendar_day(now: OffsetDateTime, offset: UtcOffset) -> Date {
    now.to_offset(offset).date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_day_rolls_at_local_midnight() {
        // 15:59 UTC is 23:59 at +08:00
        let before = datetime!(2024-03-01 15:59 UTC);
        let after = datetime!(2024-03-01 16:00 UTC);
        assert_eq!(calendar_day(before, DEFAULT_DAY_OFFSET), time::macros::date!(2024-03-01));
        assert_eq!(calendar_day(after, DEFAULT_DAY_OFFSET), time::macros::date!(2024-03-02));
    }

    #[test]
    fn test_utc_offset() {
        let now = datetime!(2024-12-31 23:30 UTC);
        assert_eq!(calendar_day(now, UtcOffset::UTC), time::macros::date!(2024-12-31));
        assert_eq!(calendar_day(now, DEFAULT_DAY_OFFSET), time::macros::date!(2025-01-01));
    }
}

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_TIME_WINDOW_SECONDS: i64 = 86_400;

/// Inclusive time range used to select samples for window queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Fills in missing edges: `end` defaults to `now`, `start` to `end - span`.
    /// `span` is ignored when `start` is given.
    ///
    /// Returns `None` when `end - span` falls outside the representable range.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        span: Duration,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let end = end.unwrap_or(now);
        let start = match start {
            Some(start) => start,
            None => end.checked_sub_signed(span)?,
        };
        Some(TimeRange { start, end })
    }
}

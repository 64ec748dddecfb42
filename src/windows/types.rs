use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A maximal run of daylight samples.
///
/// A `None` edge means the run touches that end of the observed sequence,
/// so the real transition time is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Window {
    #[serde(rename = "start_time")]
    pub start: Option<DateTime<Utc>>,
    #[serde(rename = "end_time")]
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Window { start, end }
    }

    pub fn unbounded() -> Self {
        Window {
            start: None,
            end: None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.end? - self.start?)
    }
}

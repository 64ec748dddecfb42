use std::time::Duration;

pub const DEFAULT_WAIT_TIME_SECONDS: u64 = 20;

/// Interval between two poll ticks, always a positive number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTime(u64);

impl WaitTime {
    pub fn from_secs(secs: i64) -> Option<Self> {
        u64::try_from(secs).ok().filter(|s| *s > 0).map(WaitTime)
    }

    /// Uses `requested` when it is a valid interval, `fallback` otherwise.
    pub fn resolve(requested: Option<i64>, fallback: WaitTime) -> Self {
        match requested {
            Some(secs) => Self::from_secs(secs).unwrap_or_else(|| {
                log::warn!(
                    "Invalid wait time {}s, using {}s",
                    secs,
                    fallback.as_secs()
                );
                fallback
            }),
            None => fallback,
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for WaitTime {
    fn default() -> Self {
        WaitTime(DEFAULT_WAIT_TIME_SECONDS)
    }
}

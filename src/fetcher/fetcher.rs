use std::time::Duration;

use super::error::FetchError;
use super::transport::Transport;
use crate::position::PositionSample;

pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

pub struct Fetcher<T> {
    transport: T,
    url: String,
    policy: RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, url: impl Into<String>) -> Self {
        Self::with_policy(transport, url, RetryPolicy::default())
    }

    pub fn with_policy(transport: T, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            url: url.into(),
            policy,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the current position, retrying transport failures with a
    /// fixed delay. Every failure ends in `None`; the caller simply skips
    /// the tick.
    pub async fn fetch(&self) -> Option<PositionSample> {
        let mut retries = 0;
        loop {
            log::debug!("Requesting {} (attempt {})", self.url, retries + 1);
            match self.attempt().await {
                Ok(sample) => return Some(sample),
                Err(e) if e.is_transient() && retries < self.policy.max_retries => {
                    retries += 1;
                    log::warn!(
                        "Could not get {}: {}. Retry {} of {}",
                        self.url,
                        e,
                        retries,
                        self.policy.max_retries
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(e) if e.is_transient() => {
                    log::error!(
                        "Could not get {}: maximum number of retries ({}) exceeded, \
                         will retry at next scheduled time: {}",
                        self.url,
                        self.policy.max_retries,
                        e
                    );
                    return None;
                }
                Err(e) => {
                    log::error!(
                        "Could not get {}, will retry at next scheduled time: {}",
                        self.url,
                        e
                    );
                    return None;
                }
            }
        }
    }

    async fn attempt(&self) -> Result<PositionSample, FetchError> {
        let json = self.transport.get_json(&self.url).await?;
        Ok(PositionSample::from_json(json)?)
    }
}

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

use super::api::error::ApiError;

/// Above this many tracked keys, idle ones are dropped on the next check.
const PRUNE_THRESHOLD: usize = 1024;

/// Sliding-window limiter keyed by client address and route.
#[derive(Clone)]
pub struct RateLimiter {
    limit: usize,
    period: Duration,
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(limit: usize, period: Duration) -> Self {
        Self {
            limit,
            period,
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `None` when limiting is switched off or the budget is unusable.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        if config.limit == 0 || config.period_seconds == 0 {
            log::warn!(
                "Ignoring rate limit of {} per {}s, both must be positive",
                config.limit,
                config.period_seconds
            );
            return None;
        }
        log::info!(
            "Limiting /iss routes to {} requests per {}s per client",
            config.limit,
            config.period_seconds
        );
        Some(Self::new(
            config.limit,
            Duration::from_secs(config.period_seconds),
        ))
    }

    /// Records the request and returns `true` if it fits the budget.
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        if requests.len() > PRUNE_THRESHOLD {
            let period = self.period;
            requests.retain(|_, seen| {
                seen.retain(|&t| now.duration_since(t) < period);
                !seen.is_empty()
            });
        }

        let seen = requests.entry(key.to_string()).or_default();
        seen.retain(|&t| now.duration_since(t) < self.period);
        if seen.len() >= self.limit {
            log::warn!(
                "Rate limit exceeded for {} ({}/{} in {}s)",
                key,
                seen.len(),
                self.limit,
                self.period.as_secs()
            );
            return false;
        }
        seen.push(now);
        true
    }

    fn describe(&self) -> String {
        format!("{} per {} second(s)", self.limit, self.period.as_secs())
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = format!("{} {}", peer_addr(&request), request.uri().path());
    if !limiter.check(&key).await {
        return ApiError::RateLimited(limiter.describe()).into_response();
    }
    next.run(request).await
}

fn peer_addr(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

//! Per-client sliding-window rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::RateLimit;
use crate::error::AppError;

pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &RateLimit) -> Self {
        Self::new(cfg.window(), cfg.max_requests)
    }

    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    /// Records a hit for `key` at `now` unless the key already has
    /// `max_requests` hits inside the window, in which case it is refused and
    /// nothing is recorded.
    pub async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = self.requests.lock().await;
        let hits = requests.entry(key.to_string()).or_default();
        hits.retain(|t| now.saturating_duration_since(*t) < self.window);

        if hits.len() >= self.max_requests {
            return false;
        }
        hits.push(now);
        true
    }

    /// Drops clients with no hit inside the window. Returns how many were removed.
    pub async fn prune_at(&self, now: Instant) -> usize {
        let mut requests = self.requests.lock().await;
        let before = requests.len();
        requests.retain(|_, hits| {
            hits.retain(|t| now.saturating_duration_since(*t) < self.window);
            !hits.is_empty()
        });
        before - requests.len()
    }

    pub fn spawn_pruner(self: Arc<Self>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.window.max(Duration::from_secs(1)));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = self.prune_at(Instant::now()).await;
                        if removed > 0 {
                            tracing::debug!(removed, "pruned idle rate limit entries");
                        }
                    }
                    _ = token.cancelled() => {
                        tracing::info!("rate limit pruner shutting down");
                        break;
                    }
                }
            }
        })
    }
}

pub async fn rate_limit(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !limiter.check(&client).await {
        tracing::warn!(client = %client, "rate limit exceeded");
        return AppError::TooManyRequests.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_once_limit_reached() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let now = Instant::now();

        assert!(limiter.check_at("1.1.1.1", now).await);
        assert!(limiter.check_at("1.1.1.1", now).await);
        assert!(!limiter.check_at("1.1.1.1", now).await);
        assert!(limiter.check_at("2.2.2.2", now).await);
    }

    #[tokio::test]
    async fn window_slides() {
        let window = Duration::from_secs(60);
        let limiter = RateLimiter::new(window, 1);
        let start = Instant::now();

        assert!(limiter.check_at("ip", start).await);
        assert!(!limiter.check_at("ip", start + Duration::from_secs(59)).await);
        assert!(limiter.check_at("ip", start + window).await);
    }

    #[tokio::test]
    async fn prune_drops_idle_clients() {
        let window = Duration::from_secs(10);
        let limiter = RateLimiter::new(window, 5);
        let start = Instant::now();
        limiter.check_at("old", start).await;
        limiter.check_at("fresh", start + Duration::from_secs(9)).await;

        assert_eq!(limiter.prune_at(start + window).await, 1);
        assert_eq!(limiter.prune_at(start + window).await, 0);
    }
}

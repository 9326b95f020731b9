use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::RateLimitConfig;

/// Path prefix whose requests count against the limit.
pub const LIMITED_PREFIX: &str = "/api";

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Above this many tracked clients, idle entries are swept on the next check.
const SWEEP_THRESHOLD: usize = 1024;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Outcome of a rate limit check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        remaining: usize,
        reset_after: Duration,
    },
    Limited {
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Time until the oldest request in the client's window expires.
    pub fn reset_after(&self) -> Duration {
        match self {
            RateDecision::Allowed { reset_after, .. } => *reset_after,
            RateDecision::Limited { retry_after } => *retry_after,
        }
    }

    pub fn remaining(&self) -> usize {
        match self {
            RateDecision::Allowed { remaining, .. } => *remaining,
            RateDecision::Limited { .. } => 0,
        }
    }
}

/// Per-client rolling window limiter.
///
/// Each client keeps the instants of its accepted requests inside the window; a request
/// is accepted while fewer than `max_requests` instants remain. Rejected requests are
/// not recorded. Clients without a known peer address share one bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Arc<Mutex<HashMap<Option<IpAddr>, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub async fn check(&self, client: Option<IpAddr>) -> RateDecision {
        self.check_at(client, Instant::now()).await
    }

    pub(crate) async fn check_at(&self, client: Option<IpAddr>, now: Instant) -> RateDecision {
        let window = self.config.window;
        let mut clients = self.clients.lock().await;

        if clients.len() > SWEEP_THRESHOLD {
            clients.retain(|_, log| {
                log.back()
                    .is_some_and(|last| now.saturating_duration_since(*last) < window)
            });
        }

        let log = clients.entry(client).or_default();
        while log
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) >= window)
        {
            log.pop_front();
        }

        if log.len() < self.config.max_requests {
            log.push_back(now);
            return RateDecision::Allowed {
                remaining: self.config.max_requests - log.len(),
                reset_after: time_to_reset(log, now, window),
            };
        }

        RateDecision::Limited {
            retry_after: time_to_reset(log, now, window),
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }
}

fn time_to_reset(log: &VecDeque<Instant>, now: Instant, window: Duration) -> Duration {
    log.front()
        .map(|first| window.saturating_sub(now.saturating_duration_since(*first)))
        .unwrap_or(window)
}

fn is_limited_path(path: &str) -> bool {
    path == LIMITED_PREFIX
        || path
            .strip_prefix(LIMITED_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Middleware rejecting `/api` requests beyond the per-client ceiling before they reach
/// any handler. Every limited-path response carries `X-RateLimit-Limit`,
/// `X-RateLimit-Remaining` and `X-RateLimit-Reset` (unix seconds).
pub async fn enforce_rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if !is_limited_path(request.uri().path()) {
        return next.run(request).await;
    }

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical());

    let decision = limiter.check(client).await;
    let mut response = match decision {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            warn!(client = ?client, path = %request.uri().path(), "rate limit exceeded");
            limited_response(retry_after)
        }
    };

    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(LIMIT_HEADER),
        HeaderValue::from(limiter.config.max_requests),
    );
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(decision.remaining()),
    );
    headers.insert(
        HeaderName::from_static(RESET_HEADER),
        HeaderValue::from(reset_timestamp(decision.reset_after())),
    );
    response
}

fn reset_timestamp(reset_after: Duration) -> u64 {
    let reset_at = SystemTime::now() + reset_after;
    let since_epoch = reset_at.duration_since(UNIX_EPOCH).unwrap_or_default();
    since_epoch.as_secs_f64().ceil() as u64
}

fn limited_response(retry_after: Duration) -> Response {
    let seconds = retry_after.as_secs_f64().ceil().max(1.0) as u64;
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": RATE_LIMITED_MESSAGE })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    response
}

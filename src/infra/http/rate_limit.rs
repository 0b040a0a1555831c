use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use dashmap::DashMap;
use metrics::{counter, gauge};

use crate::config::RateLimitSettings;

/// Endpoint name that carries its own, stricter limit.
pub const SEARCH_ENDPOINT: &str = "search";

const FALLBACK_CLIENT: &str = "127.0.0.1";
const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRule {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateRule {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Sliding-window log keyed by `client:endpoint`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    default_rule: RateRule,
    search_rule: RateRule,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(default_rule: RateRule, search_rule: RateRule) -> Self {
        Self {
            default_rule,
            search_rule,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(
            RateRule::new(
                Duration::from_secs(u64::from(settings.window_seconds.get())),
                settings.max_requests.get(),
            ),
            RateRule::new(
                Duration::from_secs(u64::from(settings.search_window_seconds.get())),
                settings.search_max_requests.get(),
            ),
        )
    }

    pub fn rule_for(&self, endpoint: &str) -> RateRule {
        if endpoint == SEARCH_ENDPOINT {
            self.search_rule
        } else {
            self.default_rule
        }
    }

    pub fn allow(&self, client: &str, endpoint: &str) -> RateDecision {
        self.allow_at(client, endpoint, Instant::now())
    }

    fn allow_at(&self, client: &str, endpoint: &str, now: Instant) -> RateDecision {
        let rule = self.rule_for(endpoint);
        let bucket_key = format!("{client}:{endpoint}");

        let decision = {
            let mut entry = self.buckets.entry(bucket_key).or_default();
            entry.retain(|instant| now.saturating_duration_since(*instant) < rule.window);

            let remaining = rule.max_requests.saturating_sub(entry.len() as u32);
            if remaining == 0 {
                RateDecision {
                    allowed: false,
                    remaining: 0,
                }
            } else {
                entry.push(now);
                RateDecision {
                    allowed: true,
                    remaining: remaining - 1,
                }
            }
        };

        gauge!("bookshelf_rate_limit_clients").set(self.buckets.len() as f64);
        if !decision.allowed {
            counter!("bookshelf_rate_limited_total", "endpoint" => endpoint.to_string())
                .increment(1);
        }
        decision
    }

    /// Drops buckets whose every entry has left its window.
    pub fn prune(&self) {
        let now = Instant::now();
        let default_window = self.default_rule.window;
        let search_window = self.search_rule.window;
        self.buckets.retain(|key, entries| {
            let window = if key.ends_with(&format!(":{SEARCH_ENDPOINT}")) {
                search_window
            } else {
                default_window
            };
            entries.retain(|instant| now.saturating_duration_since(*instant) < window);
            !entries.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Resolves the key a caller is rate limited under.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_CLIENT.to_string())
}

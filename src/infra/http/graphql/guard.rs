use async_graphql::{Context, ErrorExtensions, Guard, Result};
use tracing::debug;

use crate::infra::http::middleware::ClientIdentity;
use crate::infra::http::rate_limit::RateLimiter;

pub const THROTTLED_MESSAGE: &str = "ThrottlerException: Too Many Requests";
pub const THROTTLED_CODE: &str = "TOO_MANY_REQUESTS";

const FALLBACK_CLIENT: &str = "127.0.0.1";

/// Per-field throttle backed by the shared [`RateLimiter`].
pub struct RateLimitGuard {
    endpoint: &'static str,
}

impl RateLimitGuard {
    pub fn new(endpoint: &'static str) -> Self {
        Self { endpoint }
    }
}

impl Guard for RateLimitGuard {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        let Some(limiter) = ctx.data_opt::<RateLimiter>() else {
            return Ok(());
        };
        let client = ctx
            .data_opt::<ClientIdentity>()
            .map(ClientIdentity::as_str)
            .unwrap_or(FALLBACK_CLIENT);

        let decision = limiter.allow(client, self.endpoint);
        if decision.allowed {
            return Ok(());
        }

        debug!(client, endpoint = self.endpoint, "Rate limit exceeded");
        Err(async_graphql::Error::new(THROTTLED_MESSAGE)
            .extend_with(|_, extensions| extensions.set("code", THROTTLED_CODE)))
    }
}

//! Per-client request quotas.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

/// Token-bucket limiter keyed by client IP.
pub type ClientRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// Builds a limiter allowing `max_requests` per `window_secs`, all of which
/// may arrive as one burst.
///
/// # Errors
///
/// Returns [`Error::Config`] for a zero request count or window.
pub fn build_limiter(config: &RateLimitConfig) -> Result<ClientRateLimiter> {
    let burst = NonZeroU32::new(config.max_requests)
        .ok_or_else(|| Error::Config("rate_limit.max_requests cannot be 0".to_string()))?;
    if config.window_secs == 0 {
        return Err(Error::Config("rate_limit.window_secs cannot be 0".to_string()));
    }

    let period = Duration::from_secs(config.window_secs) / burst.get();
    let quota = Quota::with_period(period)
        .ok_or_else(|| Error::Config("rate limit replenish period is zero".to_string()))?
        .allow_burst(burst);

    Ok(RateLimiter::keyed(quota))
}

/// Rejects requests over quota with 429 and a `Retry-After` header.
///
/// Requests without connection info (in-process tests, for instance) all
/// share the unspecified address bucket.
pub(super) async fn enforce(
    State(limiter): State<Arc<ClientRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip());

    match limiter.check_key(&client) {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait.as_secs().max(1);
            debug!(client = %client, retry_after, "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(json!({ "message": "too many requests" })),
            )
                .into_response()
        },
    }
}

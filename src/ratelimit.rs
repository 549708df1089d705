//! Per-client rate limiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use log::{debug, warn};

use crate::error::ApiError;

/// Keyed limiter state is pruned once this many client addresses are tracked.
const MAX_TRACKED_CLIENTS: usize = 10_000;

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Hourly request quota keyed by client address
pub struct ClientRateLimiter {
    limiter: KeyedLimiter,
}

impl ClientRateLimiter {
    /// Allow `requests` per hour per client, all of which may arrive at once
    pub fn per_hour(requests: u32) -> Self {
        let quota = Quota::per_hour(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Returns false once `ip` has used up its quota.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
            debug!("Pruned rate limiter state to {} clients", self.limiter.len());
        }
        self.limiter.check_key(&ip).is_ok()
    }
}

/// Address of the connected peer, or the unspecified address when unknown
pub fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(State(limiter): State<Arc<ClientRateLimiter>>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);
    if !limiter.check(ip) {
        warn!("Rate limit exceeded for {ip} on {}", request.uri().path());
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Extension, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use pilgrim_auth::JwtValidator;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::config::AuthRateLimit;
use crate::context::PrincipalContext;

/// Tracked clients above which idle entries are pruned.
const RATE_LIMIT_PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Require a valid bearer token; installs [`PrincipalContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map_err(|_| unauthorized())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        unauthorized()
    })?;

    req.extensions_mut().insert(PrincipalContext::from(claims));

    Ok(next.run(req).await)
}

/// Require the authenticated account to hold the admin flag.
///
/// Must run inside [`auth_middleware`].
pub async fn require_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    // The flag is read from the ledger, not the token, so revocation is immediate.
    let is_admin = services
        .ledger
        .get(principal.account_id())
        .map(|a| a.is_admin)
        .unwrap_or(false);

    if !is_admin {
        tracing::warn!(account_id = %principal.account_id(), "admin route denied");
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "admin privileges required",
        ));
    }

    Ok(next.run(req).await)
}

/// Per-IP limiter for the `/api/auth/*` routes.
///
/// GCRA: a client may burst `max_requests`, and one request's worth of budget
/// comes back every `window / max_requests`.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    clock: DefaultClock,
}

impl RateLimitState {
    pub fn new(limit: AuthRateLimit) -> Self {
        let period = limit.window / limit.max_requests.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(limit.max_requests))
            .allow_burst(limit.max_requests);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            clock: DefaultClock::default(),
        }
    }

    /// `Err` carries how long the client has to wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        if self.limiter.len() > RATE_LIMIT_PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

/// Reject clients over their auth budget with 429 and `Retry-After`.
///
/// Clients are keyed by peer IP from `ConnectInfo`; a router served without
/// connect info puts every caller in one bucket.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(wait) = state.check(ip) {
        let retry_after = wait.as_secs().max(1);
        tracing::warn!(%ip, retry_after, path = %req.uri().path(), "auth rate limit exceeded");

        let mut res = errors::json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "too many authentication attempts, try again later",
        );
        res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        return Err(res);
    }

    Ok(next.run(req).await)
}

/// One structured line per request.
pub async fn log_requests(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    res
}

fn unauthorized() -> Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required")
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

//! Per-IP fixed-window rate limiting.
//!
//! Two limiters guard the API:
//! - register: strict budget for `POST /api/pre-register`
//! - api: relaxed budget for everything under `/api`, unmatched paths included
//!
//! A client's window opens with its first request and admits
//! `max_requests` until it closes; the next request after that opens a fresh
//! window. Rejections use the same JSON body as every other API error.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::future::Cache;

use crate::config::RateLimit;
use crate::error::AppError;

/// Upper bound on clients tracked by one limiter.
const MAX_TRACKED_CLIENTS: u64 = 100_000;

// =============================================================================
// Client IP
// =============================================================================

/// Proxy headers carrying the client address, most trusted first.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        // X-Forwarded-For lists the client first
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Resolve the client address from proxy headers, falling back to the peer.
///
/// The peer address requires serving with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn client_ip<B>(request: &axum::http::Request<B>) -> Option<IpAddr> {
    CLIENT_IP_HEADERS
        .iter()
        .find_map(|name| header_ip(request.headers(), name))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

// =============================================================================
// Limiter
// =============================================================================

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client IP.
///
/// Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct RateLimiter {
    limit: RateLimit,
    windows: Cache<IpAddr, Arc<Mutex<Window>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("clients", &self.windows.entry_count())
            .finish()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: RateLimit) -> Self {
        let windows = Cache::builder()
            .max_capacity(MAX_TRACKED_CLIENTS)
            .time_to_live(limit.window)
            .build();
        Self { limit, windows }
    }

    /// Count one request from `client`.
    ///
    /// # Errors
    ///
    /// Returns the seconds until the client's window closes when its budget
    /// is spent.
    pub async fn check(&self, client: IpAddr) -> Result<(), u64> {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: IpAddr, now: Instant) -> Result<(), u64> {
        let entry = self
            .windows
            .get_with(client, async move {
                Arc::new(Mutex::new(Window {
                    started: now,
                    count: 0,
                }))
            })
            .await;
        let mut window = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if now.saturating_duration_since(window.started) >= self.limit.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.limit.max_requests {
            let closes_at = window.started + self.limit.window;
            return Err(whole_seconds(closes_at.saturating_duration_since(now)));
        }

        window.count += 1;
        Ok(())
    }
}

/// Round up to whole seconds for `Retry-After`, never below one.
fn whole_seconds(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

/// Reject requests over the limiter's budget with `429`.
///
/// Install with `axum::middleware::from_fn_with_state(limiter, enforce_rate_limit)`.
pub async fn enforce_rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let Some(client) = client_ip(&request) else {
        return AppError::Internal("could not determine client IP".to_string()).into_response();
    };

    match limiter.check(client).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::debug!(%client, retry_after, "Rate limit exceeded");
            AppError::RateLimited {
                retry_after: Some(retry_after),
            }
            .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header::RETRY_AFTER},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    fn request() -> axum::http::request::Builder {
        axum::http::Request::builder().uri("/api/pre-register")
    }

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimit {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn test_prefers_cloudflare_header() {
        let req = request()
            .header("cf-connecting-ip", "203.0.113.7")
            .header("x-forwarded-for", "198.51.100.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some(ip("203.0.113.7")));
    }

    #[test]
    fn test_uses_first_forwarded_hop() {
        let req = request()
            .header("x-forwarded-for", "198.51.100.1, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some(ip("198.51.100.1")));
    }

    #[test]
    fn test_skips_unparseable_header() {
        let req = request()
            .header("x-forwarded-for", "unknown")
            .header("x-real-ip", "192.0.2.4")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some(ip("192.0.2.4")));
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = request().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("192.0.2.9:51000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_ip(&req), Some(ip("192.0.2.9")));
    }

    #[test]
    fn test_no_source_is_none() {
        let req = request().body(()).unwrap();
        assert_eq!(client_ip(&req), None);
    }

    #[tokio::test]
    async fn test_budget_holds_for_the_whole_window() {
        let limiter = limiter(5, 3600);
        let client = ip("203.0.113.7");
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at(client, start).await.is_ok());
        }

        // Well past the point a refilling bucket would have admitted more
        for minutes in [1, 12, 30, 59] {
            let later = start + Duration::from_secs(minutes * 60);
            assert!(limiter.check_at(client, later).await.is_err(), "minute {minutes}");
        }
    }

    #[tokio::test]
    async fn test_budget_resets_when_window_closes() {
        let limiter = limiter(2, 60);
        let client = ip("203.0.113.7");
        let start = Instant::now();

        limiter.check_at(client, start).await.unwrap();
        limiter.check_at(client, start).await.unwrap();
        assert_eq!(
            limiter
                .check_at(client, start + Duration::from_secs(20))
                .await,
            Err(40)
        );

        let next_window = start + Duration::from_secs(60);
        assert!(limiter.check_at(client, next_window).await.is_ok());
        assert!(limiter.check_at(client, next_window).await.is_ok());
        assert!(limiter.check_at(client, next_window).await.is_err());
    }

    #[tokio::test]
    async fn test_clients_have_separate_budgets() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.check_at(ip("198.51.100.1"), now).await.is_ok());
        assert!(limiter.check_at(ip("198.51.100.1"), now).await.is_err());
        assert!(limiter.check_at(ip("198.51.100.2"), now).await.is_ok());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(whole_seconds(Duration::from_secs(40)), 40);
        assert_eq!(whole_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_middleware_answers_json_429() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                limiter(1, 60),
                enforce_rate_limit,
            ));

        let send = || {
            app.clone().oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header("x-real-ip", "192.0.2.1")
                    .body(Body::empty())
                    .unwrap(),
            )
        };

        assert_eq!(send().await.unwrap().status(), StatusCode::OK);

        let limited = send().await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(RETRY_AFTER));
    }
}

//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (added by the binary)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. Request ID (propagate or generate, echo in response)
//! 4. Security headers (CSP, frame/sniff/referrer policy, isolation)
//! 5. CORS and rate limiting (only under `/api`)

pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use rate_limit::{RateLimiter, client_ip, enforce_rate_limit};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;

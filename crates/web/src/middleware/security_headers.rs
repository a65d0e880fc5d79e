//! Security headers middleware.
//!
//! The landing page loads nothing from third parties: scripts, styles and
//! images all come from `/static`, and the form posts to the same origin.
//! The policy below allows exactly that.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, header::CACHE_CONTROL},
    middleware::Next,
    response::Response,
};

const CONTENT_SECURITY: &str = "default-src 'none'; \
     script-src 'self'; \
     style-src 'self'; \
     font-src 'self'; \
     img-src 'self' data:; \
     connect-src 'self'; \
     frame-src 'none'; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'";

const PERMISSIONS: &str = "accelerometer=(), \
     autoplay=(), \
     browsing-topics=(), \
     camera=(), \
     display-capture=(), \
     encrypted-media=(), \
     fullscreen=(), \
     geolocation=(), \
     gyroscope=(), \
     interest-cohort=(), \
     magnetometer=(), \
     microphone=(), \
     midi=(), \
     payment=(), \
     publickey-credentials-get=(), \
     serial=(), \
     usb=(), \
     xr-spatial-tracking=()";

/// Headers applied to every response.
///
/// No HSTS: the server speaks plain HTTP and TLS ends at the proxy.
const SECURITY_HEADERS: [(&str, &str); 9] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    ("content-security-policy", CONTENT_SECURITY),
    ("permissions-policy", PERMISSIONS),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("cross-origin-embedder-policy", "require-corp"),
    ("x-dns-prefetch-control", "off"),
];

/// Add security headers to all responses, including API errors and 404s.
///
/// Responses that did not set `Cache-Control` themselves (static assets do)
/// get `no-store`.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    headers
        .entry(CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store, max-age=0"));

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::header::{CONTENT_SECURITY_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
    use axum::http::Request;
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/cached",
                get(|| async { ([(CACHE_CONTROL, "public, max-age=60")], "asset") }),
            )
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(middleware::from_fn(security_headers_middleware))
    }

    async fn get_headers(uri: &str) -> axum::http::HeaderMap {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .headers()
            .clone()
    }

    #[tokio::test]
    async fn test_headers_are_set_on_every_response() {
        for uri in ["/", "/missing"] {
            let headers = get_headers(uri).await;
            assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
            assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
            assert!(headers.contains_key(CONTENT_SECURITY_POLICY));
            assert!(headers.contains_key("permissions-policy"));
            assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-store, max-age=0");
        }
    }

    #[tokio::test]
    async fn test_no_transport_upgrade_on_plain_http() {
        let headers = get_headers("/").await;
        assert!(!headers.contains_key("strict-transport-security"));
        let csp = headers.get(CONTENT_SECURITY_POLICY).unwrap().to_str().unwrap();
        assert!(!csp.contains("upgrade-insecure-requests"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[tokio::test]
    async fn test_existing_cache_control_is_kept() {
        let headers = get_headers("/cached").await;
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "public, max-age=60");
    }
}

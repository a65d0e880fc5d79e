//! End-to-end tests for pages, health checks and shared middleware.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use prelaunch_core::Email;
use prelaunch_integration_tests::TestServer;
use prelaunch_web::store::InjectedFailure;
use reqwest::StatusCode;

#[tokio::test]
async fn test_home_renders_form() {
    let server = TestServer::spawn().await;

    let response = server.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );

    let html = response.text().await.unwrap();
    assert!(html.contains("id=\"pre-register-form\""));
    assert!(html.contains("id=\"privacyAgree\""));
    assert!(html.contains("/static/js/pre-register.js"));
}

#[tokio::test]
async fn test_home_view_reloads_duplicate_cache() {
    let server = TestServer::spawn().await;
    let email = Email::parse("seeded@example.com").unwrap();
    server.store.seed(email.clone()).await;

    assert_eq!(server.get("/").await.status(), StatusCode::OK);

    let cache = server.state.registrations().cache();
    let mut loaded = false;
    for _ in 0..50 {
        if cache.has(&email) {
            loaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(loaded, "cache was not repopulated after page view");

    let response = server.pre_register("seeded@example.com", None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(server.store.insert_attempts(), 0);
}

#[tokio::test]
async fn test_privacy_page() {
    let server = TestServer::spawn().await;

    let response = server.get("/privacy").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.unwrap();
    assert!(html.to_lowercase().contains("privacy"));
}

#[tokio::test]
async fn test_unknown_path_renders_not_found_page() {
    let server = TestServer::spawn().await;

    for path in ["/nope", "/privacy/extra"] {
        let response = server.get(path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {path}");
        let html = response.text().await.unwrap();
        assert!(html.contains("404"), "path {path}");
    }

    let api = server.get("/api/nope").await;
    assert_eq!(api.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_assets_served() {
    let server = TestServer::spawn().await;

    let script = server.get("/static/js/pre-register.js").await;
    assert_eq!(script.status(), StatusCode::OK);

    let missing = server.get("/static/js/missing.js").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoints() {
    let server = TestServer::spawn().await;

    let live = server.get("/health").await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(live.text().await.unwrap(), "ok");

    assert_eq!(server.get("/health/ready").await.status(), StatusCode::OK);

    server.store.fail_with(InjectedFailure::Unavailable).await;
    assert_eq!(
        server.get("/health/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    // Liveness does not touch the store
    assert_eq!(server.get("/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let server = TestServer::spawn().await;

    let page = server.get("/").await;
    let api = server.pre_register("headers@example.com", None).await;
    let missing = server.get("/nope").await;

    for response in [&page, &api, &missing] {
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert!(headers.contains_key("content-security-policy"));
        assert!(headers.contains_key("x-frame-options"));
        assert!(headers.contains_key("x-request-id"));
    }
}

#[tokio::test]
async fn test_request_id_echoed_when_supplied() {
    let server = TestServer::spawn().await;

    let response = server
        .client
        .get(server.url("/health"))
        .header("x-request-id", "trace-abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
}

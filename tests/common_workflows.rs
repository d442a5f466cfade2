//! Integration tests for common SecureState workflows.
//!
//! These tests drive the facade the way an HTTP server would.

use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE, USER_AGENT};
use http::{Method, Request, Response};
use securestate::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn request(method: Method, path: &str) -> Request<String> {
    let mut req = Request::builder()
        .method(method)
        .uri(path)
        .header(USER_AGENT, "Mozilla/5.0")
        .body(String::new())
        .unwrap();
    req.extensions_mut()
        .insert(ClientAddr(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))));
    req
}

/// Run the middleware and produce the response a server would send.
fn serve(csrf: &CsrfMiddleware, mut req: Request<String>) -> Response<String> {
    match csrf.handle(&mut req).unwrap() {
        Outcome::Proceed(issuance) => {
            let token = req.extensions().get::<RequestToken>().unwrap().0.clone();
            let mut response = Response::new(token);
            issuance.apply(&mut response);
            response
        }
        Outcome::Reject(rejection) => rejection.into_response(),
    }
}

fn cookie_value(response: &Response<String>) -> String {
    let header = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    let pair = header.split(';').next().unwrap();
    pair.split_once('=').unwrap().1.to_string()
}

fn error_message(response: &Response<String>) -> String {
    let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
    assert_eq!(body.as_object().map(|o| o.len()), Some(1));
    body["error"].as_str().unwrap().to_string()
}

// =============================================================================
// Form Workflow
// =============================================================================

#[test]
fn test_form_post_workflow() {
    let csrf = CsrfMiddleware::new(CsrfConfig::new().with_check_origin(true).with_expiration(1800));

    // Render the form
    let page = serve(&csrf, request(Method::GET, "/profile"));
    assert_eq!(page.status(), 200);
    let token = page.body().clone();
    assert_eq!(cookie_value(&page).replace("%3A", ":"), token);

    // Submit it back through the form body
    let mut submit = request(Method::POST, "/profile");
    submit
        .headers_mut()
        .insert(COOKIE, format!("_csrfToken={}", token).parse().unwrap());
    *submit.body_mut() = format!("display_name=sam&_csrfToken={}", token);

    let response = serve(&csrf, submit);
    assert_eq!(response.status(), 200);
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[test]
fn test_forged_post_is_rejected() {
    let csrf = CsrfMiddleware::new(CsrfConfig::default());
    let page = serve(&csrf, request(Method::GET, "/"));
    let token = page.body().clone();

    // Cookie rides along, but the attacker cannot read it to echo it
    let mut forged = request(Method::POST, "/transfer");
    forged
        .headers_mut()
        .insert(COOKIE, format!("_csrfToken={}", token).parse().unwrap());

    let response = serve(&csrf, forged);
    assert_eq!(response.status(), 403);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert_eq!(error_message(&response), "CSRF token missing.");

    let mut guessed = request(Method::POST, "/transfer");
    guessed
        .headers_mut()
        .insert(COOKIE, format!("_csrfToken={}", token).parse().unwrap());
    guessed
        .headers_mut()
        .insert("x-csrf-token", "00".repeat(32).parse().unwrap());

    let response = serve(&csrf, guessed);
    assert_eq!(response.status(), 403);
    assert_eq!(error_message(&response), "CSRF token mismatch.");
}

#[test]
fn test_regenerate_token_each_request() {
    let csrf = CsrfMiddleware::new(CsrfConfig::default().with_regenerate_token(true));

    let first = serve(&csrf, request(Method::GET, "/"));
    let mut again = request(Method::GET, "/");
    again
        .headers_mut()
        .insert(COOKIE, format!("_csrfToken={}", first.body()).parse().unwrap());
    let second = serve(&csrf, again);

    assert_ne!(first.body(), second.body());
}

#[test]
fn test_webhook_path_is_excluded() {
    let csrf = CsrfMiddleware::new(
        CsrfConfig::default().with_exclude_paths(vec!["/webhooks".to_string()]),
    );

    assert_eq!(serve(&csrf, request(Method::POST, "/webhooks/stripe")).status(), 200);
    assert_eq!(serve(&csrf, request(Method::POST, "/account")).status(), 403);
}

#[test]
fn test_config_manager_feeds_middleware() {
    let manager = ConfigManager::new();
    manager.set("cookie_name", "xsrf").unwrap();
    manager.set("header_name", "X-XSRF-Token").unwrap();
    manager.set("token_length", 24).unwrap();

    let csrf = CsrfMiddleware::new(CsrfConfig::from_manager(&manager).unwrap());
    let page = serve(&csrf, request(Method::GET, "/"));
    let token = page.body().clone();
    assert_eq!(token.len(), 48);

    let mut submit = request(Method::PUT, "/");
    submit
        .headers_mut()
        .insert(COOKIE, format!("xsrf={}", token).parse().unwrap());
    submit
        .headers_mut()
        .insert("x-xsrf-token", token.parse().unwrap());
    assert_eq!(serve(&csrf, submit).status(), 200);
}

// =============================================================================
// Concurrent Clients
// =============================================================================

#[tokio::test]
async fn test_concurrent_clients_share_middleware() {
    let csrf = Arc::new(CsrfMiddleware::new(
        CsrfConfig::new().with_check_origin(true).with_expiration(600),
    ));

    let mut handles = Vec::new();
    for client in 0..16u8 {
        let csrf = Arc::clone(&csrf);
        handles.push(tokio::spawn(async move {
            let addr = ClientAddr(IpAddr::V4(Ipv4Addr::new(10, 1, 0, client)));

            let mut page = request(Method::GET, "/");
            page.extensions_mut().insert(addr);
            let token = serve(&csrf, page).body().clone();

            let mut submit = request(Method::POST, "/");
            submit.extensions_mut().insert(addr);
            submit
                .headers_mut()
                .insert(COOKIE, format!("_csrfToken={}", token).parse().unwrap());
            submit
                .headers_mut()
                .insert("x-csrf-token", token.parse().unwrap());
            serve(&csrf, submit).status()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }
}

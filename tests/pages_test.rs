mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{TestApp, body_bytes, body_text};
use serde_json::Value;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_index_and_upload_pages() {
    let app = TestApp::new().await;

    let response = app.send(get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let html = body_text(response).await;
    assert!(html.contains("href=\"/upload\"") || html.contains("href=\"&#x2f;upload\""));

    let response = app.send(get("/upload")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("name=\"uploadfile\""));
    assert!(html.contains("multipart/form-data"));
    assert!(html.contains("Maximum size: 1 MB"));
}

#[tokio::test]
async fn test_upload_form_token_is_hex() {
    let app = TestApp::new().await;

    let html = body_text(app.send(get("/upload")).await).await;
    let start = html.find("name=\"token\" value=\"").unwrap() + "name=\"token\" value=\"".len();
    let token: String = html[start..].chars().take_while(|c| *c != '"').collect();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_static_assets() {
    let app = TestApp::new().await;

    let response = app.send(get("/static/style.css")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/css")
    );

    let response = app.send(get("/static/missing.css")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;

    let response = app.send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["work_dir"], "ready");
    assert_eq!(json["rasterizer"], "available");
    assert_eq!(json["archiver"], "available");
}

#[tokio::test]
async fn test_openapi_document() {
    let app = TestApp::new().await;

    let response = app.send(get("/api-docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(json["paths"]["/convert"]["post"].is_object());
    assert!(json["paths"]["/download"]["get"].is_object());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = app.send(get("/health")).await;
    assert!(response.headers().contains_key("x-request-id"));
}

//! Integration tests for the termbridge HTTP surface.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use termbridge::{create_router, AppState};
use termbridge_core::ServerConfig;

fn app(config: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(config);
    (create_router(state.clone()), state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "OK", "service": "termbridge"})
    );
}

#[tokio::test]
async fn test_sessions_lists_registry() {
    let (app, state) = app(ServerConfig::default());

    let request = || Request::builder().uri("/api/sessions").body(Body::empty()).unwrap();

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"sessions": []}));

    let info = state.registry.register(Some("198.51.100.7:40000".into())).unwrap();
    let response = app.oneshot(request()).await.unwrap();
    let body = body_json(response).await;

    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], json!(info.id.to_string()));
    assert_eq!(sessions[0]["peer"], json!("198.51.100.7:40000"));
    assert!(sessions[0].get("password").is_none());
}

#[tokio::test]
async fn test_probe_rejects_invalid_ip() {
    let (app, _) = app(ServerConfig::default());
    let response = app
        .oneshot(post_json("/api/probe", r#"{"ip":"999.1.1.1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"ok": false, "message": "Invalid IPv4 address: 999.1.1.1", "output": ""})
    );
}

#[tokio::test]
async fn test_probe_rejects_invalid_port() {
    let (app, _) = app(ServerConfig::default());
    let response = app
        .oneshot(post_json("/api/probe", r#"{"ip":"10.0.0.5","port":0}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["message"], json!("Invalid port: 0"));
}

#[tokio::test]
async fn test_probe_rejects_malformed_body() {
    let (app, _) = app(ServerConfig::default());
    let response = app
        .oneshot(post_json("/api/probe", r#"{"address":"10.0.0.5"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(false));
    assert!(body["message"].as_str().unwrap().starts_with("Malformed message"));
    assert_eq!(body["output"], json!(""));
}

#[tokio::test]
async fn test_probe_against_fake_host() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"\x1b[32mrouter>\x1b[0m ").await.unwrap();
    });

    let (app, _) = app(ServerConfig::default());
    let body = json!({"ip": "127.0.0.1", "port": port, "probeCommand": ""}).to_string();
    let response = app.oneshot(post_json("/api/probe", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["output"], json!("router> "));
}

#[tokio::test]
async fn test_probe_unreachable_host_is_not_ok() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (app, _) = app(ServerConfig::default());
    let body = json!({"ip": "127.0.0.1", "port": port}).to_string();
    let response = app.oneshot(post_json("/api/probe", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["output"], json!(""));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = app(ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/api/devices").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shell_requires_websocket_upgrade() {
    let (app, state) = app(ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/ws/shell").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(state.registry.count(), 0);
}

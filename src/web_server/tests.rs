use super::server::WebServer;
use crate::config::queue_config::QueueSettings;
use crate::queue::{Processor, QueueManager};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

struct Upper;

#[async_trait]
impl Processor for Upper {
    type Payload = String;
    type Output = String;

    async fn process(&self, payload: String) -> Result<String> {
        if payload == "fail" {
            return Err(anyhow!("account not found"));
        }
        Ok(payload.to_uppercase())
    }
}

fn server() -> WebServer<Upper> {
    let manager = QueueManager::new(QueueSettings::default(), Upper);
    WebServer::new(5001, "localhost".to_string(), manager)
}

async fn call(server: &WebServer<Upper>, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[test]
fn test_web_server_creation() {
    let web_server = server();
    assert_eq!(web_server.port, 5001);
    assert_eq!(web_server.host, "localhost");
}

#[tokio::test]
async fn test_submit_returns_position() {
    let server = server();
    let (status, body) = call(&server, Method::POST, "/api/jobs", Some(r#"{"payload":"alice"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["position"], 1);
    assert_eq!(body["total_waiting"], 1);
    assert_eq!(body["estimated_wait_seconds"], 5);
    assert!(body["job_id"].is_string());

    let (_, body) = call(&server, Method::POST, "/api/jobs", Some(r#"{"payload":"bob"}"#)).await;
    assert_eq!(body["position"], 2);
    assert_eq!(body["estimated_wait_seconds"], 10);
}

#[tokio::test]
async fn test_submit_rejects_malformed_body() {
    let server = server();
    let (status, body) = call(&server, Method::POST, "/api/jobs", Some(r#"{"username":"alice"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_status_after_processing() {
    let server = server();
    let (_, body) = call(&server, Method::POST, "/api/jobs", Some(r#"{"payload":"alice"}"#)).await;
    let id = body["job_id"].as_str().unwrap().to_string();

    server.manager.worker().step().await;

    let (status, body) = call(&server, Method::GET, &format!("/api/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "completed");
    assert_eq!(body["position"], 0);
    assert_eq!(body["result"]["kind"], "completed");
    assert_eq!(body["result"]["value"], "ALICE");
}

#[tokio::test]
async fn test_failed_job_exposes_error() {
    let server = server();
    let (_, body) = call(&server, Method::POST, "/api/jobs", Some(r#"{"payload":"fail"}"#)).await;
    let id = body["job_id"].as_str().unwrap().to_string();

    server.manager.worker().step().await;

    let (_, body) = call(&server, Method::GET, &format!("/api/jobs/{}", id), None).await;
    assert_eq!(body["state"], "failed");
    assert_eq!(body["result"]["kind"], "failed");
    assert_eq!(body["result"]["value"], "account not found");
}

#[tokio::test]
async fn test_unknown_and_invalid_ids() {
    let server = server();
    let unknown = uuid::Uuid::new_v4();
    let (status, body) = call(&server, Method::GET, &format!("/api/jobs/{}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = call(&server, Method::GET, "/api/jobs/not-a-job", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_endpoint() {
    let server = server();
    let (_, body) = call(&server, Method::POST, "/api/jobs", Some(r#"{"payload":"alice"}"#)).await;
    let id = body["job_id"].as_str().unwrap().to_string();

    let (status, body) = call(&server, Method::DELETE, &format!("/api/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);

    let (_, body) = call(&server, Method::DELETE, &format!("/api/jobs/{}", id), None).await;
    assert_eq!(body["cancelled"], false);

    let (_, body) = call(&server, Method::GET, &format!("/api/jobs/{}", id), None).await;
    assert_eq!(body["state"], "cancelled");
}

#[tokio::test]
async fn test_queue_views() {
    let server = server();
    call(&server, Method::POST, "/api/jobs", Some(r#"{"payload":"alice"}"#)).await;
    call(&server, Method::POST, "/api/jobs", Some(r#"{"payload":"bob"}"#)).await;

    let (status, body) = call(&server, Method::GET, "/api/queue/global-status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["total_queue"], 2);

    server.manager.worker().step().await;

    let (_, body) = call(&server, Method::GET, "/api/queue/activity?limit=5", None).await;
    assert_eq!(body["activity"].as_array().unwrap().len(), 1);

    let (_, body) = call(&server, Method::GET, "/api/queue/stats", None).await;
    assert_eq!(body["total_completed"], 1);
    assert_eq!(body["queue_size"], 1);
    assert_eq!(body["daily"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_health_reflects_worker() {
    let server = server();
    let (status, body) = call(&server, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["worker_running"], false);

    let handle = server.manager.start().unwrap();
    let (status, body) = call(&server, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["worker_running"], true);
    handle.shutdown().await.unwrap();
}

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::queue::{
    ActivityEntry, GlobalStatus, Health, JobId, Processor, QueueError, QueueManager, QueueStats,
    StatusSnapshot,
};

#[derive(Deserialize)]
struct SubmitRequest<T> {
    payload: T,
}

#[derive(Serialize)]
struct SubmitResponse {
    success: bool,
    job_id: JobId,
    position: usize,
    total_waiting: usize,
    estimated_wait_seconds: u64,
}

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T> SuccessResponse<T> {
    fn new(body: T) -> Json<Self> {
        Json(Self {
            success: true,
            body,
        })
    }
}

#[derive(Serialize)]
struct CancelResponse {
    success: bool,
    cancelled: bool,
}

#[derive(Serialize)]
struct ActivityResponse {
    success: bool,
    activity: Vec<ActivityEntry>,
}

#[derive(Deserialize)]
struct ActivityQuery {
    limit: Option<usize>,
}

/// Error body shared by every endpoint
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    msg: String,
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            msg: msg.into(),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        let status = match err {
            QueueError::NotFound(_) => StatusCode::NOT_FOUND,
            QueueError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
            QueueError::WorkerAlreadyRunning => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            msg: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "msg": self.msg })),
        )
            .into_response()
    }
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid job id: {}", raw)))
}

/// HTTP binding of the queue operations
pub struct WebServer<P: Processor> {
    pub port: u16,
    pub host: String,
    pub manager: QueueManager<P>,
}

impl<P> WebServer<P>
where
    P: Processor,
    P::Payload: DeserializeOwned,
    P::Output: Serialize,
{
    pub fn new(port: u16, host: String, manager: QueueManager<P>) -> Self {
        Self {
            port,
            host,
            manager,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let app = self.router();
        // Convert localhost to 127.0.0.1 for proper parsing
        let host = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            &self.host
        };
        let addr: SocketAddr = format!("{}:{}", host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, self.port))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Queue API listening on http://{}:{}", self.host, self.port);

        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/jobs", post(submit_job::<P>))
            .route(
                "/api/jobs/:id",
                get(job_status::<P>).delete(cancel_job::<P>),
            )
            .route("/api/queue/global-status", get(global_status::<P>))
            .route("/api/queue/activity", get(recent_activity::<P>))
            .route("/api/queue/stats", get(queue_stats::<P>))
            .route("/health", get(health::<P>))
            .with_state(self.manager.clone())
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
    }
}

async fn submit_job<P>(
    State(manager): State<QueueManager<P>>,
    request: Result<Json<SubmitRequest<P::Payload>>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError>
where
    P: Processor,
    P::Payload: DeserializeOwned,
{
    let Json(request) = request.map_err(|e| {
        warn!("Rejected submission: {}", e.body_text());
        ApiError::bad_request(e.body_text())
    })?;

    let job_id = manager.submit(request.payload).await?;
    let snapshot = manager.status(job_id).await?;

    Ok(Json(SubmitResponse {
        success: true,
        job_id,
        position: snapshot.position,
        total_waiting: snapshot.total_waiting,
        estimated_wait_seconds: snapshot.estimated_wait_seconds,
    }))
}

async fn job_status<P>(
    State(manager): State<QueueManager<P>>,
    Path(raw_id): Path<String>,
) -> Result<Json<SuccessResponse<StatusSnapshot<P::Output>>>, ApiError>
where
    P: Processor,
    P::Output: Serialize,
{
    let id = parse_job_id(&raw_id)?;
    let snapshot = manager.status(id).await?;
    debug!("Status for {}: {} at position {}", id, snapshot.state, snapshot.position);
    Ok(SuccessResponse::new(snapshot))
}

async fn cancel_job<P: Processor>(
    State(manager): State<QueueManager<P>>,
    Path(raw_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_job_id(&raw_id)?;
    let cancelled = manager.cancel(id).await?;
    Ok(Json(CancelResponse {
        success: true,
        cancelled,
    }))
}

async fn global_status<P: Processor>(
    State(manager): State<QueueManager<P>>,
) -> Json<SuccessResponse<GlobalStatus>> {
    SuccessResponse::new(manager.global_status().await)
}

async fn recent_activity<P: Processor>(
    State(manager): State<QueueManager<P>>,
    Query(query): Query<ActivityQuery>,
) -> Json<ActivityResponse> {
    let limit = query.limit.unwrap_or(10);
    Json(ActivityResponse {
        success: true,
        activity: manager.recent_activity(limit).await,
    })
}

async fn queue_stats<P: Processor>(
    State(manager): State<QueueManager<P>>,
) -> Json<SuccessResponse<QueueStats>> {
    SuccessResponse::new(manager.stats().await)
}

async fn health<P: Processor>(State(manager): State<QueueManager<P>>) -> Response {
    let health: Health = manager.health().await;
    let running = health.worker_running;
    let status = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = SuccessResponse {
        success: running,
        body: health,
    };
    (status, Json(body)).into_response()
}

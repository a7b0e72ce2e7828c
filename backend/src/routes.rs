//! HTTP routes.
//!
//! ## Endpoints
//!
//! - `POST /api/tasks` - Create a task
//! - `GET /api/tasks` - List all tasks
//! - `GET /api/tasks/:id` - Get a task
//! - `PUT /api/tasks/:id` - Update a task
//! - `DELETE /api/tasks/:id` - Delete a task
//! - `GET /api/health` - Health check

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, State},
    http::{request::Parts, HeaderValue, Request, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use mockable::DefaultClock;
use serde::Serialize;
use shared::{CreateTaskRequest, Task, TaskId, UpdateTaskRequest};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::TaskError;
use crate::service::TaskService;

/// The service instance shared by every handler.
pub type SharedService = Arc<TaskService<DefaultClock>>;

/// JSON body extractor that reports malformed input as a validation error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(TaskError))]
pub struct ApiJson<T>(pub T);

/// Path extractor that reports unparsable ids as a validation error.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(TaskError))]
pub struct ApiPath<T>(pub T);

/// `:id` path segment, accepted only when it is a positive integer.
pub struct TaskPath(pub TaskId);

#[async_trait]
impl<S> FromRequestParts<S> for TaskPath
where
    S: Send + Sync,
{
    type Rejection = TaskError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ApiPath(raw) = ApiPath::<i64>::from_request_parts(parts, state).await?;
        if raw < 1 {
            return Err(TaskError::invalid_id());
        }
        Ok(Self(TaskId(raw)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// Build the application router around one service instance.
pub fn router(service: SharedService) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/health", get(health))
        .layer(middleware)
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn serve(config: &Config, service: SharedService) -> anyhow::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

async fn list_tasks(State(service): State<SharedService>) -> Result<Json<Vec<Task>>, TaskError> {
    Ok(Json(service.list().await?))
}

async fn get_task(
    State(service): State<SharedService>,
    TaskPath(id): TaskPath,
) -> Result<Json<Task>, TaskError> {
    Ok(Json(service.get(id).await?))
}

async fn create_task(
    State(service): State<SharedService>,
    ApiJson(payload): ApiJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), TaskError> {
    let task = service.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(service): State<SharedService>,
    TaskPath(id): TaskPath,
    payload: Result<ApiJson<UpdateTaskRequest>, TaskError>,
) -> Result<Json<Task>, TaskError> {
    // An unknown id is reported as 404 even when the body is unreadable.
    let ApiJson(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            service.get(id).await?;
            return Err(rejection);
        }
    };
    Ok(Json(service.update(id, &payload).await?))
}

async fn delete_task(
    State(service): State<SharedService>,
    TaskPath(id): TaskPath,
) -> Result<StatusCode, TaskError> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn health(State(service): State<SharedService>) -> (StatusCode, Json<HealthResponse>) {
    match service.health().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "UP" })),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "DOWN" }),
            )
        }
    }
}

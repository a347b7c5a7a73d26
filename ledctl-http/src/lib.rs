//! Read-only introspection surface over `TaskRegistry` (spec §6). Every
//! response is derived entirely from registry state; this crate introduces
//! no new state of its own.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};

use ledctl_core::task_registry::{TaskRecord, TaskRegistry, TaskStatus};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TaskRegistry>,
}

pub fn router(registry: Arc<TaskRegistry>) -> Router {
    Router::new()
        .route("/tasks/summary", get(tasks_summary))
        .route("/tasks", get(tasks_all))
        .route("/tasks/active", get(tasks_active))
        .route("/tasks/failed", get(tasks_failed))
        .route("/health", get(health))
        .with_state(AppState { registry })
}

fn record_to_json(record: &TaskRecord) -> Value {
    let (status, error) = match &record.status {
        TaskStatus::Running => ("running", None),
        TaskStatus::Completed(_) => ("completed", None),
        TaskStatus::Cancelled => ("cancelled", None),
        TaskStatus::Failed(err) => ("failed", Some(err.clone())),
    };
    json!({
        "id": record.id,
        "category": format!("{:?}", record.category),
        "description": record.description,
        "created_by": record.created_by,
        "elapsed_secs": record.created_at.elapsed().as_secs_f64(),
        "status": status,
        "error": error,
    })
}

async fn tasks_summary(State(state): State<AppState>) -> Json<Value> {
    let summary = state.registry.summary().await;
    Json(json!({
        "total": summary.total,
        "active": summary.active,
        "failed": summary.failed,
        "cancelled": summary.cancelled,
    }))
}

async fn tasks_all(State(state): State<AppState>) -> Json<Value> {
    let records = state.registry.list_all().await;
    Json(json!(records.iter().map(record_to_json).collect::<Vec<_>>()))
}

async fn tasks_active(State(state): State<AppState>) -> Json<Value> {
    let records = state.registry.active().await;
    Json(json!(records.iter().map(record_to_json).collect::<Vec<_>>()))
}

async fn tasks_failed(State(state): State<AppState>) -> Json<Value> {
    let records = state.registry.failed().await;
    Json(json!(records.iter().map(record_to_json).collect::<Vec<_>>()))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let summary = state.registry.summary().await;
    if summary.failed > 0 {
        (
            StatusCode::OK,
            Json(json!({
                "status": "degraded",
                "reason": format!("{} failed task(s)", summary.failed),
                "tasks": summary,
            })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "tasks": summary,
            })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ledctl_core::task_registry::TaskCategory;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_is_healthy_with_no_failed_tasks() {
        let registry = Arc::new(TaskRegistry::new());
        registry.register(TaskCategory::Render, "frame manager loop", None).await;
        let app = router(registry);

        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tasks_summary_reflects_registry_state() {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry.register(TaskCategory::Animation, "breathe on lamp", None).await;
        registry.mark_failed(id, "panicked").await;
        let app = router(registry);

        let response = app.oneshot(Request::builder().uri("/tasks/summary").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

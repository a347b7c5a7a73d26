//! TaskRegistry: process-wide directory of every long-running concurrent
//! task. The authoritative source for the shutdown coordinator's
//! "cancel all remaining tracked tasks" handler -- direct fire-and-forget
//! `tokio::spawn` calls outside this registry are prohibited by the design.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;

/// Closed set of task categories (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    Api,
    Hardware,
    Render,
    Animation,
    Input,
    System,
    Transition,
    EventBus,
    Background,
    General,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TaskStatus {
    Running,
    Completed(Option<String>),
    Cancelled,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct TaskRecord {
    pub id: u64,
    pub category: TaskCategory,
    pub description: String,
    pub created_by: Option<String>,
    pub created_at: Instant,
    pub status: TaskStatus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub total: u64,
    pub active: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

pub struct TaskRegistry {
    next_id: AtomicU64,
    records: Mutex<HashMap<u64, TaskRecord>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new task, returning its id. Callers are expected to
    /// report completion via `mark_completed` / `mark_cancelled` /
    /// `mark_failed` once their spawned task resolves -- the registry
    /// itself holds no join handle, only the record.
    pub async fn register(
        &self,
        category: TaskCategory,
        description: impl Into<String>,
        created_by: Option<String>,
    ) -> TaskId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = TaskRecord {
            id,
            category,
            description: description.into(),
            created_by,
            created_at: Instant::now(),
            status: TaskStatus::Running,
        };
        self.records.lock().await.insert(id, record);
        TaskId(id)
    }

    pub async fn mark_completed(&self, id: TaskId, value: Option<String>) {
        self.set_status(id, TaskStatus::Completed(value)).await;
    }

    pub async fn mark_cancelled(&self, id: TaskId) {
        self.set_status(id, TaskStatus::Cancelled).await;
    }

    pub async fn mark_failed(&self, id: TaskId, error: impl Into<String>) {
        self.set_status(id, TaskStatus::Failed(error.into())).await;
    }

    async fn set_status(&self, id: TaskId, status: TaskStatus) {
        if let Some(record) = self.records.lock().await.get_mut(&id.0) {
            record.status = status;
        }
    }

    pub async fn list_all(&self) -> Vec<TaskRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    pub async fn active(&self) -> Vec<TaskRecord> {
        self.list_all()
            .await
            .into_iter()
            .filter(|r| matches!(r.status, TaskStatus::Running))
            .collect()
    }

    pub async fn failed(&self) -> Vec<TaskRecord> {
        self.list_all()
            .await
            .into_iter()
            .filter(|r| matches!(r.status, TaskStatus::Failed(_)))
            .collect()
    }

    pub async fn cancelled(&self) -> Vec<TaskRecord> {
        self.list_all()
            .await
            .into_iter()
            .filter(|r| matches!(r.status, TaskStatus::Cancelled))
            .collect()
    }

    pub async fn summary(&self) -> TaskSummary {
        let records = self.records.lock().await;
        let mut summary = TaskSummary { total: records.len() as u64, ..Default::default() };
        for r in records.values() {
            match r.status {
                TaskStatus::Running => summary.active += 1,
                TaskStatus::Failed(_) => summary.failed += 1,
                TaskStatus::Cancelled => summary.cancelled += 1,
                TaskStatus::Completed(_) => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn summary_counts_by_status() {
        let registry = TaskRegistry::new();
        let a = registry.register(TaskCategory::Animation, "breathe on lamp", None).await;
        let b = registry.register(TaskCategory::Render, "frame manager loop", None).await;
        let c = registry.register(TaskCategory::Api, "http server", None).await;

        registry.mark_failed(a, "panicked").await;
        registry.mark_cancelled(b).await;
        let _ = c;

        let summary = registry.summary().await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.active, 1);
    }

    #[tokio::test]
    async fn active_filters_to_running_only() {
        let registry = TaskRegistry::new();
        let a = registry.register(TaskCategory::Animation, "snake on floor", None).await;
        registry.register(TaskCategory::Render, "frame manager loop", None).await;
        registry.mark_completed(a, None).await;

        let active = registry.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].description, "frame manager loop");
    }
}

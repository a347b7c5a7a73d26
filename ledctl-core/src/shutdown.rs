//! ShutdownCoordinator: priority-descending invocation of registered
//! shutdown handlers with per-handler and total timeouts, driven by
//! SIGINT/SIGTERM.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

/// Canonical handler priority bands (spec §4.7), exposed so `main` can wire
/// handlers consistently rather than hard-coding magic numbers at call
/// sites.
pub mod priority {
    pub const OUTPUT_CHANNEL_CLEAR: u16 = 100;
    pub const ANIMATION_STOP_ALL: u16 = 90;
    pub const EXTERNAL_API: u16 = 80;
    pub const COMPONENT_CLEANUP: u16 = 50;
    pub const MANAGED_TASK_CANCEL: u16 = 40;
    pub const REMAINING_TASKS_CANCEL: u16 = 40;
    pub const HARDWARE_RELEASE: u16 = 20;
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Action = Box<dyn Fn() -> BoxFuture + Send + Sync>;

struct Handler {
    priority: u16,
    name: String,
    action: Action,
}

pub struct ShutdownCoordinator {
    handlers: Mutex<Vec<Handler>>,
    per_handler_timeout: Duration,
    total_timeout: Duration,
    shutting_down: AtomicBool,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            per_handler_timeout: Duration::from_secs(5),
            total_timeout: Duration::from_secs(15),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn with_timeouts(mut self, per_handler: Duration, total: Duration) -> Self {
        self.per_handler_timeout = per_handler;
        self.total_timeout = total;
        self
    }

    pub async fn register<F, Fut>(&self, priority: u16, name: impl Into<String>, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: Action = Box::new(move || Box::pin(action()));
        self.handlers.lock().await.push(Handler { priority, name: name.into(), action: boxed });
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Sort handlers priority-descending and run each under
    /// `per_handler_timeout`, aborting the remaining queue once
    /// `total_timeout` has elapsed. Idempotent: a second concurrent call is
    /// a no-op (spec's "shutdown already in progress" error kind).
    pub async fn shutdown_all(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            info!("shutdown already in progress, ignoring duplicate request");
            return;
        }

        let mut handlers = self.handlers.lock().await;
        handlers.sort_by(|a, b| b.priority.cmp(&a.priority));

        let overall_start = Instant::now();
        for handler in handlers.iter() {
            if overall_start.elapsed() > self.total_timeout {
                warn!(remaining = handler.name.as_str(), "total shutdown timeout exceeded, aborting remaining handlers");
                break;
            }
            match tokio::time::timeout(self.per_handler_timeout, (handler.action)()).await {
                Ok(()) => info!(handler = handler.name.as_str(), priority = handler.priority, "shutdown handler completed"),
                Err(_) => warn!(handler = handler.name.as_str(), priority = handler.priority, "shutdown handler timed out"),
            }
        }
    }

    /// Wait for SIGINT or SIGTERM (POSIX) / Ctrl-C (other platforms).
    #[cfg(unix)]
    pub async fn wait_for_signal(&self) {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    pub async fn wait_for_signal(&self) {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;

    #[tokio::test]
    async fn handlers_run_priority_descending() {
        let order = Arc::new(TokioMutex::new(Vec::<&'static str>::new()));
        let coordinator = ShutdownCoordinator::new();

        let o = order.clone();
        coordinator.register(100, "clear-output", move || {
            let o = o.clone();
            async move { o.lock().await.push("clear-output") }
        }).await;

        let o = order.clone();
        coordinator.register(90, "stop-animations-errored", move || {
            let o = o.clone();
            async move { o.lock().await.push("stop-animations-errored") }
        }).await;

        let o = order.clone();
        coordinator.register(20, "release-gpio", move || {
            let o = o.clone();
            async move { o.lock().await.push("release-gpio") }
        }).await;

        coordinator.shutdown_all().await;
        let seen = order.lock().await.clone();
        assert_eq!(seen, vec!["clear-output", "stop-animations-errored", "release-gpio"]);
    }

    #[tokio::test]
    async fn duplicate_shutdown_is_idempotent() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let coordinator = ShutdownCoordinator::new();
        let c = calls.clone();
        coordinator.register(100, "noop", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }).await;

        coordinator.shutdown_all().await;
        coordinator.shutdown_all().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_handler_times_out_and_the_rest_still_run() {
        let order = Arc::new(TokioMutex::new(Vec::<&'static str>::new()));
        let coordinator = ShutdownCoordinator::new().with_timeouts(Duration::from_millis(10), Duration::from_secs(5));

        let o = order.clone();
        coordinator.register(90, "stuck", move || {
            let o = o.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                o.lock().await.push("stuck");
            }
        }).await;

        let o = order.clone();
        coordinator.register(20, "release-gpio", move || {
            let o = o.clone();
            async move { o.lock().await.push("release-gpio") }
        }).await;

        coordinator.shutdown_all().await;
        assert_eq!(order.lock().await.clone(), vec!["release-gpio"]);
    }
}

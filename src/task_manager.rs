//! Named background tasks with cooperative cancellation.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Bounded wait for all tasks during shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Tracks every long-running service task of the daemon.
///
/// Each task gets a child of the global token; [`shutdown_all`](Self::shutdown_all)
/// cancels the global token and waits for every task.
pub struct TaskManager {
    tasks: HashMap<String, JoinHandle<Result<()>>>,
    shutdown_timeout: Duration,
    pub global_token: CancellationToken,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::with_shutdown_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn with_shutdown_timeout(shutdown_timeout: Duration) -> Self {
        Self {
            tasks: HashMap::new(),
            shutdown_timeout,
            global_token: CancellationToken::new(),
        }
    }

    /// Spawns `task_fn` under `name`. A task that is still registered under
    /// the same name is cancelled by the next [`shutdown_all`](Self::shutdown_all)
    /// only; spawning a duplicate name is refused.
    pub async fn spawn_task<F, Fut>(&mut self, name: String, task_fn: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        if self.tasks.contains_key(&name) {
            anyhow::bail!("Task '{}' is already running", name);
        }

        let task_token = self.global_token.child_token();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            info!("Starting task: {}", task_name);
            let result = task_fn(task_token).await;
            match &result {
                Ok(()) => info!("Task '{}' finished", task_name),
                Err(e) => error!("Task '{}' failed: {:#}", task_name, e),
            }
            result
        });

        self.tasks.insert(name.clone(), handle);
        info!("Task '{}' spawned", name);
        Ok(())
    }

    /// Cancels every task and waits for them, returning the first failure.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("Stopping all {} tasks", self.tasks.len());
        self.global_token.cancel();

        let mut first_error = None;
        for (name, handle) in self.tasks.drain() {
            let outcome = match tokio::time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(Ok(()))) => continue,
                Ok(Ok(Err(e))) => e.context(format!("Task '{name}' failed during shutdown")),
                Ok(Err(e)) => anyhow::anyhow!("Task '{}' panicked: {}", name, e),
                Err(_) => anyhow::anyhow!("Task '{}' exceeded the shutdown timeout", name),
            };
            warn!("{:#}", outcome);
            first_error.get_or_insert(outcome);
        }

        if let Some(error) = first_error {
            Err(error).context("One or more tasks failed during shutdown")
        } else {
            info!("All tasks stopped");
            Ok(())
        }
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn tasks_stop_on_shutdown() {
        let mut task_manager = TaskManager::new();
        task_manager
            .spawn_task("waiter".to_string(), |token| async move {
                token.cancelled().await;
                Ok(())
            })
            .await
            .unwrap();

        assert!(task_manager.is_running("waiter"));
        assert_ok!(task_manager.shutdown_all().await);
        assert_eq!(task_manager.active_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_names_are_refused() {
        let mut task_manager = TaskManager::new();
        let idle = |token: CancellationToken| async move {
            token.cancelled().await;
            Ok(())
        };
        task_manager.spawn_task("dup".to_string(), idle).await.unwrap();
        assert!(task_manager.spawn_task("dup".to_string(), idle).await.is_err());
        assert_ok!(task_manager.shutdown_all().await);
    }

    #[tokio::test]
    async fn failed_task_is_reported() {
        let mut task_manager = TaskManager::new();
        task_manager
            .spawn_task("broken".to_string(), |_| async { anyhow::bail!("no device root") })
            .await
            .unwrap();

        let err = assert_err!(task_manager.shutdown_all().await);
        assert!(format!("{err:#}").contains("no device root"));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_task_hits_the_timeout() {
        let mut task_manager = TaskManager::with_shutdown_timeout(Duration::from_millis(50));
        task_manager
            .spawn_task("stuck".to_string(), |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap();

        let err = assert_err!(task_manager.shutdown_all().await);
        assert!(format!("{err:#}").contains("shutdown timeout"));
    }
}

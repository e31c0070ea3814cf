use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Creates a component that needs async initialization.
///
/// # Example
///
/// ```no_run
/// use razerd::providers::traits::AsyncProvider;
///
/// struct SerialProvider;
///
/// #[async_trait::async_trait]
/// impl AsyncProvider<String> for SerialProvider {
///     async fn provide(&self) -> anyhow::Result<String> {
///         Ok("XX0000001".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncProvider<T> {
    async fn provide(&self) -> Result<T>;
}

/// A long-running part of the daemon started through the [`TaskManager`].
///
/// # Example
///
/// ```no_run
/// use razerd::providers::traits::ServiceProvider;
/// use razerd::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct Heartbeat;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for Heartbeat {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task("heartbeat".to_string(), |token| async move {
///             token.cancelled().await;
///             Ok(())
///         }).await
///     }
///
///     fn name(&self) -> &'static str { "Heartbeat" }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    fn name(&self) -> &'static str;

    /// Higher numbers start first.
    fn priority(&self) -> i32 {
        0
    }

    /// A critical service that fails to start aborts start-up.
    fn is_critical(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    struct FixedProvider(u32);

    #[async_trait]
    impl AsyncProvider<u32> for FixedProvider {
        async fn provide(&self) -> Result<u32> {
            Ok(self.0)
        }
    }

    struct SpawningService {
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ServiceProvider for SpawningService {
        async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
            let ran = self.ran.clone();
            task_manager
                .spawn_task("spawning".to_string(), move |_token| async move {
                    ran.store(true, Ordering::SeqCst);
                    Ok(())
                })
                .await
        }

        fn name(&self) -> &'static str {
            "Spawning"
        }
    }

    #[tokio::test]
    async fn providers_work_as_trait_objects() {
        let providers: Vec<Box<dyn AsyncProvider<u32>>> =
            vec![Box::new(FixedProvider(1)), Box::new(FixedProvider(2))];
        let mut values = Vec::new();
        for provider in &providers {
            values.push(provider.provide().await.unwrap());
        }
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn service_defaults_are_non_critical() {
        let service = SpawningService {
            ran: Arc::new(AtomicBool::new(false)),
        };
        assert_eq!(service.priority(), 0);
        assert!(!service.is_critical());
    }

    #[tokio::test]
    async fn started_service_runs_its_task() {
        let ran = Arc::new(AtomicBool::new(false));
        let service = SpawningService { ran: ran.clone() };
        let mut task_manager = TaskManager::new();

        service.start(&mut task_manager).await.unwrap();
        task_manager.shutdown_all().await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn mocked_services_sort_by_priority() {
        let mut services: Vec<Box<dyn ServiceProvider>> = Vec::new();
        for (name, priority) in [("low", 1), ("high", 10), ("mid", 5)] {
            let mut mock = MockServiceProvider::new();
            mock.expect_name().return_const(name);
            mock.expect_priority().return_const(priority);
            services.push(Box::new(mock));
        }

        services.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        let names: Vec<&str> = services.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn mocked_start_failure_is_reported() {
        let mut mock = MockServiceProvider::new();
        mock.expect_start()
            .times(1)
            .returning(|_| Err(anyhow!("bus unavailable")));

        let mut task_manager = TaskManager::new();
        let err = mock.start(&mut task_manager).await.unwrap_err();
        assert_eq!(err.to_string(), "bus unavailable");
    }
}

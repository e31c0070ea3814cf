//! Dependency injection providers for service management.
//!
//! Each long-running part of the daemon is a [`ServiceProvider`] that
//! spawns its task on the shared [`TaskManager`](crate::task_manager::TaskManager).

pub mod app_state;
pub mod config_watcher;
pub mod dbus;
pub mod devices;
pub mod traits;

pub use app_state::AppStateProvider;
pub use config_watcher::ConfigWatcherServiceProvider;
pub use dbus::DBusServiceProvider;
pub use devices::DeviceServiceProvider;
pub use traits::{AsyncProvider, ServiceProvider};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::{
        app_context::AppState,
        config::{Config, ConfigManager},
        event::{Event, EventBus},
        task_manager::TaskManager,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn create_test_app_state(root: &std::path::Path) -> Arc<AppState> {
        let mut config = Config::default();
        config.devices_root = root.to_path_buf();
        config.persist_settings = false;
        let config_manager = ConfigManager::new(config, root.join("config.yml"));
        Arc::new(AppState::new(config_manager).await.unwrap())
    }

    #[tokio::test]
    async fn service_provider_priority_ordering() {
        let dir = TempDir::new().unwrap();
        let state = create_test_app_state(dir.path()).await;
        let event_bus = EventBus::new();

        let mut providers: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(ConfigWatcherServiceProvider::new(
                state.clone(),
                event_bus.clone(),
            )),
            Box::new(DeviceServiceProvider::new(state.clone(), event_bus.clone())),
        ];
        providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));

        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["DeviceService", "ConfigWatcherService"]);
        assert!(providers[0].is_critical());
        assert!(!providers[1].is_critical());
    }

    #[tokio::test]
    async fn services_share_one_state_and_bus() {
        let dir = TempDir::new().unwrap();
        let plugged = dir.path().join("0003:1532:0043.0001");
        std::fs::create_dir_all(&plugged).unwrap();
        std::fs::write(plugged.join("device_type"), "Razer DeathAdder Chroma\n").unwrap();
        std::fs::write(plugged.join("device_serial"), "MOUSE1\n").unwrap();

        let state = create_test_app_state(dir.path()).await;
        let event_bus = EventBus::new();
        let mut events = event_bus.subscribe();

        let mut task_manager = TaskManager::new();
        for provider in [
            Box::new(DeviceServiceProvider::new(state.clone(), event_bus.clone()))
                as Box<dyn ServiceProvider>,
            Box::new(ConfigWatcherServiceProvider::new(
                state.clone(),
                event_bus.clone(),
            )),
        ] {
            provider.start(&mut task_manager).await.unwrap();
        }
        assert_eq!(task_manager.active_count(), 2);

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Event::DeviceAdded("MOUSE1".into()));
        assert!(state.directory.get("MOUSE1").is_some());

        task_manager.shutdown_all().await.unwrap();
        assert!(state.directory.is_empty());
    }
}

//! System coordinator: service lifecycle and event handling.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    app_context::AppState,
    config::ConfigManager,
    event::{ConfigChangeType, Event, EventBus},
    providers::{
        AppStateProvider, AsyncProvider, ConfigWatcherServiceProvider, DBusServiceProvider,
        DeviceServiceProvider, ServiceProvider,
    },
    task_manager::TaskManager,
};

/// What the main loop does after an event.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Owns the services of the daemon and reacts to bus events.
///
/// Critical services must start; the others are skipped with a warning
/// when they fail (a missing session bus only disables D-Bus access).
pub struct SystemCoordinator {
    task_manager: TaskManager,
    event_bus: EventBus,
    shared_state: Option<Arc<AppState>>,
    service_providers: Vec<Box<dyn ServiceProvider>>,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self {
            task_manager: TaskManager::new(),
            event_bus: EventBus::new(),
            shared_state: None,
            service_providers: Vec::new(),
        }
    }

    /// Builds the shared state and registers the services.
    pub async fn initialize(&mut self, config_manager: ConfigManager) -> Result<()> {
        info!("Initializing SystemCoordinator...");

        let state = AppStateProvider::new(config_manager)
            .provide()
            .await
            .context("Failed to initialize application state")?;
        self.shared_state = Some(state.clone());

        self.register_service_providers(state)
            .await
            .context("Failed to register service providers")?;

        info!("SystemCoordinator initialization completed");
        Ok(())
    }

    async fn register_service_providers(&mut self, state: Arc<AppState>) -> Result<()> {
        let mut providers: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(DeviceServiceProvider::new(
                state.clone(),
                self.event_bus.clone(),
            )),
            Box::new(ConfigWatcherServiceProvider::new(
                state.clone(),
                self.event_bus.clone(),
            )),
        ];

        match DBusServiceProvider::new(state.clone(), self.event_bus.clone()).await {
            Ok(provider) => providers.push(Box::new(provider)),
            Err(e) => warn!("{:#}, skipping D-Bus service", e),
        }

        self.set_providers(providers);
        Ok(())
    }

    fn set_providers(&mut self, mut providers: Vec<Box<dyn ServiceProvider>>) {
        providers.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        self.service_providers = providers;
        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
    }

    /// Starts every registered service, highest priority first.
    pub async fn start_all_services(&mut self) -> Result<()> {
        for provider in &self.service_providers {
            let is_critical = provider.is_critical();

            match provider.start(&mut self.task_manager).await {
                Ok(()) => info!(
                    "Service '{}' started (priority: {}, critical: {})",
                    provider.name(),
                    provider.priority(),
                    is_critical
                ),
                Err(e) if is_critical => {
                    return Err(e).with_context(|| {
                        format!("Critical service '{}' failed to start", provider.name())
                    });
                }
                Err(e) => warn!(
                    "Non-critical service '{}' failed to start: {:#}",
                    provider.name(),
                    e
                ),
            }
        }
        Ok(())
    }

    /// Runs until Ctrl+C or a shutdown request, then stops every service.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        let mut event_rx = self.event_bus.subscribe();
        info!("Starting main event loop");

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                    break;
                }
                event = event_rx.recv() => {
                    if self.handle_event(event).await? == Flow::Stop {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        info!("Main event loop terminated");
        Ok(())
    }

    async fn handle_event(&mut self, event_result: Result<Event, RecvError>) -> Result<Flow> {
        match event_result {
            Ok(Event::ConfigChangeDetected(change_type)) => {
                // A failed reload keeps the previous config running.
                if let Err(e) = self.handle_config_change(change_type).await {
                    warn!("{:#}", e);
                }
            }
            Ok(Event::SystemShutdown) => {
                info!("Shutdown requested");
                return Ok(Flow::Stop);
            }
            Ok(Event::DeviceAdded(serial)) => info!("[{serial}] device online"),
            Ok(Event::DeviceRemoved(serial)) => info!("[{serial}] device offline"),
            Err(RecvError::Closed) => bail!("Event bus channel closed unexpectedly"),
            Err(RecvError::Lagged(n)) => warn!("Event bus lagged by {n} messages"),
        }
        Ok(Flow::Continue)
    }

    async fn handle_config_change(&self, change_type: ConfigChangeType) -> Result<()> {
        match change_type {
            ConfigChangeType::HotReload => self.handle_hot_reload().await,
            ConfigChangeType::ColdRestart { changed_sections } => {
                warn!(
                    "Configuration keys {:?} only apply after restarting razerd",
                    changed_sections
                );
                // The rest of the file may still carry hot changes.
                self.handle_hot_reload().await
            }
        }
    }

    async fn handle_hot_reload(&self) -> Result<()> {
        let Some(state) = &self.shared_state else {
            warn!("Cannot reload config: system state not initialized");
            return Ok(());
        };
        state
            .config_manager()
            .reload()
            .await
            .context("Failed to reload configuration")?;

        let sync_effects = state.config().await.sync_effects;
        state.directory.set_sync_effects(sync_effects);
        info!("Hot configuration reload completed");
        Ok(())
    }

    async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.task_manager.shutdown_all().await {
            log::error!("Error during task shutdown: {:#}", e);
        }
        if let Some(state) = &self.shared_state {
            // Devices a failed service left behind.
            state.device_token.cancel();
            for device in state.directory.devices() {
                state.directory.remove(device.serial());
                device.teardown(state.effects.shutdown_timeout).await;
            }
        }
        info!("Shutdown complete");
    }

    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn state(&self) -> Option<&Arc<AppState>> {
        self.shared_state.as_ref()
    }

    pub fn running_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::MockServiceProvider;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn initialized(dir: &TempDir) -> SystemCoordinator {
        let devices = dir.path().join("devices");
        fs::create_dir_all(&devices).unwrap();
        let config_path = dir.path().join("config.yml");
        fs::write(
            &config_path,
            format!("version: 1\ndevices_root: {}\n", devices.display()),
        )
        .unwrap();
        let config_manager = ConfigManager::load(Some(config_path)).await.unwrap();

        let mut coordinator = SystemCoordinator::new();
        coordinator.initialize(config_manager).await.unwrap();
        coordinator
    }

    fn mock(
        name: &'static str,
        priority: i32,
        critical: bool,
        ok: bool,
    ) -> Box<dyn ServiceProvider> {
        let mut mock = MockServiceProvider::new();
        mock.expect_name().return_const(name);
        mock.expect_priority().return_const(priority);
        mock.expect_is_critical().return_const(critical);
        mock.expect_start().returning(move |_| {
            if ok {
                Ok(())
            } else {
                Err(anyhow::anyhow!("{name} broke"))
            }
        });
        Box::new(mock)
    }

    #[tokio::test]
    async fn initialize_registers_core_services() {
        let dir = TempDir::new().unwrap();
        let coordinator = initialized(&dir).await;
        let services = coordinator.running_services();
        // D-Bus is only registered when a session bus is reachable.
        assert_eq!(services[0], "DeviceService");
        assert!(services.contains(&"ConfigWatcherService"));
        assert!(coordinator.state().is_some());
    }

    #[tokio::test]
    async fn critical_failure_aborts_start() {
        let mut coordinator = SystemCoordinator::new();
        coordinator.set_providers(vec![
            mock("optional", 1, false, false),
            mock("core", 5, true, false),
        ]);
        let err = coordinator.start_all_services().await.unwrap_err();
        assert!(format!("{err:#}").contains("core broke"));
    }

    #[tokio::test]
    async fn optional_failure_is_tolerated() {
        let mut coordinator = SystemCoordinator::new();
        coordinator.set_providers(vec![
            mock("optional", 1, false, false),
            mock("core", 5, true, true),
        ]);
        assert_eq!(coordinator.running_services(), vec!["core", "optional"]);
        coordinator.start_all_services().await.unwrap();
    }

    #[tokio::test]
    async fn hot_reload_updates_effect_sync() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = initialized(&dir).await;
        let state = coordinator.state().unwrap().clone();
        assert!(state.directory.sync_effects());

        let devices = dir.path().join("devices");
        fs::write(
            dir.path().join("config.yml"),
            format!("version: 1\ndevices_root: {}\nsync_effects: false\n", devices.display()),
        )
        .unwrap();
        let flow = coordinator
            .handle_event(Ok(Event::ConfigChangeDetected(ConfigChangeType::HotReload)))
            .await
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        assert!(!state.directory.sync_effects());
    }

    #[tokio::test]
    async fn broken_reload_keeps_running() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = initialized(&dir).await;
        fs::write(dir.path().join("config.yml"), "version: [").unwrap();

        let flow = coordinator
            .handle_event(Ok(Event::ConfigChangeDetected(ConfigChangeType::HotReload)))
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(coordinator.state().unwrap().directory.sync_effects());
    }

    #[tokio::test]
    async fn shutdown_event_ends_the_main_loop() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = initialized(&dir).await;
        coordinator.set_providers(vec![mock("core", 5, true, true)]);
        coordinator.start_all_services().await.unwrap();

        let event_bus = coordinator.event_bus().clone();
        let publisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            event_bus.publish(Event::SystemShutdown).unwrap();
        });

        tokio::time::timeout(Duration::from_secs(5), coordinator.run_main_loop())
            .await
            .unwrap()
            .unwrap();
        publisher.await.unwrap();
        assert!(coordinator.state().unwrap().device_token.is_cancelled());
    }

    #[tokio::test]
    async fn closed_bus_is_an_error() {
        let mut coordinator = SystemCoordinator::new();
        assert!(coordinator.handle_event(Err(RecvError::Closed)).await.is_err());
        assert_eq!(
            coordinator.handle_event(Err(RecvError::Lagged(3))).await.unwrap(),
            Flow::Continue
        );
    }
}

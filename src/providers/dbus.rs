//! D-Bus service provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use event_listener::Event as StopRequest;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use zbus::Connection;

use crate::{
    app_context::AppState,
    event::{Event, EventBus},
    interface::{DAEMON_PATH, DaemonInterface, DeviceInterface, SERVICE_NAME, device_path},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Exposes the daemon and its devices on the session bus.
///
/// # Interface
///
/// - **Service Name**: `io.github.razerd`
/// - **Daemon object**: `/io/github/razerd` (`io.github.razerd.Daemon1`)
/// - **Device objects**: `/io/github/razerd/device/<serial>` (`io.github.razerd.Device1`)
///
/// Device objects follow hotplug through the `DeviceAdded` and
/// `DeviceRemoved` events.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use razerd::providers::DBusServiceProvider;
/// use razerd::event::EventBus;
/// use razerd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// // Fails when no session bus is reachable.
/// let provider = DBusServiceProvider::new(state, EventBus::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct DBusServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
}

impl DBusServiceProvider {
    pub async fn new(state: Arc<AppState>, event_bus: EventBus) -> Result<Self> {
        let connection = Connection::session()
            .await
            .context("Failed to connect to the session bus")?;
        Ok(Self {
            state,
            event_bus,
            connection,
        })
    }
}

#[async_trait]
impl ServiceProvider for DBusServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let connection = self.connection.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_dbus_service(state, event_bus, connection, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DBusService"
    }

    fn priority(&self) -> i32 {
        8
    }
}

async fn export_device(connection: &Connection, state: &AppState, serial: &str) {
    let Some(device) = state.directory.get(serial) else {
        debug!("[{serial}] gone before it could be exported");
        return;
    };
    let path = device_path(serial);
    match connection
        .object_server()
        .at(path.as_str(), DeviceInterface { device })
        .await
    {
        Ok(true) => info!("[{serial}] exported at {path}"),
        Ok(false) => debug!("[{serial}] already exported"),
        Err(e) => warn!("[{serial}] could not be exported: {e}"),
    }
}

async fn unexport_device(connection: &Connection, serial: &str) {
    let path = device_path(serial);
    match connection
        .object_server()
        .remove::<DeviceInterface, _>(path.as_str())
        .await
    {
        Ok(true) => info!("[{serial}] unexported"),
        Ok(false) => debug!("[{serial}] was not exported"),
        Err(e) => warn!("[{serial}] could not be unexported: {e}"),
    }
}

async fn run_dbus_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
    cancel_token: CancellationToken,
) -> Result<()> {
    // Subscribe first so no hotplug between the snapshot and the loop is lost.
    let mut events = event_bus.subscribe();
    let stop = Arc::new(StopRequest::new());

    let daemon = DaemonInterface {
        directory: state.directory.clone(),
        stop: stop.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    connection
        .object_server()
        .at(DAEMON_PATH, daemon)
        .await
        .context("Failed to export the daemon object")?;
    connection
        .request_name(SERVICE_NAME)
        .await
        .with_context(|| format!("Failed to acquire {SERVICE_NAME}"))?;
    info!("D-Bus service available as {SERVICE_NAME}");

    for serial in state.directory.serials() {
        export_device(&connection, &state, &serial).await;
    }

    let mut stop_requested = stop.listen();
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            () = &mut stop_requested => {
                info!("Stop requested over D-Bus");
                if let Err(e) = event_bus.publish(Event::SystemShutdown) {
                    warn!("Failed to publish shutdown request: {e}");
                }
                stop_requested = stop.listen();
            }
            event = events.recv() => match event {
                Ok(Event::DeviceAdded(serial)) => export_device(&connection, &state, &serial).await,
                Ok(Event::DeviceRemoved(serial)) => unexport_device(&connection, &serial).await,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    warn!("D-Bus service missed {n} events, re-exporting devices");
                    for serial in state.directory.serials() {
                        export_device(&connection, &state, &serial).await;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    for serial in state.directory.serials() {
        unexport_device(&connection, &serial).await;
    }
    if let Err(e) = connection.release_name(SERVICE_NAME).await {
        debug!("Releasing {SERVICE_NAME} failed: {e}");
    }
    info!("D-Bus service stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigManager};
    use pretty_assertions::assert_eq;

    async fn create_mock_app_state() -> Arc<AppState> {
        let config_manager =
            ConfigManager::new(Config::default(), std::path::PathBuf::from("/tmp/razerd-test.yml"));
        Arc::new(AppState::new(config_manager).await.unwrap())
    }

    #[tokio::test]
    async fn provider_metadata_when_a_bus_exists() {
        let state = create_mock_app_state().await;
        match DBusServiceProvider::new(state, EventBus::new()).await {
            Ok(provider) => {
                assert_eq!(provider.name(), "DBusService");
                assert_eq!(provider.priority(), 8);
                assert!(!provider.is_critical());
            }
            Err(e) => {
                // No session bus in this environment.
                assert!(format!("{e:#}").contains("session bus"));
            }
        }
    }

    #[tokio::test]
    async fn service_stops_on_cancellation() {
        let state = create_mock_app_state().await;
        let Ok(provider) = DBusServiceProvider::new(state, EventBus::new()).await else {
            return;
        };
        let mut task_manager = TaskManager::new();
        if provider.start(&mut task_manager).await.is_ok() {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            // Another razerd may already own the name; either way shutdown ends the task.
            let _ = task_manager.shutdown_all().await;
            assert_eq!(task_manager.active_count(), 0);
        }
    }
}

//! Daemon-internal events passed between services.
//!
//! This bus carries lifecycle notifications (config reloads, hotplug,
//! shutdown). Lighting fan-out between devices does not go through it; that
//! is the synchronous [`DeviceDirectory`](crate::directory::DeviceDirectory).

use anyhow::Result;
use tokio::sync::broadcast;

/// How a configuration file change can be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeType {
    /// Applied to the running daemon.
    HotReload,
    /// Only takes effect after a restart.
    ColdRestart {
        /// Keys whose change needs the restart.
        changed_sections: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ConfigChangeDetected(ConfigChangeType),
    SystemShutdown,
    /// A device joined the directory. Carries its serial.
    DeviceAdded(String),
    /// A device left the directory and was torn down.
    DeviceRemoved(String),
}

/// Broadcast channel shared by every service.
///
/// # Example
///
/// ```no_run
/// use razerd::event::{Event, EventBus};
///
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
/// event_bus.publish(Event::DeviceAdded("XX0000001".into())).unwrap();
/// // subscriber.recv().await in async code
/// ```
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    #[cfg(test)]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fails when nobody is subscribed.
    pub fn publish(&self, event: Event) -> Result<()> {
        self.sender.send(event)?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

//! Shared application state.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::{
    capability::CapabilityRegistry,
    config::{Config, ConfigManager},
    device::discovery::DeviceFactory,
    directory::DeviceDirectory,
    effects::EffectSettings,
    persistence::{LogPersistence, NullPersistence, PersistenceSink},
};

/// Everything the services share at runtime.
///
/// The registry is built once at start-up and never changes. The directory
/// is the live device set and doubles as the effect fan-out bus.
pub struct AppState {
    pub config_manager: Arc<ConfigManager>,
    pub registry: Arc<CapabilityRegistry>,
    pub directory: Arc<DeviceDirectory>,
    pub persistence: Arc<dyn PersistenceSink>,
    /// Effect timing captured at start-up.
    pub effects: EffectSettings,
    /// Parent of every effect worker token.
    pub device_token: CancellationToken,
}

impl AppState {
    pub async fn new(config_manager: ConfigManager) -> anyhow::Result<Self> {
        let config = config_manager.clone_config().await;
        let registry =
            CapabilityRegistry::with_catalog().context("Failed to build capability registry")?;
        log::info!("Capability registry holds {} endpoints", registry.len());

        let persistence: Arc<dyn PersistenceSink> = if config.persist_settings {
            Arc::new(LogPersistence)
        } else {
            Arc::new(NullPersistence)
        };

        Ok(Self {
            registry: Arc::new(registry),
            directory: Arc::new(DeviceDirectory::new(config.sync_effects)),
            persistence,
            effects: config.effect_settings(),
            device_token: CancellationToken::new(),
            config_manager: Arc::new(config_manager),
        })
    }

    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config_manager.get().await
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    pub fn device_factory(&self) -> DeviceFactory {
        DeviceFactory::new(
            self.registry.clone(),
            self.persistence.clone(),
            self.effects.key_press_window,
        )
    }
}

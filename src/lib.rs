//! # razerd
//!
//! A Linux daemon that drives Razer peripherals through their kernel
//! driver attributes.
//!
//! ## Features
//!
//! - **Capability registry**: every device method is a `(namespace, method)`
//!   endpoint, composed per device from its profile
//! - **Effect sync**: lighting changes on one device are mirrored on the others
//! - **Matrix effects**: ripple, reactive, spectrum wheel and fire rendered by the daemon
//! - **Suspend**: per-device brightness save and restore
//! - **D-Bus Interface**: one object per device plus a daemon object
//! - **Hot Reload** and **hotplug** without restart
//!
//! ## Architecture
//!
//! - [`CapabilityRegistry`](capability::CapabilityRegistry) - Every known endpoint
//! - [`DeviceDirectory`](directory::DeviceDirectory) - Live devices and effect fan-out
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) - Service lifecycle
//! - [`EventBus`](event::EventBus) - Inter-service communication
//! - [`AppState`](app_context::AppState) - Shared application state
//!
//! ## Example
//!
//! ```no_run
//! use razerd::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod capability;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod directory;
pub mod effect_sync;
pub mod effects;
pub mod error;
pub mod event;
pub mod hardware;
pub mod interface;
pub mod persistence;
pub mod providers;
pub mod suspend;
pub mod task_manager;

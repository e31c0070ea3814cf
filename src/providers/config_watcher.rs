use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use notify::{Event, EventHandler, RecursiveMode, Watcher, recommended_watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    event::{ConfigChangeType, Event as AppEvent, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Watches the configuration file and announces changes on the event bus.
///
/// The parent directory is watched (editors replace files rather than
/// writing in place). Bursts of filesystem events collapse into one
/// analysis per debounce period.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use razerd::providers::ConfigWatcherServiceProvider;
/// use razerd::event::EventBus;
/// use razerd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let provider = ConfigWatcherServiceProvider::new(state, EventBus::new());
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcherServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    debounce: Duration,
}

impl ConfigWatcherServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self {
            state,
            event_bus,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

#[async_trait]
impl ServiceProvider for ConfigWatcherServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let debounce = self.debounce;

        task_manager
            .spawn_task(self.name().to_string(), move |cancel_token| async move {
                run_config_watcher_service(state, event_bus, debounce, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ConfigWatcherService"
    }

    fn priority(&self) -> i32 {
        6
    }
}

/// Forwards notify callbacks into the async world.
#[derive(Debug)]
struct AsyncEventHandler {
    sender: mpsc::UnboundedSender<notify::Result<Event>>,
}

impl EventHandler for AsyncEventHandler {
    fn handle_event(&mut self, event: notify::Result<Event>) {
        if let Err(e) = self.sender.send(event) {
            error!("Failed to forward filesystem event: {}", e);
        }
    }
}

fn publish_change(event_bus: &EventBus, change_type: ConfigChangeType) {
    match &change_type {
        ConfigChangeType::HotReload => info!("Hot-reloadable configuration change detected"),
        ConfigChangeType::ColdRestart { changed_sections } => {
            warn!(
                "Configuration keys {:?} changed; restart razerd to apply them",
                changed_sections
            );
        }
    }
    if let Err(e) = event_bus.publish(AppEvent::ConfigChangeDetected(change_type)) {
        error!("Failed to publish config change event: {}", e);
    }
}

async fn run_config_watcher_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    debounce: Duration,
    cancel_token: CancellationToken,
) -> Result<()> {
    let config_path = state.config_manager().path().to_path_buf();
    let watch_path = config_path
        .parent()
        .map_or_else(|| config_path.clone(), |parent| parent.to_path_buf());
    if !watch_path.exists() {
        warn!(
            "Config directory {} does not exist, hot reload disabled",
            watch_path.display()
        );
        cancel_token.cancelled().await;
        return Ok(());
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = recommended_watcher(AsyncEventHandler { sender: event_tx })
        .context("Failed to create filesystem watcher")?;
    watcher
        .watch(&watch_path, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", watch_path.display()))?;
    info!("Watching {} for changes", config_path.display());

    let mut debounce_interval = tokio::time::interval(debounce);
    debounce_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut has_pending_event = false;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,

            event_result = event_rx.recv() => {
                match event_result {
                    Some(Ok(event)) => {
                        let affects_config = event
                            .paths
                            .iter()
                            .any(|path| path.file_name() == config_path.file_name());
                        if affects_config && (event.kind.is_modify() || event.kind.is_create()) {
                            debug!("Config file touched ({:?})", event.kind);
                            if !has_pending_event {
                                debounce_interval.reset();
                            }
                            has_pending_event = true;
                        }
                    }
                    Some(Err(e)) => warn!("Filesystem watcher error: {}", e),
                    None => {
                        warn!("Filesystem event channel closed, exiting");
                        break;
                    }
                }
            }

            _ = debounce_interval.tick(), if has_pending_event => {
                has_pending_event = false;
                if !config_path.exists() {
                    warn!("Configuration file {} no longer exists", config_path.display());
                    continue;
                }
                if let Some(change_type) = state.config_manager().analyze_config_changes().await {
                    publish_change(&event_bus, change_type);
                }
            }
        }
    }

    if let Err(e) = watcher.unwatch(&watch_path) {
        warn!("Failed to unwatch {}: {}", watch_path.display(), e);
    }
    info!("Config watcher stopped");
    Ok(())
}

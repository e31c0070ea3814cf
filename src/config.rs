//! Configuration management for the razerd daemon.
//!
//! Handles loading, validation and saving of the YAML file that sets where
//! devices are found, whether effects are mirrored across devices and how
//! the animated effects are timed.

use crate::effects::EffectSettings;
use crate::event::ConfigChangeType;
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;

/// Main configuration structure of the daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// devices_root: /sys/bus/hid/devices
/// sync_effects: true
/// persist_settings: true
/// rescan_interval_secs: 5
/// effects:
///   refresh_interval_ms: 40
///   key_press_window_ms: 2000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Directory holding one entry per driver-bound device.
    #[serde(default = "defaults::devices_root")]
    pub devices_root: PathBuf,

    /// Mirror effect changes to every other device.
    #[serde(default = "defaults::sync_effects")]
    pub sync_effects: bool,

    /// Forward setter writes to the settings store.
    #[serde(default = "defaults::persist_settings")]
    pub persist_settings: bool,

    /// Hotplug rescan interval in seconds.
    #[serde(default = "defaults::rescan_interval_secs")]
    pub rescan_interval_secs: u64,

    #[serde(default)]
    pub effects: EffectsCfg,
}

/// Timing of the daemon-rendered effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectsCfg {
    /// Frame interval used until a request sets its own.
    #[serde(default = "defaults::refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// How long a key press stays visible.
    #[serde(default = "defaults::key_press_window_ms")]
    pub key_press_window_ms: u64,

    /// Bounded wait for a worker to stop.
    #[serde(default = "defaults::shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Pause after a failed frame.
    #[serde(default = "defaults::render_backoff_ms")]
    pub render_backoff_ms: u64,
}

impl Default for EffectsCfg {
    fn default() -> Self {
        Self {
            refresh_interval_ms: defaults::refresh_interval_ms(),
            key_press_window_ms: defaults::key_press_window_ms(),
            shutdown_timeout_ms: defaults::shutdown_timeout_ms(),
            render_backoff_ms: defaults::render_backoff_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            devices_root: defaults::devices_root(),
            sync_effects: defaults::sync_effects(),
            persist_settings: defaults::persist_settings(),
            rescan_interval_secs: defaults::rescan_interval_secs(),
            effects: EffectsCfg::default(),
        }
    }
}

impl Config {
    /// Rejects zero intervals.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use razerd::config::Config;
    ///
    /// let config = Config::default();
    /// config.validate()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("rescan_interval_secs", self.rescan_interval_secs),
            ("effects.refresh_interval_ms", self.effects.refresh_interval_ms),
            ("effects.key_press_window_ms", self.effects.key_press_window_ms),
            ("effects.shutdown_timeout_ms", self.effects.shutdown_timeout_ms),
        ];
        for (key, value) in checks {
            if value == 0 {
                anyhow::bail!("'{}' must be greater than zero", key);
            }
        }
        Ok(())
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }

    pub fn effect_settings(&self) -> EffectSettings {
        EffectSettings {
            refresh: Duration::from_millis(self.effects.refresh_interval_ms),
            key_press_window: Duration::from_millis(self.effects.key_press_window_ms),
            shutdown_timeout: Duration::from_millis(self.effects.shutdown_timeout_ms),
            render_backoff: Duration::from_millis(self.effects.render_backoff_ms),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn devices_root() -> PathBuf {
        PathBuf::from("/sys/bus/hid/devices")
    }

    pub fn sync_effects() -> bool {
        true
    }

    pub fn persist_settings() -> bool {
        true
    }

    pub fn rescan_interval_secs() -> u64 {
        5
    }

    pub fn refresh_interval_ms() -> u64 {
        40
    }

    pub fn key_press_window_ms() -> u64 {
        2000
    }

    pub fn shutdown_timeout_ms() -> u64 {
        2000
    }

    pub fn render_backoff_ms() -> u64 {
        250
    }
}

fn user_config_path() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
        .map(|dir| dir.join("razerd/config.yml"))
}

/// Finds the config file. `Err` carries the path a default config binds to.
fn locate_config() -> std::result::Result<PathBuf, PathBuf> {
    if let Ok(env_path) = env::var("RAZERD_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    let user = user_config_path();
    if let Some(path) = user.as_ref().filter(|p| p.exists()) {
        return Ok(path.clone());
    }

    let etc = Path::new("/etc/razerd/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    Err(user.unwrap_or_else(|| etc.to_path_buf()))
}

/// Owns the live configuration and the file it came from.
///
/// # Example
///
/// ```no_run
/// use razerd::config::ConfigManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = ConfigManager::load(Some(PathBuf::from("config.yml"))).await?;
/// let sync = config_manager.get().await.sync_effects;
/// config_manager.reload().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    /// Snapshot of the last applied config, compared on reload.
    applied: Arc<RwLock<Config>>,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            applied: Arc::new(RwLock::new(config.clone())),
            config: Arc::new(RwLock::new(config)),
            path,
        }
    }

    /// Loads from `path`, or searches in this order:
    /// 1. `RAZERD_CONFIG` environment variable
    /// 2. `$XDG_CONFIG_HOME/razerd/config.yml` or `~/.config/razerd/config.yml`
    /// 3. `/etc/razerd/config.yml`
    ///
    /// Without any file the defaults are used, bound to the user path.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path.map(Ok).unwrap_or_else(locate_config) {
            Ok(found) => found,
            Err(fallback) => {
                warn!(
                    "No configuration file found, using defaults (bound to {})",
                    fallback.display()
                );
                return Ok(Self::new(Config::default(), fallback));
            }
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path)?;
        Ok(Self::new(config, config_path))
    }

    pub async fn get(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config.read().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file. The previous config stays in place on failure.
    pub async fn reload(&self) -> Result<()> {
        info!("Reloading config from: {}", self.path.display());
        let new_config = Self::load_config_from_path(&self.path)?;

        *self.config.write().await = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Classifies how the file on disk differs from the applied config.
    ///
    /// Returns `None` when nothing relevant changed or the file cannot be
    /// read; the latter is logged and left for the next change.
    pub async fn analyze_config_changes(&self) -> Option<ConfigChangeType> {
        let on_disk = match Self::load_config_from_path(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config change: {:#}", e);
                return None;
            }
        };

        let mut applied = self.applied.write().await;
        if *applied == on_disk {
            return None;
        }

        let mut changed_sections = Vec::new();
        if applied.devices_root != on_disk.devices_root {
            changed_sections.push("devices_root".to_string());
        }
        if applied.persist_settings != on_disk.persist_settings {
            changed_sections.push("persist_settings".to_string());
        }
        *applied = on_disk;

        if changed_sections.is_empty() {
            Some(ConfigChangeType::HotReload)
        } else {
            Some(ConfigChangeType::ColdRestart { changed_sections })
        }
    }

    /// Writes the current config through a temporary file.
    pub async fn save(&self) -> Result<()> {
        let config = self.config.read().await;
        Self::save_to_path(&config, &self.path)
    }

    fn save_to_path(config: &Config, path: &Path) -> Result<()> {
        let config_yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp_path = path.with_extension("yml.tmp");
        fs::write(&tmp_path, config_yaml).with_context(|| {
            format!("Failed to write temporary config to {}", tmp_path.display())
        })?;

        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move config to {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    pub async fn validate(&self) -> Result<()> {
        self.config.read().await.validate()
    }

    pub async fn clone_config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Replaces the config in memory after validating it.
    pub async fn update_config(&self, new_config: Config) -> Result<()> {
        new_config
            .validate()
            .context("New configuration is invalid")?;
        *self.config.write().await = new_config;
        info!("Configuration updated in memory");
        Ok(())
    }

    pub fn as_shared(&self) -> Arc<RwLock<Config>> {
        self.config.clone()
    }

    fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[tokio::test]
    async fn full_config_is_parsed() {
        let temp_file = create_temp_config(
            r#"
version: 1
devices_root: /tmp/razer
sync_effects: false
persist_settings: false
rescan_interval_secs: 9
effects:
  refresh_interval_ms: 25
  key_press_window_ms: 1500
  shutdown_timeout_ms: 800
  render_backoff_ms: 100
"#,
        );

        let config_manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        let config = config_manager.clone_config().await;

        assert_eq!(config.devices_root, PathBuf::from("/tmp/razer"));
        assert!(!config.sync_effects);
        assert!(!config.persist_settings);
        assert_eq!(config.rescan_interval(), Duration::from_secs(9));
        assert_eq!(
            config.effect_settings(),
            EffectSettings {
                refresh: Duration::from_millis(25),
                key_press_window: Duration::from_millis(1500),
                shutdown_timeout: Duration::from_millis(800),
                render_backoff: Duration::from_millis(100),
            }
        );
    }

    #[tokio::test]
    async fn missing_keys_take_defaults() {
        let temp_file = create_temp_config("version: 1\n");
        let config_manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(config_manager.clone_config().await, Config::default());
        assert_eq!(
            Config::default().effect_settings(),
            EffectSettings::default()
        );
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let temp_file = create_temp_config("version: 2\n");
        let err = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported config version 2"));
    }

    #[test]
    fn zero_intervals_fail_validation() {
        let mut config = Config::default();
        config.effects.refresh_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("effects.refresh_interval_ms"));

        let mut config = Config::default();
        config.rescan_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn reload_keeps_old_config_on_parse_error() {
        let temp_file = create_temp_config("version: 1\nsync_effects: false\n");
        let config_manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();

        fs::write(temp_file.path(), "version: [not yaml").unwrap();
        assert!(config_manager.reload().await.is_err());
        assert!(!config_manager.get().await.sync_effects);

        fs::write(temp_file.path(), "version: 1\nsync_effects: true\n").unwrap();
        config_manager.reload().await.unwrap();
        assert!(config_manager.get().await.sync_effects);
    }

    #[tokio::test]
    async fn save_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.yml");
        let config_manager = ConfigManager::new(Config::default(), path.clone());

        let mut changed = Config::default();
        changed.sync_effects = false;
        changed.effects.key_press_window_ms = 500;
        config_manager.update_config(changed.clone()).await.unwrap();
        config_manager.save().await.unwrap();

        assert!(!path.with_extension("yml.tmp").exists());
        let reloaded = ConfigManager::load(Some(path)).await.unwrap();
        assert_eq!(reloaded.clone_config().await, changed);
    }

    #[tokio::test]
    async fn invalid_update_is_refused() {
        let config_manager = ConfigManager::new(Config::default(), PathBuf::from("unused.yml"));
        let mut broken = Config::default();
        broken.effects.shutdown_timeout_ms = 0;
        assert!(config_manager.update_config(broken).await.is_err());
        assert!(config_manager.validate().await.is_ok());
    }

    #[tokio::test]
    async fn change_analysis_separates_hot_and_cold_keys() {
        let temp_file = create_temp_config("version: 1\n");
        let config_manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(config_manager.analyze_config_changes().await, None);

        fs::write(temp_file.path(), "version: 1\nsync_effects: false\n").unwrap();
        assert_eq!(
            config_manager.analyze_config_changes().await,
            Some(ConfigChangeType::HotReload)
        );
        assert_eq!(config_manager.analyze_config_changes().await, None);

        fs::write(
            temp_file.path(),
            "version: 1\nsync_effects: false\ndevices_root: /elsewhere\n",
        )
        .unwrap();
        assert_eq!(
            config_manager.analyze_config_changes().await,
            Some(ConfigChangeType::ColdRestart {
                changed_sections: vec!["devices_root".to_string()],
            })
        );

        fs::write(temp_file.path(), "garbage: [").unwrap();
        assert_eq!(config_manager.analyze_config_changes().await, None);
    }

    #[tokio::test]
    #[serial]
    async fn environment_variable_wins_over_search_path() {
        let temp_file = create_temp_config("version: 1\nrescan_interval_secs: 42\n");
        // SAFETY: tests touching the environment are serialized.
        unsafe { env::set_var("RAZERD_CONFIG", temp_file.path()) };
        let loaded = ConfigManager::load(None).await;
        unsafe { env::remove_var("RAZERD_CONFIG") };

        let config_manager = loaded.unwrap();
        assert_eq!(config_manager.path(), temp_file.path());
        assert_eq!(config_manager.get().await.rescan_interval_secs, 42);
    }

    #[tokio::test]
    #[serial]
    async fn no_file_anywhere_falls_back_to_defaults() {
        let home = TempDir::new().unwrap();
        let old_xdg = env::var_os("XDG_CONFIG_HOME");
        unsafe {
            env::remove_var("RAZERD_CONFIG");
            env::set_var("XDG_CONFIG_HOME", home.path());
        }
        let loaded = ConfigManager::load(None).await;
        unsafe {
            match old_xdg {
                Some(value) => env::set_var("XDG_CONFIG_HOME", value),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        if Path::new("/etc/razerd/config.yml").exists() {
            return;
        }
        let config_manager = loaded.unwrap();
        assert_eq!(config_manager.path(), home.path().join("razerd/config.yml"));
        assert_eq!(config_manager.clone_config().await, Config::default());
    }
}

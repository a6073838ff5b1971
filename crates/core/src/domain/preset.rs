//! Preset and configuration persistence
//!
//! This module provides:
//! - The application config (devices, stream settings, preset directory)
//! - EQ presets with TOML serialization
//! - Hot-reload support via a file system watcher
//!
//! Everything here runs on the control context; the audio path never does
//! file IO.

use crate::domain::params::EqSnapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Audio buffer size in frames
    pub block_size: u32,

    /// Sample rate
    pub sample_rate: u32,

    /// Input device name (None = use default)
    #[serde(default)]
    pub input_device: Option<String>,

    /// Output device name (None = use default)
    #[serde(default)]
    pub output_device: Option<String>,

    /// Preset directory
    pub preset_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            sample_rate: 48000,
            input_device: None,
            output_device: None,
            preset_dir: PathBuf::from("presets"),
        }
    }
}

impl AppConfig {
    /// Default config directory, `~/.config/quinteq` on Linux/Mac and
    /// `%APPDATA%\quinteq` on Windows.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("quinteq"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    /// Load configuration from a TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to a TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }
}

/// A named EQ setting, the unit of persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqPreset {
    pub name: String,
    pub eq: EqSnapshot,
}

impl EqPreset {
    pub fn new(name: impl Into<String>, eq: EqSnapshot) -> Self {
        Self { name: name.into(), eq }
    }

    /// Flat preset: the factory defaults
    pub fn flat() -> Self {
        Self::new("flat", EqSnapshot::default())
    }

    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).await?;
        let preset: Self = toml::from_str(&contents)?;
        // Values written by hand may sit outside the knob ranges.
        let preset = Self { eq: preset.eq.clamped(), ..preset };
        debug!(path = %path.display(), name = %preset.name, "Preset loaded");
        Ok(preset)
    }

    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;
        debug!(path = %path.display(), name = %self.name, "Preset saved");
        Ok(())
    }
}

/// Preset manager over one directory of `*.toml` presets
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    /// List all available presets
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<EqPreset> {
        let path = self.preset_path(name);

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        EqPreset::load_from_file(&path).await
    }

    /// Save a preset by name
    #[instrument(skip(self, preset))]
    pub async fn save_preset(&self, name: &str, preset: &EqPreset) -> Result<()> {
        preset.save_to_file(self.preset_path(name)).await
    }

    /// Delete a preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name);

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    pub async fn preset_exists(&self, name: &str) -> bool {
        self.preset_path(name).exists()
    }

    fn preset_path(&self, name: &str) -> PathBuf {
        self.preset_dir.join(format!("{}.toml", name))
    }
}

/// File system watcher for preset hot-reload
pub struct PresetWatcher {
    _watcher: notify::RecommendedWatcher,
    change_tx: broadcast::Sender<PathBuf>,
}

impl PresetWatcher {
    /// Watch a preset directory; changed or created `*.toml` files are
    /// announced on the broadcast channel.
    pub async fn new(preset_dir: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (change_tx, _change_rx) = broadcast::channel(32);

        fs::create_dir_all(&preset_dir).await?;

        let tx_clone = change_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    for path in event.paths {
                        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                            if let Err(e) = tx_clone.send(path) {
                                error!("Failed to send preset change event: {}", e);
                            }
                        }
                    }
                }
            }
        })?;

        watcher.watch(&preset_dir, notify::RecursiveMode::Recursive)?;

        info!(path = %preset_dir.display(), "Preset watcher started");

        Ok(Self {
            _watcher: watcher,
            change_tx,
        })
    }

    /// Subscribe to preset change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.change_tx.subscribe()
    }
}

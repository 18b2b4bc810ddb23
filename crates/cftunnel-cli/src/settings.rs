//! Persistent settings.
//!
//! Stored as pretty JSON in `~/.cftunnel/settings.json` unless `--settings`
//! points elsewhere.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default per-call limit for `cloudflared` and `systemctl`.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings read at startup and written on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base directory holding one subdirectory per tunnel.
    pub tunnels_dir: PathBuf,
    /// Tunnel client used for registry calls and in launch scripts.
    pub cloudflared_bin: String,
    /// Per-call limit for external tools; `0` disables it.
    pub command_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tunnels_dir: Self::config_dir()
                .map_or_else(|| PathBuf::from("tunnels"), |d| d.join("tunnels")),
            cloudflared_bin: cftunnel_core::lifecycle::DEFAULT_CLIENT.to_string(),
            command_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Path to the settings directory: `~/.cftunnel/`.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".cftunnel"))
    }

    /// Path to the settings file: `~/.cftunnel/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.json"))
    }

    /// Load settings from `path`. Returns defaults if the file doesn't exist
    /// or is invalid.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            tracing::debug!("no settings at {}, using defaults", path.display());
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("ignoring invalid settings file {}: {e}", path.display());
            Self::default()
        })
    }

    /// Save settings to `path`, creating its parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!("saved settings to {}", path.display());
        Ok(())
    }

    pub const fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.command_timeout_secs))
        }
    }

    /// Point the tunnels directory at `dir`, made absolute and created if
    /// missing.
    pub fn set_tunnels_dir(&mut self, dir: &Path) -> Result<()> {
        let dir = std::path::absolute(dir)
            .with_context(|| format!("invalid directory {}", dir.display()))?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        self.tunnels_dir = dir;
        Ok(())
    }
}

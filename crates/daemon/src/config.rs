//! Configuration management for the Ghostveil daemon.
//!
//! Configuration is loaded from TOML files in the following locations
//! (in order):
//! 1. Platform config dir (`%APPDATA%/ghostveil/config.toml` on Windows,
//!    `~/.config/ghostveil/config.toml` elsewhere)
//! 2. `~/.config/ghostveil/config.toml` (Unix-style, for WSL compatibility)
//! 3. `./config.toml` (current directory, for development)
//!
//! The `ghost.enabled` flag is the persisted user setting the hiding
//! subsystem reads before every application attempt; only the
//! enable/disable IPC commands write it.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure for the Ghostveil daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ghost-mode configuration.
    pub ghost: GhostConfig,
    /// Target window identification.
    pub window: WindowConfig,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
}

/// Ghost-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostConfig {
    /// Whether ghost mode is enabled. Read before every application
    /// attempt.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Settle delay in milliseconds between a show/restore event and
    /// strategy re-application.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_delay_ms: default_settle_delay(),
        }
    }
}

/// How the daemon identifies the window to ghost.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Native window identifier handed over by the embedding toolkit.
    /// When present it is threaded through every call; class search is
    /// the last-resort fallback.
    #[serde(default)]
    pub native_id: Option<u64>,

    /// Window class used by last-resort display-server discovery.
    #[serde(default = "default_window_class")]
    pub class: String,

    /// Window title used when class search finds nothing.
    #[serde(default = "default_window_title")]
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            native_id: None,
            class: default_window_class(),
            title: default_window_title(),
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_settle_delay() -> u64 {
    500
}

fn default_window_class() -> String {
    "ghostveil".to_string()
}

fn default_window_title() -> String {
    "Ghostveil".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A non-fatal configuration problem found during validation.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl Config {
    /// Load configuration from the first existing candidate path, falling
    /// back to defaults when none exists.
    pub fn load() -> Result<Self> {
        for path in Self::candidate_paths() {
            if path.exists() {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config from {:?}", path))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("failed to parse config from {:?}", path))?;
                return Ok(config);
            }
        }
        Ok(Config::default())
    }

    /// Persist the configuration to the primary config path.
    pub fn save(&self) -> Result<()> {
        let path = Self::primary_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("failed to write config to {:?}", path))
    }

    /// Validate and clamp config values, returning warnings for anything
    /// adjusted or suspicious.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.ghost.settle_delay_ms > 10_000 {
            warnings.push(ConfigWarning {
                field: "ghost.settle_delay_ms",
                message: format!(
                    "{} ms is implausibly long, clamping to 10000",
                    self.ghost.settle_delay_ms
                ),
            });
            self.ghost.settle_delay_ms = 10_000;
        }

        if self.window.class.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "window.class",
                message: "empty window class, falling back to default".to_string(),
            });
            self.window.class = default_window_class();
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.behavior.log_level.to_lowercase().as_str()) {
            warnings.push(ConfigWarning {
                field: "behavior.log_level",
                message: format!(
                    "unknown log level {:?}, falling back to info",
                    self.behavior.log_level
                ),
            });
            self.behavior.log_level = default_log_level();
        }

        warnings
    }

    fn primary_path() -> PathBuf {
        ProjectDirs::from("", "", "ghostveil")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        paths.push(Self::primary_path());

        // Unix-style path, reachable from inside the compat layer even
        // when the platform dirs crate resolves elsewhere.
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(
                PathBuf::from(home)
                    .join(".config")
                    .join("ghostveil")
                    .join("config.toml"),
            );
        }

        paths.push(PathBuf::from("config.toml"));
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_ghost_mode() {
        let config = Config::default();
        assert!(config.ghost.enabled);
        assert_eq!(config.ghost.settle_delay_ms, 500);
        assert_eq!(config.window.class, "ghostveil");
        assert_eq!(config.behavior.log_level, "info");
        assert!(config.window.native_id.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ghost]
            enabled = false
            "#,
        )
        .unwrap();
        assert!(!config.ghost.enabled);
        assert_eq!(config.ghost.settle_delay_ms, 500);
        assert_eq!(config.window.class, "ghostveil");
    }

    #[test]
    fn full_toml_roundtrip() {
        let mut config = Config::default();
        config.ghost.enabled = false;
        config.ghost.settle_delay_ms = 750;
        config.window.native_id = Some(0x5400007);
        config.window.class = "myapp".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert!(!parsed.ghost.enabled);
        assert_eq!(parsed.ghost.settle_delay_ms, 750);
        assert_eq!(parsed.window.native_id, Some(0x5400007));
        assert_eq!(parsed.window.class, "myapp");
    }

    #[test]
    fn validation_clamps_settle_delay() {
        let mut config = Config::default();
        config.ghost.settle_delay_ms = 60_000;
        let warnings = config.validate();
        assert_eq!(config.ghost.settle_delay_ms, 10_000);
        assert!(warnings.iter().any(|w| w.field == "ghost.settle_delay_ms"));
    }

    #[test]
    fn validation_restores_empty_class() {
        let mut config = Config::default();
        config.window.class = "  ".to_string();
        let warnings = config.validate();
        assert_eq!(config.window.class, "ghostveil");
        assert!(warnings.iter().any(|w| w.field == "window.class"));
    }

    #[test]
    fn validation_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.behavior.log_level = "verbose".to_string();
        let warnings = config.validate();
        assert_eq!(config.behavior.log_level, "info");
        assert!(warnings.iter().any(|w| w.field == "behavior.log_level"));
    }

    #[test]
    fn valid_config_produces_no_warnings() {
        let mut config = Config::default();
        assert!(config.validate().is_empty());
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "linemark";
const CONFIG_FILE: &str = "config.json";

/// User options recognised by linemark. Keys are PascalCase on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MarkConfig {
    /// Save after every mutation.
    pub auto_save: bool,
    /// Replace the in-memory tree without asking when the save file changed on disk.
    pub auto_read_change: bool,
    /// Explicit save file or directory. Empty means "derive from the workspace".
    pub data_save_file_path: Option<String>,
    /// Report marked lines for gutter decoration.
    pub render_line: bool,
    /// Report mark names for hover tooltips.
    pub hover: bool,
    /// Name new marks after their file and line instead of asking.
    pub default_mark_name: bool,
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            auto_read_change: false,
            data_save_file_path: None,
            render_line: true,
            hover: true,
            default_mark_name: false,
        }
    }
}

impl MarkConfig {
    /// Load configuration from the user's config directory, then apply
    /// environment overrides. Falls back to defaults if the file is missing
    /// or fails to parse.
    pub fn load() -> Self {
        let config = match config_path().and_then(|p| Self::load_from(&p)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Apply `LINEMARK_AUTO_SAVE`, `LINEMARK_AUTO_READ_CHANGE` and
    /// `LINEMARK_DATA_FILE`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_flag("LINEMARK_AUTO_SAVE") {
            self.auto_save = v;
        }
        if let Some(v) = env_flag("LINEMARK_AUTO_READ_CHANGE") {
            self.auto_read_change = v;
        }
        if let Ok(path) = std::env::var("LINEMARK_DATA_FILE") {
            self.data_save_file_path = Some(path);
        }
        self
    }

    /// The configured save location, if any.
    pub fn save_path(&self) -> Option<&str> {
        self.data_save_file_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}

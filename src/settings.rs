//! Persisted user settings.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::presets::PromptPreset;
use crate::selection::SettleTiming;

pub const APP_DIR_NAME: &str = "rewrite-text";
pub const DEFAULT_HOTKEY: &str = "Cmd+Escape";
pub const DEFAULT_MODEL: &str = "gpt-5.2";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Id of the active preset. Unknown ids resolve to the first preset.
    pub selected_preset_id: Option<String>,
    pub hotkey: String,
    pub model: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub copy_settle_ms: u64,
    pub paste_settle_ms: u64,
    pub custom_presets: Vec<PromptPreset>,
    /// Level for the rolling log file (trace, debug, info, warn, error).
    pub file_log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            selected_preset_id: None,
            hotkey: DEFAULT_HOTKEY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 60,
            copy_settle_ms: 200,
            paste_settle_ms: 150,
            custom_presets: Vec::new(),
            file_log_level: "debug".to_string(),
        }
    }
}

impl AppSettings {
    pub fn settle_timing(&self) -> SettleTiming {
        SettleTiming {
            copy: std::time::Duration::from_millis(self.copy_settle_ms),
            paste: std::time::Duration::from_millis(self.paste_settle_ms),
        }
    }
}

/// `<config_dir>/rewrite-text/settings.json`
pub fn default_settings_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("no configuration directory for this user")?;
    Ok(dir.join(APP_DIR_NAME).join("settings.json"))
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn load(&self) -> Result<AppSettings> {
        if !self.path.exists() {
            return Ok(AppSettings::default());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading settings file {}", self.path.display()))?;
        let settings: AppSettings =
            serde_json::from_str(&raw).context("failed parsing settings json")?;
        Ok(settings)
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        let Some(parent) = self.path.parent() else {
            anyhow::bail!("settings path has no parent")
        };
        fs::create_dir_all(parent)?;
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed writing settings file {}", self.path.display()))?;
        Ok(())
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BookdeskError, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:4000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_export_dir() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("bookdesk")
        .join("exports")
        .to_string_lossy()
        .to_string()
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_url(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
            export_dir: default_export_dir(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Apply `BOOKDESK_API_URL` / `BOOKDESK_API_TOKEN` on top of the file values.
    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("BOOKDESK_API_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(token) = std::env::var("BOOKDESK_API_TOKEN") {
            self.api_token = if token.trim().is_empty() { None } else { Some(token) };
        }
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn export_path(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.export_dir))
    }
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BOOKDESK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("bookdesk")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Read settings once at startup. A missing or unreadable file yields defaults.
pub fn load_settings() -> Settings {
    let path = settings_path();
    let from_file = if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    };
    from_file.apply_env()
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| BookdeskError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PLATFORMS_DIR: &str = "DESKPILOT_PLATFORMS_DIR";
pub const ENV_TEMPLATES_DIR_NAME: &str = "DESKPILOT_TEMPLATES_DIR_NAME";
pub const ENV_LOG_LEVEL: &str = "DESKPILOT_LOG_LEVEL";
pub const ENV_CAPTURE_TIMEOUT_SECS: &str = "DESKPILOT_CAPTURE_TIMEOUT_SECS";

const DEFAULT_TEMPLATES_DIR_NAME: &str = "templates";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 120;

/// Runtime settings, resolved from the environment with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding `<app>.json` flows and `<app>.resources.json` libraries.
    pub platforms_dir: PathBuf,
    /// Name of the image template directory inside `platforms_dir`.
    pub templates_dir_name: String,
    pub log_level: String,
    pub capture_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platforms_dir: default_platforms_dir(),
            templates_dir_name: DEFAULT_TEMPLATES_DIR_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            capture_timeout_secs: DEFAULT_CAPTURE_TIMEOUT_SECS,
        }
    }
}

fn default_platforms_dir() -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => cwd.join("platforms"),
        Err(_) => dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("deskpilot")
            .join("platforms"),
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_PLATFORMS_DIR) {
            settings.platforms_dir = PathBuf::from(dir);
        }
        if let Some(name) = non_empty(ENV_TEMPLATES_DIR_NAME) {
            settings.templates_dir_name = name;
        }
        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            settings.log_level = level;
        }
        if let Some(secs) = non_empty(ENV_CAPTURE_TIMEOUT_SECS) {
            match secs.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => settings.capture_timeout_secs = secs,
                _ => tracing::warn!(
                    "ignoring invalid {}={:?}, using {}s",
                    ENV_CAPTURE_TIMEOUT_SECS,
                    secs,
                    settings.capture_timeout_secs
                ),
            }
        }
        settings
    }

    pub fn with_platforms_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.platforms_dir = dir.into();
        self
    }

    pub fn platforms_dir(&self) -> &Path {
        &self.platforms_dir
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.platforms_dir.join(&self.templates_dir_name)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}

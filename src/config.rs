use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{rlog_debug, Result};

/// Default directory scanned for plan documents.
const DEFAULT_PLAN_DIR: &str = "plans";
/// Default status file path, relative to the working directory.
const DEFAULT_STATUS_FILE: &str = ".relay/status.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub plan_dir: Option<String>,
    pub status_file: Option<String>,
}

impl Config {
    pub fn config_path() -> PathBuf {
        PathBuf::from("relay.toml")
    }

    pub fn plan_dir(&self) -> PathBuf {
        PathBuf::from(self.plan_dir.as_deref().unwrap_or(DEFAULT_PLAN_DIR))
    }

    pub fn status_file(&self) -> PathBuf {
        PathBuf::from(self.status_file.as_deref().unwrap_or(DEFAULT_STATUS_FILE))
    }

    /// Load `relay.toml` from the working directory, falling back to
    /// defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        rlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            rlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        rlog_debug!(
            "Config loaded: plan_dir={:?}, status_file={:?}",
            config.plan_dir,
            config.status_file
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        fs::write(&path, toml::to_string_pretty(self)?)?;
        rlog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{EngineConfig, OverridePolicy, DEFAULT_BACKEND_TIMEOUT_SECS};
use crate::workflow::{AutoSaveConfig, DEFAULT_AUTOSAVE_INTERVAL_SECS};
use crate::{wlog_debug, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSettings {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: DEFAULT_AUTOSAVE_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub autosave: AutosaveSettings,
    pub backend_timeout_secs: u64,
    pub override_policy: OverridePolicy,
    pub data_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autosave: AutosaveSettings::default(),
            backend_timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            override_policy: OverridePolicy::default(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn wizard_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".wizard"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::wizard_dir()?.join("wizard.toml"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Self::wizard_dir(),
        }
    }

    /// JSON file holding the file backend's workflows.
    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("workflows.json"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        wlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            wlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config = Self::parse(&fs::read_to_string(&path)?)?;
        wlog_debug!(
            "Config loaded: autosave={}/{}s, backend_timeout={}s, override_policy={}, data_dir={:?}",
            config.autosave.enabled,
            config.autosave.interval_seconds,
            config.backend_timeout_secs,
            config.override_policy,
            config.data_dir
        );
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn save(&self) -> Result<()> {
        let wizard_dir = Self::wizard_dir()?;
        wlog_debug!("Config::save wizard_dir={}", wizard_dir.display());
        if !wizard_dir.exists() {
            fs::create_dir_all(&wizard_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        wlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        let data_dir = self.data_dir()?;
        if !data_dir.exists() {
            wlog_debug!("Creating data directory: {}", data_dir.display());
            fs::create_dir_all(&data_dir)?;
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            backend_timeout: Duration::from_secs(self.backend_timeout_secs.max(1)),
            override_policy: self.override_policy,
            autosave: AutoSaveConfig::new(self.autosave.enabled, self.autosave.interval_seconds),
            ..EngineConfig::default()
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

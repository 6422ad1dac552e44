use crate::core::controller::{ControllerSettings, DEFAULT_DEBOUNCE};
use crate::core::currency::Currency;
use crate::providers::exchangerate_api::DEFAULT_BASE_URL;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateApiConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub exchangerate_api: Option<ExchangeRateApiConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            exchangerate_api: Some(ExchangeRateApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
            }),
        }
    }
}

/// Initial amount and currency pair.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DefaultsConfig {
    pub amount: String,
    pub from: String,
    pub to: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            amount: "1".to_string(),
            from: "SGD".to_string(),
            to: "USD".to_string(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            defaults: DefaultsConfig::default(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to built-in
    /// defaults when no config file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "xconv", "xconv")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn rates_base_url(&self) -> &str {
        self.providers
            .exchangerate_api
            .as_ref()
            .map_or(DEFAULT_BASE_URL, |p| &p.base_url)
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            amount_text: self.defaults.amount.clone(),
            source: Currency::from_code(&self.defaults.from),
            target: Currency::from_code(&self.defaults.to),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

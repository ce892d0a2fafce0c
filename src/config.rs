//! Configuration for the budget filter.
//!
//! Loaded from YAML; every field has a default so partial files work.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use pagewatch_dom::Selector;
use pagewatch_filter::FilterSelectors;

use crate::errors::ControllerError;

pub const ENV_ENABLED_DEFAULT: &str = "PAGEWATCH_ENABLED_DEFAULT";
pub const ENV_COOLDOWN_MS: &str = "PAGEWATCH_COOLDOWN_MS";

/// Where the controller finds things on the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub items: String,
    pub price: String,
    pub containers: String,
    pub menu_list: String,
    pub item_list: String,
    pub cart_region: String,
    pub toggle_host: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            items: ".menu-item".to_string(),
            price: ".menu-item-price".to_string(),
            containers: ".menu-category".to_string(),
            menu_list: ".menu-list".to_string(),
            item_list: ".menu-items".to_string(),
            cart_region: ".cart".to_string(),
            toggle_host: ".menu-filters".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageWatchConfig {
    pub selectors: SelectorConfig,
    pub enabled_default: bool,
    pub leading_cooldown_ms: u64,
    pub navigation_debounce_ms: u64,
    pub host_wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub bus_capacity: usize,
    pub log_level: String,
}

impl Default for PageWatchConfig {
    fn default() -> Self {
        Self {
            selectors: SelectorConfig::default(),
            enabled_default: false,
            leading_cooldown_ms: 300,
            navigation_debounce_ms: 150,
            host_wait_timeout_ms: 10_000,
            poll_interval_ms: 100,
            bus_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

impl PageWatchConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Failed to parse config file")
    }

    pub fn leading_cooldown(&self) -> Duration {
        Duration::from_millis(self.leading_cooldown_ms)
    }

    pub fn navigation_debounce(&self) -> Duration {
        Duration::from_millis(self.navigation_debounce_ms)
    }

    pub fn host_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.host_wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn filter_selectors(&self) -> Result<FilterSelectors, ControllerError> {
        Ok(FilterSelectors::parse(
            &self.selectors.items,
            &self.selectors.price,
            &self.selectors.containers,
        )?)
    }

    /// Apply `PAGEWATCH_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ENABLED_DEFAULT) {
            self.enabled_default = parse_bool(&raw)
                .with_context(|| format!("{ENV_ENABLED_DEFAULT}={raw:?} is not a boolean"))?;
            info!(enabled = self.enabled_default, "enabled default overridden from environment");
        }
        if let Some(raw) = lookup(ENV_COOLDOWN_MS) {
            self.leading_cooldown_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_COOLDOWN_MS}={raw:?} is not a number"))?;
            info!(cooldown_ms = self.leading_cooldown_ms, "cooldown overridden from environment");
        }
        Ok(())
    }

    /// Check every selector and interval.
    pub fn validate(&self) -> Result<(), ControllerError> {
        self.filter_selectors()?;
        for raw in [
            &self.selectors.menu_list,
            &self.selectors.item_list,
            &self.selectors.cart_region,
            &self.selectors.toggle_host,
        ] {
            Selector::parse(raw)?;
        }
        if self.poll_interval_ms == 0 {
            return Err(ControllerError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.bus_capacity == 0 {
            return Err(ControllerError::Config(
                "bus_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub struct LoadedConfig {
    pub config: PageWatchConfig,
    pub path: PathBuf,
}

/// Resolve the config file: explicit path, then `./config/pagewatch.yaml`,
/// then the user config directory. A missing file yields defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let local = PathBuf::from("config/pagewatch.yaml");
    if local.exists() {
        return Ok(local);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("pagewatch");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = resolve_config_path(explicit)?;
    let mut config = if fs::try_exists(&path).await.unwrap_or(false) {
        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config = PageWatchConfig::from_yaml_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!("Loaded configuration from: {}", path.display());
        config
    } else {
        warn!("Config file not found, using defaults: {}", path.display());
        PageWatchConfig::default()
    };
    config.apply_env_overrides()?;
    Ok(LoadedConfig { config, path })
}

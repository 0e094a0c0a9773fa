use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::{debug, info};

use crate::listing::DEFAULT_STORAGE_LIMIT;
use crate::prelude::*;

pub const ENV_SETTINGS_PATH: &str = "DRIVE_PORTAL_SETTINGS";
pub const ENV_HOST: &str = "DRIVE_PORTAL_HOST";
pub const ENV_PORT: &str = "DRIVE_PORTAL_PORT";
pub const ENV_PAGE_SIZE: &str = "DRIVE_PORTAL_PAGE_SIZE";
pub const ENV_STORAGE_LIMIT: &str = "DRIVE_PORTAL_STORAGE_LIMIT";
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct ServerSettings {
    host: String,
    port: u16,
    /// Page size of a file listing request
    list_page_size: i32,
    /// Shown as the denominator of the storage usage bar; not enforced
    storage_limit: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            list_page_size: 100,
            storage_limit: DEFAULT_STORAGE_LIMIT,
        }
    }
}

impl ServerSettings {
    pub fn new(host: impl Into<String>, port: u16, list_page_size: i32, storage_limit: u64) -> Self {
        Self {
            host: host.into(),
            port,
            list_page_size,
            storage_limit,
        }
    }

    /// Reads the JSON settings file, falling back to defaults when the file
    /// does not exist.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read settings file {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings file (from `DRIVE_PORTAL_SETTINGS` or the default path) with
    /// environment overrides applied on top.
    pub fn load() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let path = vars
            .get(ENV_SETTINGS_PATH)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SETTINGS_PATH);
        let settings = Self::from_path(Path::new(path))?.with_overrides(&vars)?;
        info!("loaded settings: {}", settings);
        Ok(settings)
    }

    pub fn with_overrides(mut self, vars: &HashMap<String, String>) -> Result<Self> {
        if let Some(host) = vars.get(ENV_HOST) {
            self.host = host.clone();
        }
        if let Some(port) = vars.get(ENV_PORT) {
            self.port = port
                .parse()
                .with_context(|| format!("invalid {}: {}", ENV_PORT, port))?;
        }
        if let Some(page_size) = vars.get(ENV_PAGE_SIZE) {
            self.list_page_size = page_size
                .parse()
                .with_context(|| format!("invalid {}: {}", ENV_PAGE_SIZE, page_size))?;
        }
        if let Some(limit) = vars.get(ENV_STORAGE_LIMIT) {
            self.storage_limit = limit
                .parse()
                .with_context(|| format!("invalid {}: {}", ENV_STORAGE_LIMIT, limit))?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        // the Drive API accepts 1..=1000
        if !(1..=1000).contains(&self.list_page_size) {
            return Err(anyhow!(
                "list_page_size must be between 1 and 1000, got {}",
                self.list_page_size
            ));
        }
        Ok(())
    }
}

// region getters
impl ServerSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
    pub fn list_page_size(&self) -> i32 {
        self.list_page_size
    }
    pub fn storage_limit(&self) -> u64 {
        self.storage_limit
    }
}

// endregion
impl Display for ServerSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ServerSettings {{ addr: {}:{}, page_size: {}, storage_limit: {}B }}",
            self.host, self.port, self.list_page_size, self.storage_limit
        )
    }
}

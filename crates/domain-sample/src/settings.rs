//! # Domain Settings
//!
//! Which domains exist and which namespace each one owns. Settings are read from JSON:
//!
//! ```json
//! {
//!   "domains": [
//!     { "root_key": "main", "base_module": "domain_sample::backoffice" },
//!     { "root_key": "partner", "name": "Partners", "base_module": "domain_sample::partner" }
//!   ]
//! }
//! ```
//!
//! [`Settings::from_env`] reads the file named by `DOMAINS_CONFIG` and falls back to
//! [`Settings::default`] when the variable is unset.

use crate::serializers::PARTNER_DOMAIN;
use crate::{backoffice, partner};
use domain_framework::{DomainConfig, DomainRegistry, MAIN_DOMAIN};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "DOMAINS_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid domain settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("domain #{0} has an empty root_key")]
    EmptyRootKey(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainSettings {
    pub root_key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_module: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub domains: Vec<DomainSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domains: vec![
                DomainSettings {
                    root_key: MAIN_DOMAIN.to_string(),
                    name: None,
                    base_module: Some(backoffice::NAMESPACE.to_string()),
                },
                DomainSettings {
                    root_key: PARTNER_DOMAIN.to_string(),
                    name: None,
                    base_module: Some(partner::NAMESPACE.to_string()),
                },
            ],
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        if let Some(index) = settings
            .domains
            .iter()
            .position(|domain| domain.root_key.trim().is_empty())
        {
            return Err(SettingsError::EmptyRootKey(index));
        }
        debug!(domains = settings.domains.len(), "Parsed domain settings");
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Settings from the file named by `DOMAINS_CONFIG`, or the defaults.
    pub fn from_env() -> Result<Self, SettingsError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                info!(path = ?path, "Loading domain settings");
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn registry(&self) -> DomainRegistry {
        self.domains
            .iter()
            .fold(DomainRegistry::new(), |registry, domain| {
                let config = DomainConfig::new(domain.root_key.as_str(), domain.base_module.as_deref());
                let config = match &domain.name {
                    Some(name) => config.with_name(name.as_str()),
                    None => config,
                };
                registry.with(config)
            })
    }
}

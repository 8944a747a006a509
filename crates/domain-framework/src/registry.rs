//! # Domain Registry
//!
//! A domain is a named execution context (e.g. the internal `main` back office and an
//! external `partner` context) mapped to a code namespace. The registry is built once at
//! bootstrap and then shared read-only (`Arc<DomainRegistry>`) with every operation, which
//! uses [`DomainRegistry::domain_for`] as its authorization primitive.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Root key of the fallback domain.
pub const MAIN_DOMAIN: &str = "main";

/// Unique key of a registered domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKey(String);

impl DomainKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn main() -> Self {
        Self::new(MAIN_DOMAIN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DomainKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for DomainKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration of one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    root_key: DomainKey,
    /// Display label, defaults to the capitalized root key.
    pub name: String,
    base_module: Option<String>,
}

impl DomainConfig {
    pub fn new(root_key: impl Into<DomainKey>, base_module: Option<&str>) -> Self {
        let root_key = root_key.into();
        Self {
            name: capitalize(root_key.as_str()),
            root_key,
            base_module: base_module.map(str::to_string),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root_key(&self) -> &DomainKey {
        &self.root_key
    }

    pub fn base_module(&self) -> Option<&str> {
        self.base_module.as_deref()
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Registered domains, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    configs: Vec<DomainConfig>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a config under its root key. Re-registering a key replaces the previous
    /// config in place.
    pub fn register(&mut self, config: DomainConfig) {
        info!(
            domain = %config.root_key,
            base_module = config.base_module().unwrap_or("<none>"),
            "Registered domain"
        );
        match self
            .configs
            .iter_mut()
            .find(|existing| existing.root_key == config.root_key)
        {
            Some(existing) => *existing = config,
            None => self.configs.push(config),
        }
    }

    /// Builder-style [`DomainRegistry::register`].
    pub fn with(mut self, config: DomainConfig) -> Self {
        self.register(config);
        self
    }

    pub fn get(&self, key: &DomainKey) -> Option<&DomainConfig> {
        self.configs.iter().find(|config| &config.root_key == key)
    }

    pub fn get_mut(&mut self, key: &DomainKey) -> Option<&mut DomainConfig> {
        self.configs.iter_mut().find(|config| &config.root_key == key)
    }

    /// Base module of a domain, if the domain is registered and has one.
    pub fn module_for(&self, key: &DomainKey) -> Option<&str> {
        self.get(key).and_then(DomainConfig::base_module)
    }

    /// The domain owning a namespace: the first registered domain whose base module
    /// matches, otherwise `main` when it is registered.
    pub fn domain_for(&self, base_module: &str) -> Option<&DomainKey> {
        let found = self
            .configs
            .iter()
            .find(|config| config.base_module() == Some(base_module))
            .or_else(|| {
                self.configs
                    .iter()
                    .find(|config| config.root_key.as_str() == MAIN_DOMAIN)
            })
            .map(DomainConfig::root_key);
        debug!(base_module, domain = ?found, "Resolved domain");
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainConfig> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DomainRegistry {
        DomainRegistry::new()
            .with(DomainConfig::new("main", Some("app::backoffice")))
            .with(DomainConfig::new("partner", Some("app::partner")))
    }

    #[test]
    fn test_module_for_returns_base_module() {
        let registry = registry();
        assert_eq!(
            registry.module_for(&DomainKey::from("partner")),
            Some("app::partner")
        );
        assert_eq!(registry.module_for(&DomainKey::from("unknown")), None);
    }

    #[test]
    fn test_domain_for_falls_back_to_main() {
        let registry = registry();
        assert_eq!(
            registry.domain_for("app::partner"),
            Some(&DomainKey::from("partner"))
        );
        assert_eq!(registry.domain_for("app::elsewhere"), Some(&DomainKey::main()));
        assert_eq!(DomainRegistry::new().domain_for("app::partner"), None);
    }

    #[test]
    fn test_domain_for_picks_first_registered_match() {
        let registry = DomainRegistry::new()
            .with(DomainConfig::new("first", Some("shared")))
            .with(DomainConfig::new("second", Some("shared")));
        assert_eq!(registry.domain_for("shared"), Some(&DomainKey::from("first")));
    }

    #[test]
    fn test_register_overwrites_same_key() {
        let mut registry = registry();
        registry.register(DomainConfig::new("partner", Some("app::vendors")));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.module_for(&DomainKey::from("partner")),
            Some("app::vendors")
        );
    }

    #[test]
    fn test_default_name_is_capitalized_and_mutable() {
        let mut registry = registry();
        assert_eq!(registry.get(&DomainKey::main()).unwrap().name, "Main");
        registry.get_mut(&DomainKey::main()).unwrap().name = "Back office".into();
        assert_eq!(registry.get(&DomainKey::main()).unwrap().name, "Back office");
    }
}

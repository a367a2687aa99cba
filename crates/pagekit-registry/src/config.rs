//! Registry configuration

use std::str::FromStr;
use time::Duration;

use crate::error::{RegistryError, Result};
use crate::storage::OwnerContext;

pub const DEFAULT_CACHE_TTL: Duration = Duration::minutes(5);

pub const DEFAULT_MAX_TAGS: usize = 10;

/// What a reload does with a template that fails validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Skip it with a warning and keep loading
    #[default]
    BestEffort,
    /// Abort the whole load
    Strict,
}

impl FromStr for LoadPolicy {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(LoadPolicy::BestEffort),
            "strict" => Ok(LoadPolicy::Strict),
            other => Err(RegistryError::Config(format!("unknown load policy '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// How long a loaded catalog stays fresh
    pub cache_ttl: Duration,
    pub load_policy: LoadPolicy,
    /// Owner whose custom templates are loaded and written
    pub owner: OwnerContext,
    pub max_tags: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            load_policy: LoadPolicy::default(),
            owner: OwnerContext::default(),
            max_tags: DEFAULT_MAX_TAGS,
        }
    }
}

impl RegistryConfig {
    /// Read overrides from `PAGEKIT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ttl) = lookup("PAGEKIT_CACHE_TTL_SECS") {
            let secs: i64 = ttl
                .trim()
                .parse()
                .map_err(|_| RegistryError::Config(format!("invalid PAGEKIT_CACHE_TTL_SECS '{}'", ttl)))?;
            if secs < 0 {
                return Err(RegistryError::Config("PAGEKIT_CACHE_TTL_SECS must not be negative".into()));
            }
            config.cache_ttl = Duration::seconds(secs);
        }

        if let Some(policy) = lookup("PAGEKIT_LOAD_POLICY") {
            config.load_policy = policy.parse()?;
        }

        if let Some(owner) = lookup("PAGEKIT_OWNER") {
            let owner = owner.trim();
            if owner.is_empty() {
                return Err(RegistryError::Config("PAGEKIT_OWNER must not be empty".into()));
            }
            config.owner = OwnerContext::new(owner);
        }

        if let Some(max_tags) = lookup("PAGEKIT_MAX_TAGS") {
            config.max_tags = max_tags
                .trim()
                .parse()
                .map_err(|_| RegistryError::Config(format!("invalid PAGEKIT_MAX_TAGS '{}'", max_tags)))?;
        }

        Ok(config)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load_policy = policy;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = OwnerContext::new(owner);
        self
    }

    pub fn with_max_tags(mut self, max_tags: usize) -> Self {
        self.max_tags = max_tags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.cache_ttl, Duration::minutes(5));
        assert_eq!(config.load_policy, LoadPolicy::BestEffort);
        assert_eq!(config.owner.owner, "local");
    }

    #[test]
    fn test_overrides() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("PAGEKIT_CACHE_TTL_SECS", "30"),
            ("PAGEKIT_LOAD_POLICY", "Strict"),
            ("PAGEKIT_OWNER", "alice"),
            ("PAGEKIT_MAX_TAGS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.cache_ttl, Duration::seconds(30));
        assert_eq!(config.load_policy, LoadPolicy::Strict);
        assert_eq!(config.owner, OwnerContext::new("alice"));
        assert_eq!(config.max_tags, 3);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [("PAGEKIT_CACHE_TTL_SECS", "soon")],
            [("PAGEKIT_CACHE_TTL_SECS", "-1")],
            [("PAGEKIT_LOAD_POLICY", "lenient")],
            [("PAGEKIT_OWNER", " ")],
            [("PAGEKIT_MAX_TAGS", "many")],
        ] {
            assert!(matches!(
                RegistryConfig::from_lookup(lookup(&vars)),
                Err(RegistryError::Config(_))
            ));
        }
    }
}

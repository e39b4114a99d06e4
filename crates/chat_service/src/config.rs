//! Service configuration

use serde::{Deserialize, Serialize};

/// Tunables for the operations layer.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ServiceConfig {
    /// Longest history window returned to clients and handed to the model.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// How many times a store write conflict is retried before surfacing.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: usize,
}

fn default_history_limit() -> usize {
    100
}

fn default_max_conflict_retries() -> usize {
    3
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl ServiceConfig {
    /// Parse a TOML configuration fragment; missing keys keep defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.max_conflict_retries, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml_str("history_limit = 10").unwrap();
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.max_conflict_retries, 3);
    }
}

//! Recognized configuration surface (§6), loaded from a TOML file with
//! environment-variable overrides for deployment-sensitive fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_CURRENCY;

/// Which Vector Index back-end to instantiate at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackendKind {
    Persistent,
    Memory,
}

/// The full recognized configuration surface. All other keys in the source
/// file are ignored by `serde(deny_unknown_fields)` being deliberately
/// absent — unknown keys pass through silently, as §6 specifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store_path: String,
    pub vector_backend: VectorBackendKind,
    pub vector_path: String,
    pub completion_endpoint: String,
    pub vision_model: String,
    pub text_model: String,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_host")]
    pub listen_host: String,
    #[serde(default = "default_port")]
    pub listen_port: u16,
    /// Maximum concurrent in-flight completion-service calls (§5).
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_completions: usize,
}

fn default_embedding_dim() -> usize {
    384
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_in_flight() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: "ledger.sqlite3".to_string(),
            vector_backend: VectorBackendKind::Memory,
            vector_path: "vector-index".to_string(),
            completion_endpoint: "http://127.0.0.1:11434".to_string(),
            vision_model: "local-vision".to_string(),
            text_model: "local-text".to_string(),
            embedding_dim: default_embedding_dim(),
            currency: default_currency(),
            listen_host: default_host(),
            listen_port: default_port(),
            max_in_flight_completions: default_max_in_flight(),
        }
    }
}

/// Error produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load from a TOML file, then apply `LEDGER_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text =
            std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
                path: path_ref.display().to_string(),
                source,
            })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_ref.display().to_string(),
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("LEDGER_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                self.listen_port = port;
            }
        }
        if let Ok(path) = std::env::var("LEDGER_STORE_PATH") {
            self.store_path = path;
        }
        if let Ok(endpoint) = std::env::var("LEDGER_COMPLETION_ENDPOINT") {
            self.completion_endpoint = endpoint;
        }
    }

    /// Validate the configuration surface. Called automatically by `load`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dim != 384 {
            return Err(ConfigError::Invalid(
                "embeddingDim must be 384".to_string(),
            ));
        }
        if self.currency.trim().len() != 3 {
            return Err(ConfigError::Invalid(
                "currency must be a three-letter code".to_string(),
            ));
        }
        if self.max_in_flight_completions == 0 {
            return Err(ConfigError::Invalid(
                "max_in_flight_completions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn wrong_embedding_dim_is_rejected() {
        let mut config = Config::default();
        config.embedding_dim = 256;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_toml_with_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            store_path = "data/ledger.sqlite3"
            vector_backend = "memory"
            vector_path = "data/vectors"
            completion_endpoint = "http://127.0.0.1:11434"
            vision_model = "local-vision"
            text_model = "local-text"
            embedding_dim = 384
            "#,
        )
        .unwrap();

        std::env::set_var("LEDGER_LISTEN_PORT", "9090");
        let config = Config::load(&path).unwrap();
        std::env::remove_var("LEDGER_LISTEN_PORT");

        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.vector_backend, VectorBackendKind::Memory);
    }
}

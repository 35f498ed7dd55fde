/*
 * Responsibility
 * - Environment-driven configuration (key container location, issuer, TTL)
 * - Validation at startup (missing values fail the load, not the first request)
 */
use std::fmt;

use crate::error::KeyStoreError;
use crate::services::token::{AlgorithmId, KeyMaterialStore};

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub key_container_path: String,
    pub key_container_password: String,

    pub issuer: String,
    pub default_algorithm: AlgorithmId,
    pub token_ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let key_container_path = std::env::var("AUTH_KEY_CONTAINER_PATH")
            .map_err(|_| ConfigError::Missing("AUTH_KEY_CONTAINER_PATH"))?;

        let key_container_password = std::env::var("AUTH_KEY_CONTAINER_PASSWORD")
            .map_err(|_| ConfigError::Missing("AUTH_KEY_CONTAINER_PASSWORD"))?;

        let issuer =
            std::env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?;

        let default_algorithm = match std::env::var("AUTH_DEFAULT_ALG") {
            Ok(name) => AlgorithmId::from_name(name.trim())
                .ok_or(ConfigError::Invalid("AUTH_DEFAULT_ALG"))?,
            Err(_) => AlgorithmId::default(),
        };

        let token_ttl_seconds = std::env::var("AUTH_TOKEN_TTL_SECONDS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|_| ConfigError::Invalid("AUTH_TOKEN_TTL_SECONDS"))?
            .unwrap_or(3600);

        Ok(Self {
            key_container_path,
            key_container_password,
            issuer,
            default_algorithm,
            token_ttl_seconds,
        })
    }

    /// Open the key container named by this configuration.
    pub fn open_keystore(&self) -> Result<KeyMaterialStore, KeyStoreError> {
        KeyMaterialStore::load(&self.key_container_path, &self.key_container_password)
    }
}

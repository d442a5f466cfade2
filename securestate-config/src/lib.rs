//! Configuration management for SecureState.
//!
//! [`ConfigManager`] collects settings from environment variables, `.env`
//! files and JSON/TOML documents into one key/value tree. Later sources are
//! deep-merged over earlier ones, so a nested group such as `cookie_options`
//! is updated field by field rather than replaced.

pub mod builder;
pub mod env;
pub mod environment;
pub mod error;
pub mod loader;
pub mod merge;
pub mod validation;

pub use builder::ConfigManagerBuilder;
pub use env::EnvLoader;
pub use environment::{ENVIRONMENT_VAR, Environment};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use merge::deep_merge;
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Main configuration manager
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    pub fn builder() -> ConfigManagerBuilder {
        ConfigManagerBuilder::new()
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;

        let mut config = self.config.write();
        for (key, value) in env_vars {
            config.insert(key, Value::String(value));
        }

        Ok(())
    }

    /// Load a `.env` file into the process environment, then pick it up.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing default .env is not an error
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    /// Load configuration from a file and deep-merge it over current values
    pub fn load_file(&self, path: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge_value(data);
        Ok(())
    }

    /// Deep-merge a JSON object over the current configuration.
    pub fn merge_value(&self, data: Value) {
        let Value::Object(map) = data else {
            return;
        };

        let mut config = self.config.write();
        for (key, value) in map {
            match config.get_mut(&key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    if !value.is_null() {
                        config.insert(key, value);
                    }
                }
            }
        }
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value =
            serde_json::to_value(value).map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.config.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Look up a key, falling back to a dotted path into nested objects.
    fn lookup(&self, key: &str) -> Option<Value> {
        let config = self.config.read();
        if let Some(value) = config.get(key) {
            return Some(value.clone());
        }

        let mut parts = key.split('.');
        let mut current = config.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value; numbers and booleans are rendered as text.
    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.lookup(key) {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(ConfigError::invalid(key, "expected a string")),
            None => Err(ConfigError::KeyNotFound(key.to_string())),
        }
    }

    /// Get an integer value; string values (from the environment) are parsed.
    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.lookup(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| ConfigError::invalid(key, "expected an integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(key, format!("'{}' is not an integer", s))),
            Some(_) => Err(ConfigError::invalid(key, "expected an integer")),
            None => Err(ConfigError::KeyNotFound(key.to_string())),
        }
    }

    /// Get a boolean value; accepts `true/false`, `1/0`, `yes/no`, `on/off` strings.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.lookup(key) {
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(key, format!("'{}' is not a boolean", s))),
            },
            Some(_) => Err(ConfigError::invalid(key, "expected a boolean")),
            None => Err(ConfigError::KeyNotFound(key.to_string())),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Deep-merge configuration from another manager
    pub fn merge(&self, other: &ConfigManager) {
        let snapshot = Value::Object(other.config.read().clone().into_iter().collect());
        self.merge_value(snapshot);
    }

    /// Snapshot the configuration as one JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.config.read().clone().into_iter().collect())
    }

    /// Deserialize the whole tree into `T` and run its validation
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(self.to_value())
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }
}

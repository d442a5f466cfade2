// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Environment variable loader.
///
/// With a prefix, only `PREFIX_*` variables are picked up and their keys are
/// lowercased with the prefix stripped (`SECURESTATE_TOKEN_LENGTH` becomes
/// `token_length`).
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all matching environment variables
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    fn collect(&self, vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        let mut config = HashMap::new();

        for (key, value) in vars {
            match self.prefix {
                Some(ref prefix) => {
                    let stripped = key
                        .strip_prefix(prefix.as_str())
                        .and_then(|rest| rest.strip_prefix('_'));
                    if let Some(rest) = stripped {
                        if !rest.is_empty() {
                            config.insert(rest.to_lowercase(), value);
                        }
                    }
                }
                None => {
                    config.insert(key.to_lowercase(), value);
                }
            }
        }

        config
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_prefix_is_stripped_and_lowercased() {
        let loader = EnvLoader::new(Some("SECURESTATE".to_string()));
        let loaded = loader.collect(vars(&[
            ("SECURESTATE_TOKEN_LENGTH", "16"),
            ("SECURESTATE_COOKIE_PATH", "/app"),
            ("SECURESTATEX_OTHER", "nope"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(loaded.get("token_length").map(String::as_str), Some("16"));
        assert_eq!(loaded.get("cookie_path").map(String::as_str), Some("/app"));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_without_prefix_keeps_everything() {
        let loader = EnvLoader::default();
        let loaded = loader.collect(vars(&[("A_B", "1"), ("C", "2")]));
        assert_eq!(loaded.get("a_b").map(String::as_str), Some("1"));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        assert_eq!(loader.load_var_or("SECURESTATE_NONEXISTENT_12345", "default"), "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::new(Some("SECURESTATE_TEST".to_string()));
        assert!(loader.load_var("MISSING_VAR_67890").is_err());
    }
}

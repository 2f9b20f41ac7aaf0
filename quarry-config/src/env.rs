// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Environment variable loader
///
/// Keys are looked up as `{PREFIX}_{KEY}` in upper case, so `load_var("socket_timeout_ms")`
/// with prefix `QUARRY` reads `QUARRY_SOCKET_TIMEOUT_MS`.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Create a loader for a fixed prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(Some(prefix.into()))
    }

    /// Load a `.env` file into the process environment before reading variables.
    ///
    /// A missing default `.env` is not an error; an explicit path that cannot be read is.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Ok(())
    }

    /// Load all environment variables carrying the prefix, keyed by lowercased suffix
    pub fn load(&self) -> Result<HashMap<String, String>> {
        let mut config = HashMap::new();

        for (key, value) in env::vars() {
            if let Some(ref prefix) = self.prefix {
                if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                    let trimmed_key = rest.trim_start_matches('_');
                    config.insert(trimmed_key.to_lowercase(), value);
                }
            } else {
                config.insert(key.to_lowercase(), value);
            }
        }

        Ok(config)
    }

    /// Full variable name for a key
    pub fn var_name(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.var_name(key)).map_err(ConfigError::EnvError)
    }

    /// Load a variable if it is set, `None` otherwise
    pub fn load_optional(&self, key: &str) -> Option<String> {
        self.load_var(key).ok().filter(|v| !v.is_empty())
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Load and parse a variable, falling back to `default` when it is unset
    pub fn parse_var_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.load_optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid_value(self.var_name(key), e.to_string())),
            None => Ok(default),
        }
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

    // std::env::set_var is unsafe in edition 2024, so these tests only read
    // variables that are either absent or provided by the environment.

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        let value = loader.load_var_or("NONEXISTENT_VAR_12345", "default");

        assert_eq!(value, "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::with_prefix("QUARRY_TEST");
        let result = loader.load_var("MISSING_VAR_67890");

        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    }

    #[test]
    fn test_var_name_applies_prefix() {
        let loader = EnvLoader::with_prefix("QUARRY");
        assert_eq!(loader.var_name("socket_timeout_ms"), "QUARRY_SOCKET_TIMEOUT_MS");

        let bare = EnvLoader::default();
        assert_eq!(bare.var_name("path"), "PATH");
    }

    #[test]
    fn test_parse_var_or_uses_default_when_unset() {
        let loader = EnvLoader::with_prefix("QUARRY_TEST_UNSET");
        let value: u64 = loader.parse_var_or("TIMEOUT", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_var_or_rejects_garbage() {
        // PATH is set on any system we run tests on and is never a number
        if std::env::var("PATH").is_ok() {
            let loader = EnvLoader::default();
            let result: Result<u64> = loader.parse_var_or("PATH", 0);
            assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        }
    }

    #[test]
    fn test_explicit_dotenv_path_must_exist() {
        let loader = EnvLoader::with_prefix("QUARRY");
        let result = loader.load_dotenv(Some("/nonexistent/quarry/.env"));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}

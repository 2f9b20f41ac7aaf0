// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within range
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<T: PartialEq + Display>(value: &T, allowed: &[T], field: &str) -> Result<()> {
        if !allowed.contains(value) {
            let allowed = allowed
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConfigError::ValidationError(format!(
                "{} must be one of [{}], got {}",
                field, allowed, value
            )));
        }
        Ok(())
    }

    /// Validate port number
    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }

    /// Validate a single `host:port` pair and return its parts
    pub fn host_port<'a>(value: &'a str, field: &str) -> Result<(&'a str, u16)> {
        let (host, port) = value.trim().rsplit_once(':').ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "{} entry '{}' must have the form host:port",
                field, value
            ))
        })?;

        Self::not_empty(host, field)?;

        let port: u16 = port.parse().map_err(|_| {
            ConfigError::ValidationError(format!("{} entry '{}' has an invalid port", field, value))
        })?;
        Self::is_port(port, field)?;

        Ok((host, port))
    }

    /// Validate a comma-separated `host:port` list and return the parsed entries
    pub fn host_list<'a>(value: &'a str, field: &str) -> Result<Vec<(&'a str, u16)>> {
        Self::not_empty(value, field)?;

        let hosts = value
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| Self::host_port(entry, field))
            .collect::<Result<Vec<_>>>()?;

        if hosts.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} must contain at least one host:port entry",
                field
            )));
        }
        Ok(hosts)
    }

    /// Validate that two optional settings are either both present or both absent
    pub fn both_or_neither<A, B>(a: &Option<A>, b: &Option<B>, field_a: &str, field_b: &str) -> Result<()> {
        if a.is_some() != b.is_some() {
            return Err(ConfigError::ValidationError(format!(
                "{} and {} must be set together",
                field_a, field_b
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(5, 1, 10, "field").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());
        assert!(ConfigValidator::in_range(11, 1, 10, "field").is_err());
    }

    #[test]
    fn test_range_message_names_bounds() {
        let err = ConfigValidator::in_range(0, 1, 10, "scan_limit").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: scan_limit must be between 1 and 10, got 0"
        );
    }

    #[test]
    fn test_one_of_validation() {
        let allowed = ["http", "https"];
        assert!(ConfigValidator::one_of(&"http", &allowed, "scheme").is_ok());
        assert!(ConfigValidator::one_of(&"ftp", &allowed, "scheme").is_err());
    }

    #[test]
    fn test_port_validation() {
        assert!(ConfigValidator::is_port(9200, "field").is_ok());
        assert!(ConfigValidator::is_port(0, "field").is_err());
    }

    #[test]
    fn test_host_list() {
        let hosts = ConfigValidator::host_list("es1:9200, es2:9201", "address").unwrap();
        assert_eq!(hosts, vec![("es1", 9200), ("es2", 9201)]);

        assert!(ConfigValidator::host_list("", "address").is_err());
        assert!(ConfigValidator::host_list("es1", "address").is_err());
        assert!(ConfigValidator::host_list("es1:http", "address").is_err());
        assert!(ConfigValidator::host_list(":9200", "address").is_err());
        assert!(ConfigValidator::host_list("es1:0", "address").is_err());
    }

    #[test]
    fn test_host_list_without_entries() {
        for value in [",", " , ", ",,"] {
            let err = ConfigValidator::host_list(value, "address").unwrap_err();
            assert_eq!(
                err.to_string(),
                "Validation error: address must contain at least one host:port entry"
            );
        }
    }

    #[test]
    fn test_both_or_neither() {
        let user = Some("elastic".to_string());
        let pass = Some("secret".to_string());
        let none: Option<String> = None;

        assert!(ConfigValidator::both_or_neither(&user, &pass, "username", "password").is_ok());
        assert!(ConfigValidator::both_or_neither(&none, &none, "username", "password").is_ok());
        assert!(ConfigValidator::both_or_neither(&user, &none, "username", "password").is_err());
    }
}

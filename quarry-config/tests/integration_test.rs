//! Integration tests for quarry-config

use quarry_config::*;
use serde::Deserialize;
use std::env;
use std::io::Write;

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    hosts: String,
    timeout_ms: u64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::host_list(&self.hosts, "hosts")?;
        ConfigValidator::in_range(self.timeout_ms, 1, 600_000, "timeout_ms")?;
        ConfigValidator::both_or_neither(&self.username, &self.password, "username", "password")
    }
}

fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_env_loader_with_prefix() {
    let loader = EnvLoader::with_prefix("QUARRY_IT");

    unsafe {
        env::set_var("QUARRY_IT_SCAN_LIMIT", "250");
        env::set_var("QUARRY_IT_INDEX", "");
    }

    assert_eq!(loader.load_var("scan_limit").unwrap(), "250");
    assert_eq!(loader.parse_var_or("scan_limit", 10_000u32).unwrap(), 250);
    assert_eq!(loader.load_optional("index"), None);

    let all = loader.load().unwrap();
    assert_eq!(all.get("scan_limit").map(String::as_str), Some("250"));

    unsafe {
        env::remove_var("QUARRY_IT_SCAN_LIMIT");
        env::remove_var("QUARRY_IT_INDEX");
    }
}

#[test]
fn test_dotenv_file_populates_environment() {
    let file = write_file(".env", "QUARRY_DOTENV_ADDRESS=es-1:9200,es-2:9200\n");
    let loader = EnvLoader::with_prefix("QUARRY_DOTENV");

    loader.load_dotenv(file.path().to_str()).unwrap();
    assert_eq!(loader.load_var("address").unwrap(), "es-1:9200,es-2:9200");

    unsafe {
        env::remove_var("QUARRY_DOTENV_ADDRESS");
    }
}

#[test]
fn test_load_validated_toml_and_json() {
    let toml = write_file(".toml", "hosts = \"localhost:9200\"\ntimeout_ms = 5000\n");
    let config: ServiceConfig = load_file(toml.path()).unwrap();
    assert_eq!(config.hosts, "localhost:9200");

    let json = write_file(
        ".json",
        r#"{ "hosts": "a:9200,b:9201", "timeout_ms": 100, "username": "u", "password": "p" }"#,
    );
    let config: ServiceConfig = load_file(json.path()).unwrap();
    assert_eq!(config.timeout_ms, 100);
}

#[test]
fn test_load_validated_rejects_invalid_values() {
    let missing_port = write_file(".json", r#"{ "hosts": "localhost", "timeout_ms": 100 }"#);
    let result: Result<ServiceConfig> = load_file(missing_port.path());
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));

    let unpaired = write_file(
        ".json",
        r#"{ "hosts": "localhost:9200", "timeout_ms": 100, "username": "u" }"#,
    );
    let result: Result<ServiceConfig> = load_file(unpaired.path());
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_unsupported_extension() {
    let file = write_file(".yaml", "hosts: localhost:9200\n");
    let result: Result<ServiceConfig> = load_file(file.path());
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}

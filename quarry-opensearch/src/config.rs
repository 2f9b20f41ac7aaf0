//! Cluster connection configuration.

use crate::error::{Result, SearchError};
use opensearch::http::Url;
use quarry_config::{ConfigError, ConfigLoader, ConfigValidator, EnvLoader, FileFormat, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of the environment variables read by [`ClusterConfig::from_env`].
pub const ENV_PREFIX: &str = "QUARRY";

/// Largest page the engine serves without a scroll (`index.max_result_window`).
pub const MAX_SCAN_LIMIT: u32 = 10_000;

const SCHEMES: [&str; 2] = ["http", "https"];

/// Cluster connection configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Protocol scheme, `http` or `https`.
    pub scheme: String,
    /// Comma-separated `host:port` list.
    pub address: String,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Socket (request) timeout in milliseconds.
    pub socket_timeout_ms: u64,
    /// Timeout for acquiring a pooled connection, in milliseconds.
    pub connection_request_timeout_ms: u64,
    /// Maximum total connections.
    pub max_connections: u32,
    /// Maximum connections per route.
    pub max_connections_per_route: u32,
    /// Target index name used by callers that work against one index.
    pub index: Option<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Upper bound on hits returned by whole-index scans.
    pub scan_limit: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            address: String::new(),
            connect_timeout_ms: 5_000,
            socket_timeout_ms: 60_000,
            connection_request_timeout_ms: 1_000,
            max_connections: 100,
            max_connections_per_route: 100,
            index: None,
            username: None,
            password: None,
            scan_limit: MAX_SCAN_LIMIT,
        }
    }
}

impl ClusterConfig {
    /// Create a configuration for a comma-separated `host:port` list.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Read `QUARRY_*` environment variables, after loading `.env` if present.
    ///
    /// `QUARRY_ADDRESS` is required; everything else falls back to the defaults.
    pub fn from_env() -> Result<Self> {
        let env = EnvLoader::with_prefix(ENV_PREFIX);
        env.load_dotenv(None)?;
        Self::from_loader(&env)
    }

    /// Build a configuration from an arbitrary environment loader.
    pub fn from_loader(env: &EnvLoader) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            scheme: env.load_var_or("scheme", &defaults.scheme),
            address: env.load_var("address")?,
            connect_timeout_ms: env.parse_var_or("connect_timeout_ms", defaults.connect_timeout_ms)?,
            socket_timeout_ms: env.parse_var_or("socket_timeout_ms", defaults.socket_timeout_ms)?,
            connection_request_timeout_ms: env.parse_var_or(
                "connection_request_timeout_ms",
                defaults.connection_request_timeout_ms,
            )?,
            max_connections: env.parse_var_or("max_connections", defaults.max_connections)?,
            max_connections_per_route: env
                .parse_var_or("max_connections_per_route", defaults.max_connections_per_route)?,
            index: env.load_optional("index"),
            username: env.load_optional("username"),
            password: env.load_optional("password"),
            scan_limit: env.parse_var_or("scan_limit", defaults.scan_limit)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON or TOML configuration file.
    ///
    /// `.env` files are rejected; load them with [`EnvLoader::load_dotenv`] and
    /// read them through [`ClusterConfig::from_env`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;
        if loader.format() == FileFormat::Env {
            return Err(ConfigError::LoadError(format!(
                "{} is an env file; use ClusterConfig::from_env",
                path.display()
            ))
            .into());
        }
        Ok(loader.load_validated(path)?)
    }

    /// Set the protocol scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set socket (request) timeout.
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set connection acquisition timeout.
    pub fn with_connection_request_timeout(mut self, timeout: Duration) -> Self {
        self.connection_request_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set connection pool limits.
    pub fn with_max_connections(mut self, total: u32, per_route: u32) -> Self {
        self.max_connections = total;
        self.max_connections_per_route = per_route;
        self
    }

    /// Set the target index.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Set the scan limit for whole-index enumeration.
    pub fn with_scan_limit(mut self, limit: u32) -> Self {
        self.scan_limit = limit;
        self
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Socket (request) timeout.
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Connection acquisition timeout.
    pub fn connection_request_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_request_timeout_ms)
    }

    /// Parse the address list into node URLs.
    pub fn node_urls(&self) -> Result<Vec<Url>> {
        self.validate()?;

        ConfigValidator::host_list(&self.address, "address")?
            .into_iter()
            .map(|(host, port)| {
                let raw = format!("{}://{}:{}", self.scheme, host, port);
                Url::parse(&raw)
                    .map_err(|e| SearchError::validation(format!("Invalid node URL {}: {}", raw, e)))
            })
            .collect()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Validate for ClusterConfig {
    fn validate(&self) -> quarry_config::Result<()> {
        ConfigValidator::one_of(&self.scheme.as_str(), &SCHEMES, "scheme")?;
        ConfigValidator::host_list(&self.address, "address")?;
        ConfigValidator::in_range(self.connect_timeout_ms, 1, u64::MAX, "connect_timeout_ms")?;
        ConfigValidator::in_range(self.socket_timeout_ms, 1, u64::MAX, "socket_timeout_ms")?;
        ConfigValidator::in_range(
            self.connection_request_timeout_ms,
            1,
            u64::MAX,
            "connection_request_timeout_ms",
        )?;
        ConfigValidator::in_range(self.max_connections, 1, u32::MAX, "max_connections")?;
        ConfigValidator::in_range(
            self.max_connections_per_route,
            1,
            self.max_connections,
            "max_connections_per_route",
        )?;
        if let Some(index) = &self.index {
            ConfigValidator::not_empty(index, "index")?;
        }
        ConfigValidator::both_or_neither(&self.username, &self.password, "username", "password")?;
        ConfigValidator::in_range(self.scan_limit, 1, MAX_SCAN_LIMIT, "scan_limit")?;
        Ok(())
    }
}

// Masks the password.
impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("scheme", &self.scheme)
            .field("address", &self.address)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("socket_timeout_ms", &self.socket_timeout_ms)
            .field("connection_request_timeout_ms", &self.connection_request_timeout_ms)
            .field("max_connections", &self.max_connections)
            .field("max_connections_per_route", &self.max_connections_per_route)
            .field("index", &self.index)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("scan_limit", &self.scan_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::new("localhost:9200");
        assert!(config.validate().is_ok());
        assert_eq!(config.scheme, "http");
        assert_eq!(config.socket_timeout(), Duration::from_secs(60));
        assert_eq!(config.scan_limit, MAX_SCAN_LIMIT);
    }

    #[test]
    fn test_node_urls() {
        let config = ClusterConfig::new("es1:9200,es2:9201").with_scheme("https");
        let urls = config.node_urls().unwrap();

        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "https://es1:9200/");
        assert_eq!(urls[1].as_str(), "https://es2:9201/");
    }

    #[test]
    fn test_rejects_bad_scheme_and_address() {
        assert!(ClusterConfig::new("localhost:9200").with_scheme("ftp").validate().is_err());
        assert!(ClusterConfig::new("").validate().is_err());
        assert!(ClusterConfig::new("localhost").validate().is_err());
        assert!(ClusterConfig::new(" , ").validate().is_err());
        assert!(matches!(
            ClusterConfig::new("localhost").node_urls(),
            Err(SearchError::Config(ConfigError::ValidationError(_)))
        ));
    }

    #[test]
    fn test_credentials_must_be_paired() {
        let mut config = ClusterConfig::new("localhost:9200");
        config.username = Some("elastic".to_string());
        assert!(config.validate().is_err());

        let config = ClusterConfig::new("localhost:9200").with_basic_auth("elastic", "changeme");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_and_scan_limits() {
        let config = ClusterConfig::new("localhost:9200").with_max_connections(10, 20);
        assert!(config.validate().is_err());

        let config = ClusterConfig::new("localhost:9200").with_scan_limit(0);
        assert!(config.validate().is_err());

        let config = ClusterConfig::new("localhost:9200").with_scan_limit(MAX_SCAN_LIMIT + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_masks_password() {
        let config = ClusterConfig::new("localhost:9200").with_basic_auth("elastic", "hunter2");
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("elastic"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile_with_suffix(".toml");
        writeln!(
            file,
            "scheme = \"https\"\naddress = \"es1:9200,es2:9200\"\nsocket_timeout_ms = 2500\nindex = \"skus\""
        )
        .unwrap();

        let config = ClusterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scheme, "https");
        assert_eq!(config.socket_timeout(), Duration::from_millis(2500));
        assert_eq!(config.index.as_deref(), Some("skus"));
        assert_eq!(config.connect_timeout_ms, 5_000);
    }

    #[test]
    fn test_from_file_rejects_env_files() {
        let mut file = tempfile_with_suffix(".env");
        writeln!(file, "ADDRESS=es1:9200").unwrap();

        assert!(matches!(
            ClusterConfig::from_file(file.path()),
            Err(SearchError::Config(ConfigError::LoadError(message))) if message.contains("from_env")
        ));
    }

    #[test]
    fn test_from_loader_requires_address() {
        let env = EnvLoader::with_prefix("QUARRY_TEST_UNSET_PREFIX");
        assert!(matches!(
            ClusterConfig::from_loader(&env),
            Err(SearchError::Config(ConfigError::EnvError(_)))
        ));
    }

    fn tempfile_with_suffix(suffix: &str) -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(suffix).tempfile().unwrap()
    }
}

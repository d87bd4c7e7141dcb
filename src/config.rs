//! Configuration management for Ratewall.
//!
//! Settings come from an optional YAML file and are then overridden by the
//! process environment, read once at startup. The environment uses the
//! conventional libpq names for Postgres (`PGHOST`, `PGPORT`, ...) plus
//! `REDIS_HOST`, `REDIS_PORT`, `LIMITER` and `PORT`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ServiceError};
use crate::ratelimit::LimitPolicy;

/// Main configuration for the Ratewall service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Postgres connection parameters
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Counter store connection parameters
    #[serde(default)]
    pub counter_store: CounterStoreConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// The socket address to bind.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5555
}

/// Postgres connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_pg_host")]
    pub host: String,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    #[serde(default = "default_pg_database")]
    pub database: String,

    #[serde(default = "default_pg_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Upper bound on pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_pg_host(),
            port: default_pg_port(),
            database: default_pg_database(),
            user: default_pg_user(),
            password: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_database() -> String {
    "postgres".to_string()
}

fn default_pg_user() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Which counter store backs the rate limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    /// Shared Redis server
    #[default]
    Redis,
    /// Process-local counters, for single-instance and development use
    Memory,
}

/// Counter store connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterStoreConfig {
    #[serde(default)]
    pub backend: CounterBackend,

    #[serde(default = "default_redis_host")]
    pub host: String,

    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Record hits with a single server-side script instead of three commands
    #[serde(default)]
    pub atomic: bool,
}

impl Default for CounterStoreConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::default(),
            host: default_redis_host(),
            port: default_redis_port(),
            atomic: false,
        }
    }
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests admitted per identity within one window
    pub threshold: Option<u64>,

    /// Window length in seconds; defaults to the threshold value
    pub window_secs: Option<u64>,
}

impl RateLimitingConfig {
    /// Build the limit policy, falling back to the legacy window.
    pub fn policy(&self) -> Result<LimitPolicy> {
        let threshold = self.threshold.ok_or_else(|| {
            ServiceError::Config("rate limit threshold (LIMITER) is not set".to_string())
        })?;

        let policy = match self.window_secs {
            Some(secs) => LimitPolicy::new(threshold, Duration::from_secs(secs)),
            None => LimitPolicy::legacy(threshold),
        };

        if !policy.window_in_range() {
            return Err(ServiceError::Config(format!(
                "rate limit window must be between 1 and {} seconds, got {}",
                LimitPolicy::MAX_WINDOW.as_secs(),
                policy.window().as_secs()
            )));
        }

        Ok(policy)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Flat view of the environment variables the service understands.
#[derive(Debug, Deserialize)]
struct EnvOverrides {
    pghost: Option<String>,
    pgport: Option<u16>,
    pgdatabase: Option<String>,
    pguser: Option<String>,
    pgpassword: Option<String>,
    redis_host: Option<String>,
    redis_port: Option<u16>,
    counter_store: Option<CounterBackend>,
    limiter: Option<u64>,
    limiter_window_secs: Option<u64>,
    limiter_atomic: Option<bool>,
    port: Option<u16>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
}

impl EnvOverrides {
    fn collect(source: config::Environment) -> Result<Self> {
        let overrides = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        Ok(overrides)
    }

    fn apply(self, config: &mut ServiceConfig) {
        let db = &mut config.database;
        if let Some(host) = self.pghost {
            db.host = host;
        }
        if let Some(database) = self.pgdatabase {
            db.database = database;
        }
        if let Some(user) = self.pguser {
            db.user = user;
        }
        if let Some(password) = self.pgpassword {
            db.password = password;
        }
        db.port = self.pgport.unwrap_or(db.port);

        let store = &mut config.counter_store;
        if let Some(host) = self.redis_host {
            store.host = host;
        }
        store.port = self.redis_port.unwrap_or(store.port);
        store.backend = self.counter_store.unwrap_or(store.backend);
        store.atomic = self.limiter_atomic.unwrap_or(store.atomic);

        let limits = &mut config.rate_limiting;
        limits.threshold = self.limiter.or(limits.threshold);
        limits.window_secs = self.limiter_window_secs.or(limits.window_secs);

        config.server.port = self.port.unwrap_or(config.server.port);

        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        config.logging.format = self.log_format.unwrap_or(config.logging.format);
    }
}

impl ServiceConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServiceConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from an optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, config::Environment::default())
    }

    /// Load configuration from an optional file, then the given variables.
    pub fn load_from_vars(path: Option<&Path>, vars: HashMap<String, String>) -> Result<Self> {
        Self::load_with(path, config::Environment::default().source(Some(vars)))
    }

    fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        EnvOverrides::collect(env)?.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can start a service.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.policy()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();

        assert_eq!(config.server.port, 5555);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.counter_store.port, 6379);
        assert_eq!(config.counter_store.backend, CounterBackend::Redis);
        assert!(!config.counter_store.atomic);
    }

    #[test]
    fn test_load_from_libpq_style_variables() {
        let config = ServiceConfig::load_from_vars(
            None,
            vars(&[
                ("PGHOST", "db.internal"),
                ("PGPORT", "6543"),
                ("PGDATABASE", "analytics"),
                ("PGUSER", "reader"),
                ("PGPASSWORD", "12345"),
                ("REDIS_HOST", "cache.internal"),
                ("REDIS_PORT", "6380"),
                ("LIMITER", "100"),
                ("PORT", "8080"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.database, "analytics");
        assert_eq!(config.database.user, "reader");
        assert_eq!(config.database.password, "12345");
        assert_eq!(config.counter_store.host, "cache.internal");
        assert_eq!(config.counter_store.port, 6380);
        assert_eq!(config.rate_limiting.threshold, Some(100));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_missing_threshold_is_rejected() {
        let result = ServiceConfig::load_from_vars(None, vars(&[("PGHOST", "db")]));
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_legacy_window_follows_threshold() {
        let config = ServiceConfig::load_from_vars(None, vars(&[("LIMITER", "20")])).unwrap();
        let policy = config.rate_limiting.policy().unwrap();

        assert_eq!(policy.threshold(), 20);
        assert_eq!(policy.window(), Duration::from_secs(20));
    }

    #[test]
    fn test_independent_window() {
        let config = ServiceConfig::load_from_vars(
            None,
            vars(&[("LIMITER", "20"), ("LIMITER_WINDOW_SECS", "60")]),
        )
        .unwrap();
        let policy = config.rate_limiting.policy().unwrap();

        assert_eq!(policy.threshold(), 20);
        assert_eq!(policy.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let result = ServiceConfig::load_from_vars(None, vars(&[("LIMITER", "0")]));
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_window_beyond_store_range_is_rejected() {
        let result = ServiceConfig::load_from_vars(None, vars(&[("LIMITER", "1000000000000000000")]));
        assert!(matches!(result, Err(ServiceError::Config(_))));

        let max_secs = LimitPolicy::MAX_WINDOW.as_secs().to_string();
        let config = ServiceConfig::load_from_vars(
            None,
            vars(&[("LIMITER", "5"), ("LIMITER_WINDOW_SECS", &max_secs)]),
        )
        .unwrap();
        assert_eq!(
            config.rate_limiting.policy().unwrap().window().as_secs(),
            LimitPolicy::MAX_WINDOW.as_secs()
        );

        let past_max = (LimitPolicy::MAX_WINDOW.as_secs() + 1).to_string();
        let result = ServiceConfig::load_from_vars(
            None,
            vars(&[("LIMITER", "5"), ("LIMITER_WINDOW_SECS", &past_max)]),
        );
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_backend_and_format_from_env() {
        let config = ServiceConfig::load_from_vars(
            None,
            vars(&[
                ("LIMITER", "5"),
                ("COUNTER_STORE", "memory"),
                ("LIMITER_ATOMIC", "true"),
                ("LOG_FORMAT", "json"),
            ]),
        )
        .unwrap();

        assert_eq!(config.counter_store.backend, CounterBackend::Memory);
        assert!(config.counter_store.atomic);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_file_then_env_precedence() {
        let path = std::env::temp_dir().join(format!("ratewall-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "server:\n  port: 7000\nrate_limiting:\n  threshold: 10\n  window_secs: 30\ndatabase:\n  host: file-db\n",
        )
        .unwrap();

        let config = ServiceConfig::load_from_vars(Some(&path), vars(&[("PGHOST", "env-db")])).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.database.host, "env-db");
        assert_eq!(config.rate_limiting.threshold, Some(10));
        assert_eq!(config.rate_limiting.window_secs, Some(30));
    }
}

use std::time::Duration;

use tether_data::DataError;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection parameters for a backend pool.
///
/// The URL is treated as an opaque connection string handed to the driver
/// (`sqlite://path`, `postgres://…`, `mysql://…`); driver-native
/// environment fallbacks (`PGHOST`, `PGUSER`, …) apply where the driver
/// itself honors them.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long `query`/`execute` may wait for a free connection before
    /// failing with a pool timeout.
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Read `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS`, and
    /// `DATABASE_ACQUIRE_TIMEOUT_SECS` from the environment.
    pub fn from_env() -> Result<Self, DataError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| DataError::Config("DATABASE_URL is not set".to_string()))?;
        let mut config = Self::new(url);

        if let Ok(raw) = std::env::var("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = raw.parse().map_err(|_| {
                DataError::Config(format!("DATABASE_MAX_CONNECTIONS is not a number: {raw}"))
            })?;
        }
        if let Ok(raw) = std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                DataError::Config(format!(
                    "DATABASE_ACQUIRE_TIMEOUT_SECS is not a number: {raw}"
                ))
            })?;
            config.acquire_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("DATABASE_MAX_CONNECTIONS");
        std::env::remove_var("DATABASE_ACQUIRE_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn from_env_requires_url() {
        clear_env();
        let err = DatabaseConfig::from_env().unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
    }

    #[test]
    #[serial]
    fn from_env_applies_defaults_and_overrides() {
        clear_env();
        std::env::set_var("DATABASE_URL", "sqlite://data/app.db");
        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);

        std::env::set_var("DATABASE_MAX_CONNECTIONS", "12");
        std::env::set_var("DATABASE_ACQUIRE_TIMEOUT_SECS", "3");
        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_rejects_malformed_numbers() {
        clear_env();
        std::env::set_var("DATABASE_URL", "sqlite://data/app.db");
        std::env::set_var("DATABASE_MAX_CONNECTIONS", "many");
        let err = DatabaseConfig::from_env().unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
        clear_env();
    }
}

//! Server settings read from `API_*` environment variables
//!
//! | variable                  | default                                 |
//! |---------------------------|-----------------------------------------|
//! | `API_HOST`                | `0.0.0.0`                               |
//! | `API_PORT`                | `8080`                                  |
//! | `API_JWT_SECRET`          | none, must be set                       |
//! | `API_JWT_EXPIRATION_SECS` | `3600`                                  |
//! | `API_DATABASE_URL`        | `postgres://localhost/freight_billing`  |
//! | `API_MAX_CONNECTIONS`     | `10`                                    |
//! | `API_LOG_LEVEL`           | `info`, overridden by `RUST_LOG`        |
//! | `API_LOG_JSON`            | `false`                                 |
//! | `API_STORE`               | `postgres` (or `memory`)                |

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Which document store backs the billing collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory; data is lost on restart
    Memory,
    #[default]
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Lifetime of tokens signed with `jwt_secret`
    pub jwt_expiration_secs: u64,
    pub database_url: String,
    pub max_connections: u32,
    pub log_level: String,
    pub log_json: bool,
    pub store: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            jwt_secret: String::new(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/freight_billing".into(),
            max_connections: 10,
            log_level: "info".into(),
            log_json: false,
            store: StoreBackend::Postgres,
        }
    }
}

impl ApiConfig {
    /// Reads the environment over the defaults and checks the result
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings: Self = Config::builder()
            .add_source(Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let problem = if self.jwt_secret.trim().is_empty() {
            Some("API_JWT_SECRET must be set")
        } else if self.max_connections == 0 {
            Some("API_MAX_CONNECTIONS must be positive")
        } else {
            None
        };
        match problem {
            Some(message) => Err(ConfigError::Message(message.to_string())),
            None => Ok(()),
        }
    }

    /// `host:port` to bind
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret() -> ApiConfig {
        ApiConfig {
            jwt_secret: "s3cret".to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_secret_is_required() {
        let error = ApiConfig::default().validate().unwrap_err();
        assert!(error.to_string().contains("API_JWT_SECRET"));
        assert!(with_secret().validate().is_ok());
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let config = ApiConfig {
            max_connections: 0,
            ..with_secret()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = with_secret();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.store, StoreBackend::Postgres);
    }

    #[test]
    fn test_store_backend_names() {
        let backend: StoreBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StoreBackend::Memory);
    }
}

// Server configuration
//
// Everything is read from environment variables (optionally seeded from a
// .env file by main). Unset DATABASE_URL means dev mode: in-memory storage
// with demo data.

use std::net::SocketAddr;

/// Errors from parsing configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL connection string; `None` selects in-memory storage
    pub database_url: Option<String>,
    /// HTTP listen address
    pub bind_addr: SocketAddr,
    /// Prefix for versioned API routes, e.g. "/api"
    pub api_prefix: String,
    /// Allowed CORS origins; empty means same-origin only
    pub cors_allowed_origins: Vec<String>,
    /// Apply bundled migrations on startup (PostgreSQL only)
    pub run_migrations: bool,
    /// Seed demo employees, groups and the leave workflow
    pub seed_demo_data: bool,
    /// Attempts per advance call, including the first
    pub advance_retry_attempts: u32,
}

impl ServerConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `DATABASE_URL`: PostgreSQL URL (unset: in-memory dev mode)
    /// - `BIND_ADDR`: listen address (default: "0.0.0.0:9000")
    /// - `API_PREFIX`: route prefix (default: none)
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated origins
    /// - `RUN_MIGRATIONS`: "true"/"false" (default: true)
    /// - `SEED_DEMO_DATA`: "true"/"false" (default: true in dev mode only)
    /// - `ADVANCE_RETRY_ATTEMPTS`: attempts per advance (default: 2)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL");
        let dev_mode = database_url.is_none();

        let bind_addr = match get("BIND_ADDR") {
            Some(value) => value.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    key: "BIND_ADDR",
                    value,
                    reason: e.to_string(),
                }
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 9000)),
        };

        let advance_retry_attempts = match get("ADVANCE_RETRY_ATTEMPTS") {
            Some(value) => match value.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "ADVANCE_RETRY_ATTEMPTS",
                        value,
                        reason: "expected a positive integer".to_string(),
                    })
                }
            },
            None => 2,
        };

        Ok(Self {
            database_url,
            bind_addr,
            api_prefix: get("API_PREFIX").unwrap_or_default(),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            run_migrations: parse_flag("RUN_MIGRATIONS", get("RUN_MIGRATIONS"), true)?,
            seed_demo_data: parse_flag("SEED_DEMO_DATA", get("SEED_DEMO_DATA"), dev_mode)?,
            advance_retry_attempts,
        })
    }

    /// In-memory storage
    pub fn is_dev_mode(&self) -> bool {
        self.database_url.is_none()
    }
}

fn parse_flag(
    key: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_are_dev_mode() {
        let config = config(&[]).unwrap();
        assert!(config.is_dev_mode());
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.api_prefix, "");
        assert!(config.run_migrations);
        assert!(config.seed_demo_data);
        assert_eq!(config.advance_retry_attempts, 2);
    }

    #[test]
    fn test_database_url_disables_seed_by_default() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/hr")]).unwrap();
        assert!(!config.is_dev_mode());
        assert!(!config.seed_demo_data);

        let config = config_with_seed();
        assert!(config.seed_demo_data);
    }

    fn config_with_seed() -> ServerConfig {
        config(&[
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("SEED_DEMO_DATA", "yes"),
        ])
        .unwrap()
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config(&[("DATABASE_URL", "  "), ("BIND_ADDR", "")]).unwrap();
        assert!(config.is_dev_mode());
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_cors_origins_split() {
        let config = config(&[(
            "CORS_ALLOWED_ORIGINS",
            "https://a.example.com, https://b.example.com,",
        )])
        .unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(config(&[("ADVANCE_RETRY_ATTEMPTS", "0")]).is_err());
        assert!(config(&[("ADVANCE_RETRY_ATTEMPTS", "many")]).is_err());
        assert!(config(&[("RUN_MIGRATIONS", "sometimes")]).is_err());
    }
}

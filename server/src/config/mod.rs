use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_NAME: &str = "TicketLelo";
pub(crate) const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} is required when SMTP_HOST is set")]
    MissingSmtp(&'static str),
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub store_timeout: Duration,
    pub allowed_origins: Vec<String>,
    pub production: bool,
    pub admin_token: Option<String>,
    pub app_url: String,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let smtp = match get("SMTP_HOST") {
            None => None,
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(get("SMTP_PORT"), "SMTP_PORT", DEFAULT_SMTP_PORT)?,
                username: get("SMTP_USERNAME").ok_or(ConfigError::MissingSmtp("SMTP_USERNAME"))?,
                password: get("SMTP_PASSWORD").ok_or(ConfigError::MissingSmtp("SMTP_PASSWORD"))?,
                from_email: get("SMTP_FROM_EMAIL")
                    .ok_or(ConfigError::MissingSmtp("SMTP_FROM_EMAIL"))?,
                from_name: get("SMTP_FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            }),
        };

        let allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            database_url: get("DATABASE_URL"),
            max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            host: parse_or(get("HOST"), "HOST", DEFAULT_HOST)?,
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            store_timeout: Duration::from_millis(parse_or(
                get("STORE_TIMEOUT_MS"),
                "STORE_TIMEOUT_MS",
                DEFAULT_STORE_TIMEOUT_MS,
            )?),
            allowed_origins,
            production: get("RUST_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
            admin_token: get("ADMIN_API_TOKEN"),
            app_url: get("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            smtp,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .split(',')
                .map(str::to_string)
                .collect(),
            production: false,
            admin_token: None,
            app_url: DEFAULT_APP_URL.to_string(),
            smtp: None,
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:3001");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.allowed_origins.len(), 2);
        assert!(!config.production);
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_smtp_requires_credentials() {
        let err = config_from(&[("SMTP_HOST", "smtp.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSmtp("SMTP_USERNAME")));

        let config = config_from(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", "secret"),
            ("SMTP_FROM_EMAIL", "tickets@example.com"),
        ])
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_name, "TicketLelo");
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("DATABASE_URL", "  "), ("RUST_ENV", "Production")]).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.production);
    }
}

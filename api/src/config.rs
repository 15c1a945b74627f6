//! Runtime configuration read from the environment (and `.env` when present).

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FIREBASE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "password";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Unknown STORAGE_BACKEND '{0}', expected 'memory' or 'firebase'")]
    UnknownBackend(String),
    #[error("FIREBASE_DATABASE_URL is required when STORAGE_BACKEND is 'firebase'")]
    MissingFirebaseUrl,
    #[error("Invalid FIREBASE_DATABASE_URL '{value}': {reason}")]
    InvalidFirebaseUrl { value: String, reason: String },
    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Which storage backend the server runs on.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Memory,
    Firebase {
        database_url: Url,
        auth_token: Option<String>,
        timeout: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub backend: StorageBackend,
    pub seed_sample_listings: bool,
    pub admin_username: String,
    pub admin_password: String,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_port(lookup("PORT"));

        let backend_name = lookup("STORAGE_BACKEND")
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "memory".to_string());

        let backend = match backend_name.as_str() {
            "memory" => StorageBackend::Memory,
            "firebase" => {
                let raw_url = lookup("FIREBASE_DATABASE_URL")
                    .filter(|v| !v.trim().is_empty())
                    .ok_or(ConfigError::MissingFirebaseUrl)?;
                let database_url =
                    Url::parse(raw_url.trim()).map_err(|e| ConfigError::InvalidFirebaseUrl {
                        value: raw_url.clone(),
                        reason: e.to_string(),
                    })?;
                let timeout_secs = match lookup("FIREBASE_TIMEOUT_SECS") {
                    Some(raw) => parse_value("FIREBASE_TIMEOUT_SECS", &raw)?,
                    None => DEFAULT_FIREBASE_TIMEOUT_SECS,
                };
                StorageBackend::Firebase {
                    database_url,
                    auth_token: lookup("FIREBASE_AUTH_TOKEN").filter(|v| !v.is_empty()),
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let seed_sample_listings = match lookup("SEED_SAMPLE_LISTINGS") {
            Some(raw) => parse_flag("SEED_SAMPLE_LISTINGS", &raw)?,
            None => backend == StorageBackend::Memory,
        };

        Ok(Self {
            port,
            backend,
            seed_sample_listings,
            admin_username: lookup("ADMIN_USERNAME")
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password: lookup("ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
        })
    }
}

fn parse_port(value: Option<String>) -> u16 {
    match value {
        Some(port_str) => match u16::from_str(port_str.trim()) {
            Ok(port_num) => {
                info!("Using port {} from environment variable PORT.", port_num);
                port_num
            }
            Err(_) => {
                warn!(
                    "Invalid PORT value '{}' in environment variable. Using default port {}.",
                    port_str, DEFAULT_PORT
                );
                DEFAULT_PORT
            }
        },
        None => {
            info!(
                "PORT environment variable not set. Using default port {}.",
                DEFAULT_PORT
            );
            DEFAULT_PORT
        }
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_seeded_memory_backend() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.backend, StorageBackend::Memory);
        assert!(config.seed_sample_listings);
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.admin_password, "password");
    }

    #[rstest]
    #[case::valid("8080", 8080)]
    #[case::padded(" 4000 ", 4000)]
    #[case::not_a_number("eighty", DEFAULT_PORT)]
    #[case::out_of_range("70000", DEFAULT_PORT)]
    fn port_falls_back_on_invalid_values(#[case] raw: &str, #[case] expected: u16) {
        assert_eq!(config(&[("PORT", raw)]).unwrap().port, expected);
    }

    #[test]
    fn firebase_backend_reads_connection_settings() {
        let config = config(&[
            ("STORAGE_BACKEND", "Firebase"),
            ("FIREBASE_DATABASE_URL", "https://demo-default-rtdb.firebaseio.com"),
            ("FIREBASE_AUTH_TOKEN", "secret"),
            ("FIREBASE_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        let StorageBackend::Firebase {
            database_url,
            auth_token,
            timeout,
        } = config.backend
        else {
            panic!("expected firebase backend");
        };
        assert_eq!(database_url.host_str(), Some("demo-default-rtdb.firebaseio.com"));
        assert_eq!(auth_token.as_deref(), Some("secret"));
        assert_eq!(timeout, Duration::from_secs(3));
        assert!(!config.seed_sample_listings);
    }

    #[test]
    fn firebase_backend_requires_url() {
        assert_eq!(
            config(&[("STORAGE_BACKEND", "firebase")]),
            Err(ConfigError::MissingFirebaseUrl)
        );
        assert!(matches!(
            config(&[
                ("STORAGE_BACKEND", "firebase"),
                ("FIREBASE_DATABASE_URL", "not a url"),
            ]),
            Err(ConfigError::InvalidFirebaseUrl { .. })
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert_eq!(
            config(&[("STORAGE_BACKEND", "postgres")]),
            Err(ConfigError::UnknownBackend("postgres".to_string()))
        );
    }

    #[rstest]
    #[case::explicit_off("false", false)]
    #[case::numeric_on("1", true)]
    fn seed_flag_overrides_backend_default(#[case] raw: &str, #[case] expected: bool) {
        let config = config(&[("SEED_SAMPLE_LISTINGS", raw)]).unwrap();
        assert_eq!(config.seed_sample_listings, expected);
    }

    #[test]
    fn malformed_seed_flag_is_an_error() {
        assert!(matches!(
            config(&[("SEED_SAMPLE_LISTINGS", "maybe")]),
            Err(ConfigError::InvalidValue { name: "SEED_SAMPLE_LISTINGS", .. })
        ));
    }
}

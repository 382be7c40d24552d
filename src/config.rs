use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ORDER_TX_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_ORDER_TX_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_IDENTITY_LOOKUP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";
const DEFAULT_IDENTITY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_ARCHIVE_TIMEOUT_MS: u64 = 60_000;
const MIN_ARCHIVE_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_ARCHIVE_MAX_ATTEMPTS: u32 = 3;
const MAX_ARCHIVE_ATTEMPTS: u32 = 4;
const DEFAULT_ARCHIVE_BACKOFF_MS: u64 = 700;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_SWEEP_MIN_AGE_SECS: u64 = 900;
const DEFAULT_SWEEP_BATCH: i64 = 25;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub lookup_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Settings for the external order archive. Absent when no endpoint is configured.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub endpoint: String,
    /// Sent as the `secret` query parameter.
    pub shared_secret: Option<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl ArchiveConfig {
    /// Longest a single archival can run: every attempt timing out plus the
    /// linear backoff between attempts.
    pub fn worst_case_budget(&self) -> Duration {
        let attempts = self.timeout.saturating_mul(self.max_attempts);
        let backoff_steps: u32 = (1..self.max_attempts).sum();
        attempts.saturating_add(self.backoff.saturating_mul(backoff_steps))
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub interval: Duration,
    /// Orders younger than this are left to their own deferred archival task.
    pub min_age: Duration,
    pub batch: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub order_tx_max_attempts: u32,
    /// Applied as `lock_timeout` and `statement_timeout` inside the order transaction.
    pub order_tx_timeout: Duration,
    pub identity: IdentityConfig,
    pub archive: Option<ArchiveConfig>,
    pub sweep: SweepConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;
        let order_tx_max_attempts =
            parse_or(&get, "ORDER_TX_MAX_ATTEMPTS", DEFAULT_ORDER_TX_MAX_ATTEMPTS)?.max(1);
        let order_tx_timeout = Duration::from_millis(
            parse_or(&get, "ORDER_TX_TIMEOUT_MS", DEFAULT_ORDER_TX_TIMEOUT_MS)?.max(1),
        );

        let identity = IdentityConfig {
            lookup_url: get("IDENTITY_LOOKUP_URL").unwrap_or_else(|| DEFAULT_IDENTITY_LOOKUP_URL.to_string()),
            api_key: get("IDENTITY_API_KEY").ok_or(ConfigError::Missing("IDENTITY_API_KEY"))?,
            timeout: Duration::from_millis(parse_or(&get, "IDENTITY_TIMEOUT_MS", DEFAULT_IDENTITY_TIMEOUT_MS)?),
        };

        let archive = match get("ARCHIVE_ENDPOINT") {
            Some(endpoint) => Some(ArchiveConfig {
                endpoint,
                shared_secret: get("ARCHIVE_SHARED_SECRET"),
                timeout: Duration::from_millis(
                    parse_or(&get, "ARCHIVE_TIMEOUT_MS", DEFAULT_ARCHIVE_TIMEOUT_MS)?.max(MIN_ARCHIVE_TIMEOUT_MS),
                ),
                max_attempts: parse_or(&get, "ARCHIVE_MAX_ATTEMPTS", DEFAULT_ARCHIVE_MAX_ATTEMPTS)?
                    .clamp(1, MAX_ARCHIVE_ATTEMPTS),
                backoff: Duration::from_millis(parse_or(&get, "ARCHIVE_BACKOFF_MS", DEFAULT_ARCHIVE_BACKOFF_MS)?),
            }),
            None => {
                warn!("ARCHIVE_ENDPOINT is not set. Orders will not be archived externally.");
                None
            }
        };

        let sweep = SweepConfig {
            interval: Duration::from_secs(
                parse_or(&get, "ARCHIVE_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?.max(1),
            ),
            min_age: Duration::from_secs(parse_or(&get, "ARCHIVE_SWEEP_MIN_AGE_SECS", DEFAULT_SWEEP_MIN_AGE_SECS)?),
            batch: parse_or(&get, "ARCHIVE_SWEEP_BATCH", DEFAULT_SWEEP_BATCH)?.max(1),
        };
        if let Some(archive) = &archive {
            if sweep.min_age <= archive.worst_case_budget() {
                return Err(ConfigError::Invalid {
                    name: "ARCHIVE_SWEEP_MIN_AGE_SECS",
                    value: sweep.min_age.as_secs().to_string(),
                });
            }
        }

        Ok(Self {
            host,
            port,
            database_url,
            order_tx_max_attempts,
            order_tx_timeout,
            identity,
            archive,
            sweep,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/orders"),
        ("IDENTITY_API_KEY", "key"),
    ];

    #[test]
    fn defaults_apply_and_archival_is_optional() {
        let cfg = config(&REQUIRED).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.order_tx_max_attempts, 5);
        assert_eq!(cfg.order_tx_timeout, Duration::from_millis(5_000));
        assert_eq!(cfg.identity.lookup_url, DEFAULT_IDENTITY_LOOKUP_URL);
        assert!(cfg.archive.is_none());
        assert_eq!(cfg.sweep.min_age, Duration::from_secs(900));
        assert_eq!(cfg.sweep.batch, 25);
    }

    #[test]
    fn missing_required_values_are_reported() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
        assert_eq!(
            config(&[("DATABASE_URL", "postgres://x"), ("IDENTITY_API_KEY", "  ")]).unwrap_err(),
            ConfigError::Missing("IDENTITY_API_KEY")
        );
    }

    #[test]
    fn archive_settings_are_clamped() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("ARCHIVE_ENDPOINT", "https://script.example.com/exec"),
            ("ARCHIVE_SHARED_SECRET", "s3cret"),
            ("ARCHIVE_TIMEOUT_MS", "1000"),
            ("ARCHIVE_MAX_ATTEMPTS", "9"),
        ]);
        let archive = config(&vars).unwrap().archive.unwrap();
        assert_eq!(archive.timeout, Duration::from_millis(15_000));
        assert_eq!(archive.max_attempts, 4);
        assert_eq!(archive.backoff, Duration::from_millis(700));
        assert_eq!(archive.shared_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn sweep_age_must_outlast_archival() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("ARCHIVE_ENDPOINT", "https://script.example.com/exec"),
            ("ARCHIVE_TIMEOUT_MS", "600000"),
            ("ARCHIVE_MAX_ATTEMPTS", "4"),
            ("ARCHIVE_SWEEP_MIN_AGE_SECS", "0"),
        ]);
        assert_eq!(
            config(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "ARCHIVE_SWEEP_MIN_AGE_SECS",
                value: "0".to_string()
            }
        );

        // 4 x 600s + 700ms x (1 + 2 + 3) = 2404.2s
        vars.pop();
        vars.push(("ARCHIVE_SWEEP_MIN_AGE_SECS", "2404"));
        assert!(config(&vars).is_err());
        vars.pop();
        vars.push(("ARCHIVE_SWEEP_MIN_AGE_SECS", "2405"));
        assert_eq!(config(&vars).unwrap().sweep.min_age, Duration::from_secs(2405));
    }

    #[test]
    fn default_sweep_age_fits_default_archival() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("ARCHIVE_ENDPOINT", "https://script.example.com/exec"));
        let cfg = config(&vars).unwrap();
        let archive = cfg.archive.unwrap();
        assert_eq!(archive.worst_case_budget(), Duration::from_millis(182_100));
        assert!(cfg.sweep.min_age > archive.worst_case_budget());
    }

    #[test]
    fn unparseable_numbers_are_errors() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        assert_eq!(
            config(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "PORT",
                value: "eighty".to_string()
            }
        );
    }
}

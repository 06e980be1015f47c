//! Configuration loading from environment.

use std::env;

use backoffice_hex::inbound::DEFAULT_REQUESTS_PER_MINUTE;
use backoffice_types::{DEFAULT_MAX_AMOUNT, Money};

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub rate_limit_per_minute: u32,
    /// Largest payment amount accepted, in minor units.
    pub max_payment_amount: Money,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = get("PORT").unwrap_or_else(|| "3000".to_string()).parse()?;

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let rate_limit_per_minute = match get("RATE_LIMIT_PER_MINUTE") {
            Some(raw) => raw.parse()?,
            None => DEFAULT_REQUESTS_PER_MINUTE,
        };

        let max_payment_amount = match get("MAX_PAYMENT_AMOUNT") {
            Some(raw) => Money::new(raw.parse()?)?,
            None => DEFAULT_MAX_AMOUNT,
        };

        Ok(Self {
            port,
            database_url,
            rate_limit_per_minute,
            max_payment_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "sqlite::memory:")]).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
        assert_eq!(config.max_payment_amount, DEFAULT_MAX_AMOUNT);
    }

    #[test]
    fn test_database_url_is_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/backoffice"),
            ("PORT", "8080"),
            ("RATE_LIMIT_PER_MINUTE", "5"),
            ("MAX_PAYMENT_AMOUNT", "100000"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit_per_minute, 5);
        assert_eq!(config.max_payment_amount.minor_units(), 100_000);
    }

    #[test]
    fn test_negative_maximum_is_rejected() {
        assert!(load(&[("DATABASE_URL", "x"), ("MAX_PAYMENT_AMOUNT", "-1")]).is_err());
    }
}

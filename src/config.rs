//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `DEFAULT_INTEREST_RATE_PERCENT` (optional): flat rate for new applications, defaults to 40
/// - `PAYMENT_INTERVAL_DAYS` (optional): days between installments, defaults to 7
/// - `ALLOWED_TERMS_WEEKS` (optional): comma separated term choices, defaults to `8,12,16,20,24`
/// - `BOOTSTRAP_STAFF_API_KEY` (optional): plaintext staff key ensured at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_interest_rate_percent")]
    pub default_interest_rate_percent: Decimal,

    #[serde(default = "default_payment_interval_days")]
    pub payment_interval_days: u32,

    #[serde(default = "default_allowed_terms_weeks")]
    pub allowed_terms_weeks: Vec<u32>,

    /// Seeds the first staff key so a fresh database can be administered.
    pub bootstrap_staff_api_key: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_interest_rate_percent() -> Decimal {
    Decimal::from(40)
}

fn default_payment_interval_days() -> u32 {
    7
}

fn default_allowed_terms_weeks() -> Vec<u32> {
    vec![8, 12, 16, 20, 24]
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Loan product settings shared with handlers.
    pub fn loan_settings(&self) -> LoanSettings {
        LoanSettings {
            default_interest_rate_percent: self.default_interest_rate_percent,
            payment_interval_days: self.payment_interval_days,
            allowed_terms_weeks: self.allowed_terms_weeks.clone(),
        }
    }
}

/// Loan product settings.
///
/// The subset of [`Config`] that request handlers need. Carried in the
/// application state next to the database pool.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanSettings {
    pub default_interest_rate_percent: Decimal,
    pub payment_interval_days: u32,
    pub allowed_terms_weeks: Vec<u32>,
}

impl Default for LoanSettings {
    fn default() -> Self {
        Self {
            default_interest_rate_percent: default_interest_rate_percent(),
            payment_interval_days: default_payment_interval_days(),
            allowed_terms_weeks: default_allowed_terms_weeks(),
        }
    }
}

impl LoanSettings {
    pub fn is_allowed_term(&self, terms_weeks: u32) -> bool {
        self.allowed_terms_weeks.contains(&terms_weeks)
    }

    /// Length of one repayment period.
    pub fn payment_interval(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.payment_interval_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    #[test]
    fn test_defaults_applied() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/loans")]).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.default_interest_rate_percent, Decimal::from(40));
        assert_eq!(config.payment_interval_days, 7);
        assert_eq!(config.allowed_terms_weeks, vec![8, 12, 16, 20, 24]);
        assert_eq!(config.bootstrap_staff_api_key, None);
        assert_eq!(config.loan_settings(), LoanSettings::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/loans"),
            ("SERVER_PORT", "8080"),
            ("DEFAULT_INTEREST_RATE_PERCENT", "35.5"),
            ("ALLOWED_TERMS_WEEKS", "4,52"),
        ])
        .unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.default_interest_rate_percent, Decimal::new(355, 1));
        assert_eq!(config.allowed_terms_weeks, vec![4, 52]);
    }

    #[test]
    fn test_missing_database_url() {
        assert!(config_from(&[]).is_err());
    }

    #[test]
    fn test_allowed_terms() {
        let settings = LoanSettings::default();
        assert!(settings.is_allowed_term(12));
        assert!(!settings.is_allowed_term(13));
        assert_eq!(settings.payment_interval(), chrono::Duration::days(7));
    }
}

//! Server Configuration
//!
//! Read once from the environment (after `.env` is loaded) and never changed.

use std::time::Duration;

use upgrade_core::{CheckoutError, CheckoutSettings, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CURRENCY: &str = "inr";
const DEFAULT_BRAND: &str = "JobGenie";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REUSE_MINUTES: u64 = 30;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Absent means payments are disabled
    pub stripe_secret_key: Option<String>,

    pub currency: String,
    pub brand: String,
    pub checkout: CheckoutSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let gateway_timeout = Duration::from_secs(parse_number(
            "CHECKOUT_GATEWAY_TIMEOUT_SECS",
            get("CHECKOUT_GATEWAY_TIMEOUT_SECS"),
            DEFAULT_GATEWAY_TIMEOUT_SECS,
        )?);
        let reuse_minutes = parse_number(
            "CHECKOUT_REUSE_MINUTES",
            get("CHECKOUT_REUSE_MINUTES"),
            DEFAULT_REUSE_MINUTES,
        )?;

        let checkout = CheckoutSettings::new(
            get("CHECKOUT_FALLBACK_BASE_URL")
                .as_deref()
                .unwrap_or(CheckoutSettings::DEFAULT_FALLBACK_BASE_URL),
            gateway_timeout,
            Duration::from_secs(reuse_minutes.saturating_mul(60)),
        )?;

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            currency: get("CHECKOUT_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            brand: get("CHECKOUT_BRAND").unwrap_or_else(|| DEFAULT_BRAND.into()),
            checkout,
        })
    }
}

fn parse_number(key: &str, raw: Option<String>, default: u64) -> Result<u64> {
    raw.map_or(Ok(default), |value| {
        value
            .parse()
            .map_err(|_| CheckoutError::Config(format!("{key} must be a whole number, got '{value}'")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.stripe_secret_key, None);
        assert_eq!(config.currency, "inr");
        assert_eq!(config.brand, "JobGenie");
        assert_eq!(config.checkout.fallback_base_url.as_str(), "http://localhost:8501/");
        assert_eq!(config.checkout.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.checkout.checkout_reuse_window, Duration::from_secs(1800));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("STRIPE_SECRET_KEY", "sk_test_abc"),
            ("CHECKOUT_CURRENCY", "usd"),
            ("CHECKOUT_FALLBACK_BASE_URL", "https://jobgenie.app/upgrade"),
            ("CHECKOUT_GATEWAY_TIMEOUT_SECS", "3"),
            ("CHECKOUT_REUSE_MINUTES", "0"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_test_abc"));
        assert_eq!(config.currency, "usd");
        assert_eq!(config.checkout.fallback_base_url.as_str(), "https://jobgenie.app/upgrade");
        assert_eq!(config.checkout.gateway_timeout, Duration::from_secs(3));
        assert!(config.checkout.checkout_reuse_window.is_zero());
    }

    #[test]
    fn test_blank_secret_disables_payments() {
        let config = config(&[("STRIPE_SECRET_KEY", "   ")]).unwrap();
        assert_eq!(config.stripe_secret_key, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("CHECKOUT_GATEWAY_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config(&[("CHECKOUT_GATEWAY_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("CHECKOUT_REUSE_MINUTES", "-5")]).is_err());
        assert!(config(&[("CHECKOUT_FALLBACK_BASE_URL", "localhost")]).is_err());
    }
}

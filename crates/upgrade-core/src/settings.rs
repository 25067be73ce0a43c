//! Checkout Settings
//!
//! Fixed values loaded once at process start and shared read-only.

use std::time::Duration;

use url::Url;

use crate::error::{CheckoutError, Result};

/// Configuration for the checkout flow
#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    /// Base URL used when the request's own base is not absolute
    pub fallback_base_url: Url,

    /// Upper bound for a single gateway call
    pub gateway_timeout: Duration,

    /// How long an issued checkout session is handed out again
    pub checkout_reuse_window: Duration,
}

impl CheckoutSettings {
    pub const DEFAULT_FALLBACK_BASE_URL: &'static str = "http://localhost:8501";

    /// Validate and build settings
    pub fn new(
        fallback_base_url: &str,
        gateway_timeout: Duration,
        checkout_reuse_window: Duration,
    ) -> Result<Self> {
        let fallback_base_url = Url::parse(fallback_base_url).map_err(|e| {
            CheckoutError::Config(format!("fallback base URL '{fallback_base_url}': {e}"))
        })?;
        if !matches!(fallback_base_url.scheme(), "http" | "https") || !fallback_base_url.has_host() {
            return Err(CheckoutError::Config(format!(
                "fallback base URL '{fallback_base_url}' must be an absolute http(s) URL"
            )));
        }
        if gateway_timeout.is_zero() {
            return Err(CheckoutError::Config("gateway timeout must be positive".into()));
        }

        Ok(Self {
            fallback_base_url,
            gateway_timeout,
            checkout_reuse_window,
        })
    }

    pub(crate) fn reuse_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.checkout_reuse_window).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            fallback_base_url: Url::parse(Self::DEFAULT_FALLBACK_BASE_URL)
                .unwrap_or_else(|_| unreachable!("default fallback URL is valid")),
            gateway_timeout: Duration::from_secs(10),
            checkout_reuse_window: Duration::from_secs(30 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CheckoutSettings::default();
        assert_eq!(settings.fallback_base_url.as_str(), "http://localhost:8501/");
        assert_eq!(settings.gateway_timeout, Duration::from_secs(10));
        assert_eq!(settings.reuse_window(), chrono::Duration::minutes(30));
    }

    #[test]
    fn test_rejects_relative_fallback() {
        let secs = Duration::from_secs(1);
        assert!(CheckoutSettings::new("/upgrade", secs, secs).is_err());
        assert!(CheckoutSettings::new("mailto:ops@jobgenie.app", secs, secs).is_err());
        assert!(CheckoutSettings::new("https://jobgenie.app", Duration::ZERO, secs).is_err());
        assert!(CheckoutSettings::new("https://jobgenie.app", secs, secs).is_ok());
    }
}

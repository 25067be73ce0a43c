//! Payment Gateway Strategy
//!
//! Narrow interface to an external checkout-session API. The orchestrator
//! only talks to providers through [`PaymentGateway`]; concrete clients live
//! in their own crates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use upgrade_core::gateway::{create_with_deadline, RedirectUrls};
//!
//! let urls = RedirectUrls::resolve(Some("https://app.example.com/upgrade"), &fallback);
//! let session = create_with_deadline(gateway.as_ref(), &plan, &urls, timeout).await?;
//! // Redirect user to: session.redirect_url
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GatewayError;
use crate::session::{SelectedPlan, Step};

/// Query parameter carrying the flow step
pub const STEP_PARAM: &str = "page";

/// Where the provider sends the browser back to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl RedirectUrls {
    /// Build both URLs from the request's base URL
    ///
    /// Falls back to `fallback` when `base` is missing or not an absolute
    /// http(s) URL.
    pub fn resolve(base: Option<&str>, fallback: &Url) -> Self {
        let base = base
            .and_then(|raw| Url::parse(raw).ok())
            .filter(is_absolute_http)
            .unwrap_or_else(|| fallback.clone());

        Self {
            success_url: with_step(&base, Step::Confirmed),
            cancel_url: with_step(&base, Step::SelectingPlan),
        }
    }
}

fn is_absolute_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.has_host()
}

fn with_step(base: &Url, step: Step) -> String {
    let mut url = base.clone();
    url.set_fragment(None);
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != STEP_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(STEP_PARAM, step.as_query_value());
    url.into()
}

/// Provider-agnostic checkout request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// ISO currency code, lowercase
    pub currency: String,

    /// Amount in minor units, copied from the selection
    pub amount: u64,

    /// Line item name shown on the provider's page
    pub product_name: String,

    pub success_url: String,
    pub cancel_url: String,

    /// `plan_id` and `plan_name` for reconciliation
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutRequest {
    pub fn new(plan: &SelectedPlan, urls: &RedirectUrls, currency: &str, brand: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("plan_id".to_string(), plan.plan_id.clone());
        metadata.insert("plan_name".to_string(), plan.display_name.clone());

        Self {
            currency: currency.to_ascii_lowercase(),
            amount: plan.amount_minor_units,
            product_name: format!("{brand} {} Plan", plan.display_name),
            success_url: urls.success_url.clone(),
            cancel_url: urls.cancel_url.clone(),
            metadata,
        }
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// URL to redirect the user to
    pub redirect_url: String,

    /// Provider's session id
    pub provider_reference: String,
}

/// Strategy trait for payment providers
///
/// Implementations must not retry; a retry is a later render request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a single-payment checkout session for `plan`
    async fn create_checkout_session(
        &self,
        plan: &SelectedPlan,
        urls: &RedirectUrls,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Provider name for logs and health output
    fn name(&self) -> &str;

    /// Whether the gateway can reach a real provider
    fn is_configured(&self) -> bool {
        true
    }
}

/// Call the gateway, giving up after `timeout`
pub async fn create_with_deadline(
    gateway: &dyn PaymentGateway,
    plan: &SelectedPlan,
    urls: &RedirectUrls,
    timeout: Duration,
) -> Result<CheckoutSession, GatewayError> {
    tokio::time::timeout(timeout, gateway.create_checkout_session(plan, urls))
        .await
        .unwrap_or(Err(GatewayError::Timeout(timeout)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> Url {
        Url::parse("http://localhost:8501").unwrap()
    }

    fn premium() -> SelectedPlan {
        SelectedPlan {
            plan_id: "premium_monthly".into(),
            display_name: "Premium".into(),
            amount_minor_units: 999,
        }
    }

    #[test]
    fn test_redirect_urls_from_request_base() {
        let urls = RedirectUrls::resolve(Some("https://jobgenie.app/upgrade"), &fallback());
        assert_eq!(urls.success_url, "https://jobgenie.app/upgrade?page=confirmation");
        assert_eq!(urls.cancel_url, "https://jobgenie.app/upgrade?page=premium");
    }

    #[test]
    fn test_redirect_urls_keep_existing_query() {
        let urls = RedirectUrls::resolve(
            Some("https://jobgenie.app/upgrade?ref=mail&page=payment#plans"),
            &fallback(),
        );
        assert_eq!(
            urls.success_url,
            "https://jobgenie.app/upgrade?ref=mail&page=confirmation"
        );
        assert_eq!(urls.cancel_url, "https://jobgenie.app/upgrade?ref=mail&page=premium");
    }

    #[test]
    fn test_redirect_urls_fallback() {
        for base in [None, Some("/upgrade"), Some("localhost:8501"), Some("ftp://files.example")] {
            let urls = RedirectUrls::resolve(base, &fallback());
            assert_eq!(urls.success_url, "http://localhost:8501/?page=confirmation");
            assert_eq!(urls.cancel_url, "http://localhost:8501/?page=premium");
        }
    }

    #[test]
    fn test_checkout_request() {
        let urls = RedirectUrls::resolve(None, &fallback());
        let request = CheckoutRequest::new(&premium(), &urls, "INR", "JobGenie");

        assert_eq!(request.currency, "inr");
        assert_eq!(request.amount, 999);
        assert_eq!(request.product_name, "JobGenie Premium Plan");
        assert_eq!(request.metadata["plan_id"], "premium_monthly");
        assert_eq!(request.metadata["plan_name"], "Premium");
        assert_eq!(request.success_url, urls.success_url);
    }

    struct SlowGateway;

    #[async_trait]
    impl PaymentGateway for SlowGateway {
        async fn create_checkout_session(
            &self,
            _plan: &SelectedPlan,
            _urls: &RedirectUrls,
        ) -> Result<CheckoutSession, GatewayError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(GatewayError::Unavailable("unreachable".into()))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_turns_into_timeout() {
        let urls = RedirectUrls::resolve(None, &fallback());
        let result =
            create_with_deadline(&SlowGateway, &premium(), &urls, Duration::from_secs(5)).await;
        assert_eq!(result, Err(GatewayError::Timeout(Duration::from_secs(5))));
    }
}

//! Gateway used when no provider credentials are configured.

use async_trait::async_trait;

use upgrade_core::{CheckoutSession, GatewayError, PaymentGateway, RedirectUrls, SelectedPlan};

/// Refuses every checkout; free plans and navigation keep working
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_checkout_session(
        &self,
        plan: &SelectedPlan,
        _urls: &RedirectUrls,
    ) -> Result<CheckoutSession, GatewayError> {
        tracing::warn!(plan_id = %plan.plan_id, "Checkout requested but payments are not configured");
        Err(GatewayError::Unavailable("payments are not configured".into()))
    }

    fn name(&self) -> &str {
        "disabled"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_gateway_refuses() {
        let plan = SelectedPlan {
            plan_id: "pro_monthly".into(),
            display_name: "Pro".into(),
            amount_minor_units: 1999,
        };
        let urls = RedirectUrls {
            success_url: "http://localhost:8501/?page=confirmation".into(),
            cancel_url: "http://localhost:8501/?page=premium".into(),
        };

        let result = DisabledGateway.create_checkout_session(&plan, &urls).await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert!(!DisabledGateway.is_configured());
        assert_eq!(DisabledGateway.name(), "disabled");
    }
}

//! Stripe Checkout Integration
//!
//! Implements the "Stripe Checkout (Hosted)" approach: one line item, one-time
//! card payment, the browser comes back through the success or cancel URL.

use std::time::Duration;

use async_trait::async_trait;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentMethodTypes, Currency, StripeError,
};

use upgrade_core::{
    CheckoutError, CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway,
    RedirectUrls, SelectedPlan,
};

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
    currency: Currency,
    currency_code: String,
    brand: String,
    request_timeout: Duration,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    ///
    /// `currency` is an ISO code such as `inr`; `brand` prefixes the product
    /// name shown on the hosted page.
    pub fn new(
        secret_key: &str,
        currency: &str,
        brand: &str,
        request_timeout: Duration,
    ) -> upgrade_core::Result<Self> {
        if secret_key.trim().is_empty() {
            return Err(CheckoutError::Config("Stripe secret key is empty".into()));
        }
        let currency_code = currency.trim().to_ascii_lowercase();

        Ok(Self {
            client: Client::new(secret_key),
            currency: parse_currency(&currency_code)?,
            currency_code,
            brand: brand.to_string(),
            request_timeout,
        })
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    /// Translate a provider-agnostic request into Stripe parameters
    fn params<'a>(
        &self,
        request: &'a CheckoutRequest,
    ) -> Result<CreateCheckoutSession<'a>, GatewayError> {
        let unit_amount = i64::try_from(request.amount).map_err(|_| {
            GatewayError::Rejected(format!("amount {} is out of range", request.amount))
        })?;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.metadata = Some(
            request
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: self.currency,
                unit_amount: Some(unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.product_name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        Ok(params)
    }

    fn classify(&self, err: StripeError) -> GatewayError {
        match err {
            StripeError::Stripe(request) => {
                let message = request
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", request.http_status));
                classify_status(request.http_status, message)
            }
            StripeError::Timeout => GatewayError::Timeout(self.request_timeout),
            StripeError::JSONSerialize(e) => GatewayError::Rejected(e.to_string()),
            other => GatewayError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        plan: &SelectedPlan,
        urls: &RedirectUrls,
    ) -> Result<CheckoutSession, GatewayError> {
        let request = CheckoutRequest::new(plan, urls, &self.currency_code, &self.brand);
        let params = self.params(&request)?;

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| self.classify(e))?;

        let redirect_url = session
            .url
            .ok_or_else(|| GatewayError::Rejected("No checkout URL returned".into()))?;

        tracing::debug!(
            provider_reference = %session.id,
            amount = request.amount,
            currency = %request.currency,
            "Stripe checkout session created"
        );

        Ok(CheckoutSession {
            redirect_url,
            provider_reference: session.id.to_string(),
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

/// Parse an ISO code into Stripe's currency enum
fn parse_currency(code: &str) -> upgrade_core::Result<Currency> {
    serde_json::from_value(serde_json::Value::String(code.to_string()))
        .map_err(|_| CheckoutError::Config(format!("unsupported currency '{code}'")))
}

/// Map a Stripe HTTP status to a gateway error
///
/// Auth and rate-limit failures are the provider being unusable right now, not
/// a bad request.
fn classify_status(status: u16, message: String) -> GatewayError {
    match status {
        401 | 403 | 429 => GatewayError::Unavailable(message),
        400..=499 => GatewayError::Rejected(message),
        _ => GatewayError::Unavailable(message),
    }
}

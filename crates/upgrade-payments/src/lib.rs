//! # upgrade-payments
//!
//! Payment gateway implementations for the premium upgrade flow.
//!
//! ## Stripe Checkout (Hosted)
//!
//! **Flow:** pricing page → Stripe's hosted page → back to the upgrade page
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────────┐
//! │  JobGenie   │────▶│  Stripe Hosted  │────▶│  ?page=confirmation  │
//! │  (pricing)  │     │  Checkout Page  │     │  ?page=premium       │
//! └─────────────┘     └─────────────────┘     └──────────────────────┘
//! ```
//!
//! The browser's return through the success URL is the only payment signal
//! this flow consumes. Webhooks and payment verification live elsewhere.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use upgrade_payments::StripeGateway;
//!
//! let gateway = StripeGateway::new("sk_test_xxx", "inr", "JobGenie", Duration::from_secs(10))?;
//! let session = gateway.create_checkout_session(&plan, &urls).await?;
//!
//! // Redirect user to: session.redirect_url
//! ```

mod disabled;
mod checkout;

pub use disabled::DisabledGateway;
pub use checkout::StripeGateway;

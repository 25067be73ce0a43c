//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for checkout flow operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Failures reported by a payment gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The provider did not answer within the configured bound
    #[error("Gateway timed out after {0:?}")]
    Timeout(Duration),

    /// The provider refused the request (invalid amount, bad parameters, ...)
    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    /// Transport, authentication or provider-side failure
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Check if repeating the same request may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout(_) => {
                "The payment provider took too long to respond. Please try again."
            }
            Self::Rejected(_) => {
                "The payment provider could not process this plan. Please go back and try again."
            }
            Self::Unavailable(_) => {
                "Secure checkout is temporarily unavailable. Please try again in a moment."
            }
        }
    }
}

/// Checkout flow errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Selection referenced a plan id the catalog does not know
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// `AwaitingPayment` observed without a selected plan
    #[error("Inconsistent session state: awaiting payment without a selected plan")]
    InconsistentState,

    /// Payment gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Catalog failed validation
    #[error("Invalid catalog: {0}")]
    Catalog(String),

    /// Session store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(err) => err.is_retryable(),
            Self::Storage(_) => true,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::PlanNotFound(_) => "That plan is not available.",
            Self::InconsistentState => "No plan selected. Please choose a plan to continue.",
            Self::Gateway(err) => err.user_message(),
            Self::Storage(_) => "We could not load your upgrade progress. Please choose a plan again.",
            Self::Catalog(_) | Self::Config(_) => "Service configuration error.",
        }
    }
}

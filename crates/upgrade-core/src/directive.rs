//! Render Directives
//!
//! What the presentation layer should show after an orchestrator call.

use serde::{Deserialize, Serialize};

use crate::catalog::Plan;
use crate::gateway::CheckoutSession;
use crate::session::{SelectedPlan, SessionId, Step};

/// Page content for the current step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    /// Pricing page
    Plans { plans: Vec<Plan> },

    /// Plan chosen; checkout not requested yet
    AwaitingPayment { plan: SelectedPlan },

    /// Send the browser to the provider
    Redirect {
        plan: SelectedPlan,
        checkout: CheckoutSession,
    },

    /// Checkout could not be created; user may retry or go back
    PaymentFailed { plan: SelectedPlan },

    /// Upgrade completed
    Confirmed { plan: Option<SelectedPlan> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible message attached to a directive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Result of every orchestrator operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDirective {
    pub session_id: SessionId,
    pub step: Step,
    pub view: View,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl RenderDirective {
    #[must_use]
    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    /// Checkout URL, when the directive is a redirect
    pub fn redirect_url(&self) -> Option<&str> {
        match &self.view {
            View::Redirect { checkout, .. } => Some(&checkout.redirect_url),
            _ => None,
        }
    }
}

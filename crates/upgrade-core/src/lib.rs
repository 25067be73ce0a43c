//! # upgrade-core
//!
//! Checkout flow for the JobGenie premium upgrade: plan catalog, per-session
//! flow state, the payment gateway abstraction and the orchestrator that ties
//! them together.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      CheckoutOrchestrator                        │
//! │  ┌─────────────┐  ┌────────────────┐  ┌───────────────────────┐  │
//! │  │ PlanCatalog │  │  SessionStore  │  │    PaymentGateway     │  │
//! │  │ (read-only) │  │ (per-session)  │  │      (Strategy)       │  │
//! │  └─────────────┘  └────────────────┘  └───────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//!            ▲                                        │
//!   navigation signal                         RenderDirective
//! ```
//!
//! The `PaymentGateway` trait enables swapping Stripe for any other provider
//! without changing flow logic.

pub mod catalog;
pub mod directive;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod session;
pub mod settings;

pub use catalog::{Plan, PlanCatalog};
pub use directive::{Notice, NoticeLevel, RenderDirective, View};
pub use error::{CheckoutError, GatewayError, Result};
pub use gateway::{CheckoutRequest, CheckoutSession, PaymentGateway, RedirectUrls};
pub use orchestrator::CheckoutOrchestrator;
pub use session::{MemorySessionStore, SelectedPlan, SessionId, SessionState, SessionStore, Step};
pub use settings::CheckoutSettings;

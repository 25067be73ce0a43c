//! Checkout Orchestrator
//!
//! The upgrade flow state machine:
//!
//! ```text
//! ┌───────────────┐  select paid plan  ┌─────────────────┐  success signal  ┌───────────┐
//! │ SelectingPlan │───────────────────▶│ AwaitingPayment │─────────────────▶│ Confirmed │
//! │               │◀───────────────────│  (render ⇒ PSP) │                  │           │
//! └───────────────┘   cancel signal    └─────────────────┘                  └───────────┘
//!         ▲                                                                       │
//!         └──────────────────────────────── exit ─────────────────────────────────┘
//! ```
//!
//! Every operation runs under the session's lock, loads the state, re-checks
//! the step invariants, applies one transition and saves. Errors never leave
//! this module: each call resolves to a [`RenderDirective`].

use std::sync::Arc;

use chrono::Utc;

use crate::catalog::{Plan, PlanCatalog};
use crate::directive::{Notice, RenderDirective, View};
use crate::error::{CheckoutError, GatewayError, Result};
use crate::gateway::{create_with_deadline, CheckoutSession, PaymentGateway, RedirectUrls};
use crate::session::{
    IssuedCheckout, SelectedPlan, SessionId, SessionLocks, SessionState, SessionStore, Step,
};
use crate::settings::CheckoutSettings;

/// Session state as loaded for one operation
struct Flow {
    state: SessionState,
    loaded: SessionState,
    healed: Option<Notice>,
}

/// Drives the upgrade journey for many independent sessions
pub struct CheckoutOrchestrator {
    catalog: Arc<PlanCatalog>,
    sessions: Arc<dyn SessionStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
    locks: SessionLocks,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        sessions: Arc<dyn SessionStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            catalog,
            sessions,
            gateway,
            settings,
            locks: SessionLocks::new(),
        }
    }

    pub fn plans(&self) -> &[Plan] {
        self.catalog.list_plans()
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }

    pub const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// User picked a plan on the pricing page
    pub async fn select_plan(&self, id: &SessionId, plan_id: &str) -> RenderDirective {
        let outcome = self.try_select_plan(id, plan_id).await;
        self.resolve(id, outcome)
    }

    /// Show the current step; in `AwaitingPayment` this ensures a checkout session
    pub async fn render(&self, id: &SessionId, base_url: Option<&str>) -> RenderDirective {
        let outcome = self.try_render(id, base_url, None).await;
        self.resolve(id, outcome)
    }

    /// React to a raw `page` signal from the router or a provider redirect
    pub async fn navigate(
        &self,
        id: &SessionId,
        page: Option<&str>,
        base_url: Option<&str>,
    ) -> RenderDirective {
        match Step::from_query(page) {
            Step::SelectingPlan => self.cancel_payment(id).await,
            Step::AwaitingPayment => {
                let outcome = self.try_render(id, base_url, Some(Step::AwaitingPayment)).await;
                self.resolve(id, outcome)
            }
            Step::Confirmed => self.confirm_payment(id).await,
        }
    }

    /// Provider redirected back with the success signal
    pub async fn confirm_payment(&self, id: &SessionId) -> RenderDirective {
        let outcome = self.try_confirm_payment(id).await;
        self.resolve(id, outcome)
    }

    /// Provider redirected back with the cancel signal, or the user went back to the plans
    pub async fn cancel_payment(&self, id: &SessionId) -> RenderDirective {
        let outcome = self.try_cancel_payment(id).await;
        self.resolve(id, outcome)
    }

    /// Leave the confirmation page and start over
    pub async fn exit(&self, id: &SessionId) -> RenderDirective {
        let outcome = self.try_exit(id).await;
        self.resolve(id, outcome)
    }

    /// Discard everything held for a session
    pub async fn end_session(&self, id: &SessionId) -> Result<()> {
        let _guard = self.locks.acquire(id).await?;
        self.sessions.delete(id).await?;
        tracing::debug!(session_id = %id, "Session ended");
        Ok(())
    }

    async fn try_select_plan(&self, id: &SessionId, plan_id: &str) -> Result<RenderDirective> {
        let _guard = self.locks.acquire(id).await?;
        let mut flow = self.open(id).await?;

        let notice = if flow.state.current_step == Step::Confirmed {
            tracing::info!(session_id = %id, plan_id, "Selection ignored, upgrade already confirmed");
            Some(Notice::info("Your upgrade is already complete."))
        } else {
            match self.catalog.get_plan(plan_id) {
                Err(err) => {
                    tracing::warn!(session_id = %id, plan_id, error = %err, "Selection references unknown plan");
                    Some(Notice::warning(err.user_message()))
                }
                Ok(plan) if plan.is_free() => {
                    if flow.state.current_step == Step::AwaitingPayment {
                        tracing::info!(session_id = %id, plan_id, "Free plan chosen, leaving checkout");
                        flow.state.reset();
                    }
                    Some(Notice::info(format!("The {} plan is free, no payment needed.", plan.name)))
                }
                Ok(plan) => {
                    let selected = SelectedPlan::snapshot(plan);
                    let unchanged = flow.state.current_step == Step::AwaitingPayment
                        && flow.state.selected_plan.as_ref() == Some(&selected);

                    if !unchanged {
                        if let Some(previous) = &flow.state.selected_plan {
                            tracing::info!(
                                session_id = %id,
                                previous = %previous.plan_id,
                                plan_id,
                                "Replacing pending selection"
                            );
                        }
                        tracing::info!(
                            session_id = %id,
                            plan_id,
                            amount = selected.amount_minor_units,
                            "Plan selected, awaiting payment"
                        );
                        flow.state.await_payment(selected);
                    }
                    None
                }
            }
        };

        self.finish(id, flow, None, notice).await
    }

    async fn try_render(
        &self,
        id: &SessionId,
        base_url: Option<&str>,
        requested: Option<Step>,
    ) -> Result<RenderDirective> {
        let _guard = self.locks.acquire(id).await?;
        let mut flow = self.open(id).await?;

        match (flow.state.current_step, requested) {
            (Step::AwaitingPayment, _) => {
                let Some(plan) = flow.state.selected_plan.clone() else {
                    return Err(CheckoutError::InconsistentState);
                };

                let outcome = self.ensure_checkout(id, &mut flow.state, &plan, base_url).await;
                match outcome {
                    Ok(checkout) => {
                        let view = View::Redirect { plan, checkout };
                        self.finish(id, flow, Some(view), None).await
                    }
                    Err(err) => {
                        tracing::warn!(
                            session_id = %id,
                            plan_id = %plan.plan_id,
                            error = %err,
                            retryable = err.is_retryable(),
                            "Checkout session could not be created"
                        );
                        let notice = Notice::error(err.user_message());
                        self.finish(id, flow, Some(View::PaymentFailed { plan }), Some(notice))
                            .await
                    }
                }
            }
            (Step::SelectingPlan, Some(Step::AwaitingPayment)) => {
                tracing::warn!(session_id = %id, "Payment step requested without a selected plan");
                let notice = flow
                    .healed
                    .take()
                    .unwrap_or_else(|| Notice::warning(CheckoutError::InconsistentState.user_message()));
                self.finish(id, flow, None, Some(notice)).await
            }
            (Step::Confirmed, Some(Step::AwaitingPayment)) => {
                tracing::info!(session_id = %id, "Payment step requested after confirmation");
                self.finish(id, flow, None, Some(Notice::info("Your upgrade is already complete.")))
                    .await
            }
            _ => self.finish(id, flow, None, None).await,
        }
    }

    async fn try_confirm_payment(&self, id: &SessionId) -> Result<RenderDirective> {
        let _guard = self.locks.acquire(id).await?;
        let mut flow = self.open(id).await?;

        let notice = match flow.state.current_step {
            Step::AwaitingPayment => {
                tracing::info!(
                    session_id = %id,
                    plan_id = ?flow.state.selected_plan.as_ref().map(|p| &p.plan_id),
                    "Payment confirmed"
                );
                flow.state.confirm();
                None
            }
            Step::Confirmed => None,
            Step::SelectingPlan => {
                tracing::warn!(session_id = %id, "Confirmation signal without a checkout in progress");
                Some(flow.healed.take().unwrap_or_else(|| {
                    Notice::warning("No payment in progress. Please choose a plan.")
                }))
            }
        };

        self.finish(id, flow, None, notice).await
    }

    async fn try_cancel_payment(&self, id: &SessionId) -> Result<RenderDirective> {
        let _guard = self.locks.acquire(id).await?;
        let mut flow = self.open(id).await?;

        let notice = match flow.state.current_step {
            Step::AwaitingPayment => {
                tracing::info!(session_id = %id, "Checkout cancelled, back to plan selection");
                flow.state.reset();
                Some(Notice::info("Checkout cancelled. You have not been charged."))
            }
            Step::Confirmed => {
                tracing::info!(session_id = %id, "Starting a new upgrade cycle");
                flow.state.reset();
                None
            }
            Step::SelectingPlan => None,
        };

        self.finish(id, flow, None, notice).await
    }

    async fn try_exit(&self, id: &SessionId) -> Result<RenderDirective> {
        let _guard = self.locks.acquire(id).await?;
        let mut flow = self.open(id).await?;

        let notice = if flow.state.current_step == Step::Confirmed {
            tracing::info!(session_id = %id, "Upgrade flow exited");
            flow.state.reset();
            None
        } else {
            tracing::debug!(session_id = %id, step = %flow.state.current_step, "Exit ignored outside confirmation");
            Some(Notice::info("Finish or cancel your upgrade first."))
        };

        self.finish(id, flow, None, notice).await
    }

    /// Return the cached checkout for `plan` or create a new one
    async fn ensure_checkout(
        &self,
        id: &SessionId,
        state: &mut SessionState,
        plan: &SelectedPlan,
        base_url: Option<&str>,
    ) -> std::result::Result<CheckoutSession, GatewayError> {
        let now = Utc::now();
        if let Some(issued) = state
            .issued_checkout
            .as_ref()
            .filter(|issued| issued.reusable_for(plan, now, self.settings.reuse_window()))
        {
            tracing::debug!(
                session_id = %id,
                provider_reference = %issued.session.provider_reference,
                "Reusing issued checkout session"
            );
            return Ok(issued.session.clone());
        }

        let urls = RedirectUrls::resolve(base_url, &self.settings.fallback_base_url);
        let session = create_with_deadline(
            self.gateway.as_ref(),
            plan,
            &urls,
            self.settings.gateway_timeout,
        )
        .await?;

        tracing::info!(
            session_id = %id,
            plan_id = %plan.plan_id,
            amount = plan.amount_minor_units,
            provider_reference = %session.provider_reference,
            "Checkout session created"
        );
        state.issued_checkout = Some(IssuedCheckout {
            plan: plan.clone(),
            session: session.clone(),
            created_at: now,
        });
        Ok(session)
    }

    /// Load and re-derive a consistent state
    async fn open(&self, id: &SessionId) -> Result<Flow> {
        let loaded = self.sessions.load(id).await?;
        let mut state = loaded.clone();
        let mut healed = None;

        if !state.is_consistent() {
            if state.current_step == Step::AwaitingPayment {
                let err = CheckoutError::InconsistentState;
                tracing::warn!(session_id = %id, error = %err, "Collapsing to plan selection");
                healed = Some(Notice::warning(err.user_message()));
            }
            state.reset();
        }

        Ok(Flow { state, loaded, healed })
    }

    /// Save if anything changed and build the directive
    async fn finish(
        &self,
        id: &SessionId,
        flow: Flow,
        view: Option<View>,
        notice: Option<Notice>,
    ) -> Result<RenderDirective> {
        if flow.state != flow.loaded {
            self.sessions.save(id, &flow.state).await?;
        }

        let directive = RenderDirective {
            session_id: id.clone(),
            step: flow.state.current_step,
            view: view.unwrap_or_else(|| self.view_of(&flow.state)),
            notice: notice.or(flow.healed),
        };
        Ok(directive)
    }

    fn view_of(&self, state: &SessionState) -> View {
        match (state.current_step, &state.selected_plan) {
            (Step::AwaitingPayment, Some(plan)) => match &state.issued_checkout {
                Some(issued) if issued.reusable_for(plan, Utc::now(), self.settings.reuse_window()) => {
                    View::Redirect {
                        plan: plan.clone(),
                        checkout: issued.session.clone(),
                    }
                }
                _ => View::AwaitingPayment { plan: plan.clone() },
            },
            (Step::Confirmed, plan) => View::Confirmed { plan: plan.clone() },
            _ => View::Plans {
                plans: self.catalog.list_plans().to_vec(),
            },
        }
    }

    /// Turn any failure into the plan-selection page
    fn resolve(&self, id: &SessionId, outcome: Result<RenderDirective>) -> RenderDirective {
        outcome.unwrap_or_else(|err| {
            tracing::error!(session_id = %id, error = %err, "Checkout flow failed, showing plan selection");
            RenderDirective {
                session_id: id.clone(),
                step: Step::SelectingPlan,
                view: View::Plans {
                    plans: self.catalog.list_plans().to_vec(),
                },
                notice: Some(Notice::error(err.user_message())),
            }
        })
    }
}

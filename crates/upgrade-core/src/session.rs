//! Session State
//!
//! Per-session record of where the user is in the upgrade flow, the store
//! that persists it, and the per-session locks that serialize access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::catalog::Plan;
use crate::error::{CheckoutError, Result};
use crate::gateway::CheckoutSession;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Step of the upgrade flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    SelectingPlan,
    AwaitingPayment,
    Confirmed,
}

impl Step {
    /// Value carried in the `page` query parameter
    pub const fn as_query_value(self) -> &'static str {
        match self {
            Self::SelectingPlan => "premium",
            Self::AwaitingPayment => "payment",
            Self::Confirmed => "confirmation",
        }
    }

    /// Strict parse of a `page` value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "premium" => Some(Self::SelectingPlan),
            "payment" => Some(Self::AwaitingPayment),
            "confirmation" => Some(Self::Confirmed),
            _ => None,
        }
    }

    /// Parse a navigation signal; absent or unrecognized values mean plan selection
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            None => Self::SelectingPlan,
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                tracing::warn!(page = %raw, "Unrecognized step signal, defaulting to plan selection");
                Self::SelectingPlan
            }),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_query_value())
    }
}

/// Snapshot of a paid plan taken when the user chose it
///
/// Later catalog edits never change an in-flight checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedPlan {
    pub plan_id: String,
    pub display_name: String,
    pub amount_minor_units: u64,
}

impl SelectedPlan {
    pub fn snapshot(plan: &Plan) -> Self {
        Self {
            plan_id: plan.id.clone(),
            display_name: plan.name.clone(),
            amount_minor_units: plan.price_minor_units,
        }
    }
}

/// A checkout session created for a specific selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCheckout {
    pub plan: SelectedPlan,
    pub session: CheckoutSession,
    pub created_at: DateTime<Utc>,
}

impl IssuedCheckout {
    /// Whether this session can be handed out again for `plan` at `now`
    pub fn reusable_for(&self, plan: &SelectedPlan, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.plan == *plan && now - self.created_at < window
    }
}

/// Flow state for one session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_step: Step,
    pub selected_plan: Option<SelectedPlan>,
    #[serde(default)]
    pub issued_checkout: Option<IssuedCheckout>,
}

impl SessionState {
    /// Back to plan selection with nothing selected
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Enter `AwaitingPayment` for `plan`, dropping any checkout issued for a previous choice
    pub fn await_payment(&mut self, plan: SelectedPlan) {
        self.current_step = Step::AwaitingPayment;
        self.selected_plan = Some(plan);
        self.issued_checkout = None;
    }

    pub fn confirm(&mut self) {
        self.current_step = Step::Confirmed;
        self.issued_checkout = None;
    }

    /// Whether the state satisfies the step invariants
    pub fn is_consistent(&self) -> bool {
        match self.current_step {
            Step::SelectingPlan => self.selected_plan.is_none(),
            Step::AwaitingPayment => self
                .selected_plan
                .as_ref()
                .is_some_and(|plan| plan.amount_minor_units > 0),
            Step::Confirmed => true,
        }
    }
}

/// Session store trait for persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session's state, or the initial state if none was saved
    async fn load(&self, id: &SessionId) -> Result<SessionState>;

    /// Save a session's state
    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<()>;

    /// Discard a session's state
    async fn delete(&self, id: &SessionId) -> Result<()>;
}

/// In-memory session store (for development/testing)
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionState>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> CheckoutError {
    CheckoutError::Storage("session store lock poisoned".into())
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<SessionState> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned().unwrap_or_default())
    }

    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(id);
        Ok(())
    }
}

type LockMap = HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>;

/// One async mutex per session id
///
/// Holding the guard gives exclusive access to that session's state; other
/// sessions are unaffected. An entry lives only while some task holds or
/// waits on it.
#[derive(Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Exclusive access to one session
pub struct SessionGuard {
    _guard: OwnedMutexGuard<()>,
    _entry: LockEntry,
}

/// Removes the map entry once nobody else references its mutex
struct LockEntry {
    id: SessionId,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for LockEntry {
    fn drop(&mut self) {
        // Clones are only taken under this lock, so a count of one is final
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.id);
        }
    }
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: &SessionId) -> Result<SessionGuard> {
        let lock = {
            let mut locks = self.locks.lock().map_err(poisoned)?;
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let entry = LockEntry {
            id: id.clone(),
            locks: Arc::clone(&self.locks),
        };

        Ok(SessionGuard {
            _guard: lock.lock_owned().await,
            _entry: entry,
        })
    }

    /// Sessions currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn premium() -> SelectedPlan {
        SelectedPlan {
            plan_id: "premium_monthly".into(),
            display_name: "Premium".into(),
            amount_minor_units: 999,
        }
    }

    #[test]
    fn test_step_query_values() {
        assert_eq!(Step::parse("payment"), Some(Step::AwaitingPayment));
        assert_eq!(Step::parse(" Confirmation "), Some(Step::Confirmed));
        assert_eq!(Step::parse("AwaitingPayment"), None);
        assert_eq!(Step::from_query(None), Step::SelectingPlan);
        assert_eq!(Step::from_query(Some("dashboard")), Step::SelectingPlan);
        assert_eq!(Step::from_query(Some("confirmation")), Step::Confirmed);
    }

    #[test]
    fn test_snapshot_copies_price_exactly() {
        let plan = Plan::new("pro_monthly", "Pro", 1999);
        let selected = SelectedPlan::snapshot(&plan);
        assert_eq!(selected.plan_id, "pro_monthly");
        assert_eq!(selected.display_name, "Pro");
        assert_eq!(selected.amount_minor_units, 1999);
    }

    #[test]
    fn test_consistency() {
        let mut state = SessionState::default();
        assert!(state.is_consistent());

        state.current_step = Step::AwaitingPayment;
        assert!(!state.is_consistent());

        state.await_payment(premium());
        assert!(state.is_consistent());

        state.reset();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn test_issued_checkout_reuse_window() {
        let now = Utc::now();
        let issued = IssuedCheckout {
            plan: premium(),
            session: CheckoutSession {
                redirect_url: "https://checkout.example/cs_1".into(),
                provider_reference: "cs_1".into(),
            },
            created_at: now,
        };
        let window = chrono::Duration::minutes(30);

        assert!(issued.reusable_for(&premium(), now + chrono::Duration::minutes(5), window));
        assert!(!issued.reusable_for(&premium(), now + chrono::Duration::minutes(31), window));

        let mut other = premium();
        other.amount_minor_units = 1999;
        assert!(!issued.reusable_for(&other, now, window));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        let id = SessionId::new();

        assert_eq!(store.load(&id).await.unwrap(), SessionState::default());

        let mut state = SessionState::default();
        state.await_payment(premium());
        store.save(&id, &state).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), state);
        assert_eq!(store.len(), 1);

        store.delete(&id).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_session_locks_serialize_per_session() {
        let locks = Arc::new(SessionLocks::new());
        let id = SessionId::from_string("s-1");

        let guard = locks.acquire(&id).await.unwrap();

        // Other sessions are not blocked
        let other = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&SessionId::from_string("s-2")),
        )
        .await;
        assert!(other.is_ok());

        // Same session waits
        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&id)).await;
        assert!(same.is_err());

        drop(other);
        drop(guard);
        assert!(locks.acquire(&id).await.is_ok());
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entry_kept_while_waiters_remain() {
        let locks = Arc::new(SessionLocks::new());
        let id = SessionId::from_string("s-1");

        let holder = locks.acquire(&id).await.unwrap();
        let waiter = tokio::spawn({
            let locks = Arc::clone(&locks);
            let id = id.clone();
            async move {
                let guard = locks.acquire(&id).await.unwrap();
                tokio::time::sleep(Duration::from_millis(200)).await;
                drop(guard);
            }
        });

        // Let the waiter queue up, then release
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(holder);
        assert_eq!(locks.len(), 1);

        // The waiter now holds the same mutex; a newcomer must still wait
        tokio::time::sleep(Duration::from_millis(20)).await;
        let newcomer = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&id)).await;
        assert!(newcomer.is_err());

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[test]
    fn test_len_survives_poisoned_store() {
        let store = Arc::new(MemorySessionStore::new());
        {
            let mut sessions = store.sessions.write().unwrap();
            sessions.insert(SessionId::from_string("s-1"), SessionState::default());
        }

        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _sessions = poisoner.sessions.write().unwrap();
            panic!("poison");
        })
        .join();

        assert!(store.sessions.is_poisoned());
        assert_eq!(store.len(), 1);
    }
}

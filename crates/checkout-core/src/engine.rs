//! # Orchestration Engine
//!
//! Drives one buyer's checkout flow: provider selection, session
//! creation/reuse, driver dispatch, and order completion. The engine owns
//! only transition logic; all persisted state flows through the session
//! store, and cross-client races are settled by the store's idempotent
//! `create_session` and the completion gate's collapse-to-one-order rule.

use crate::collection::{CompletionOutcome, PaymentSession, PlacedOrder};
use crate::driver::{BoxedConfirmationDriver, ConfirmContext, DriverSelector};
use crate::error::{CheckoutError, CheckoutResult};
use crate::gate::BoxedCompletionGate;
use crate::provider::ProviderProtocol;
use crate::store::BoxedSessionStore;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Engine state for the active session's flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No provider selected, no active confirmation
    Idle,
    /// Provider selected and driver attached, waiting on the buyer
    AwaitingConfirmation,
    /// Driver invoked, external call in flight
    Confirming,
    /// Order placed; terminal for this session
    Completed,
    /// Last confirmation failed; retry allowed
    Failed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::AwaitingConfirmation => "awaiting_confirmation",
            EngineState::Confirming => "confirming",
            EngineState::Completed => "completed",
            EngineState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider selection held for the session's lifetime: classified once,
/// driver attached once.
#[derive(Clone)]
struct SelectedProvider {
    provider_id: String,
    protocol: ProviderProtocol,
    driver: BoxedConfirmationDriver,
}

struct FlowState {
    state: EngineState,
    provider: Option<SelectedProvider>,
    error_message: Option<String>,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            provider: None,
            error_message: None,
        }
    }
}

/// Per-buyer-flow orchestration engine for one payment collection.
pub struct CheckoutEngine {
    store: BoxedSessionStore,
    gate: BoxedCompletionGate,
    drivers: DriverSelector,
    collection_id: String,
    flow: Mutex<FlowState>,
    /// The "submitting" guard: an explicit single-flight lock, not a UI
    /// flag. A second concurrent confirm is rejected, it does not queue.
    confirm_gate: Mutex<()>,
}

impl CheckoutEngine {
    pub fn new(
        store: BoxedSessionStore,
        gate: BoxedCompletionGate,
        drivers: DriverSelector,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gate,
            drivers,
            collection_id: collection_id.into(),
            flow: Mutex::new(FlowState::default()),
            confirm_gate: Mutex::new(()),
        }
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    /// Current flow state
    pub async fn state(&self) -> EngineState {
        self.flow.lock().await.state
    }

    /// Human-readable message of the last failure, for display
    pub async fn error_message(&self) -> Option<String> {
        self.flow.lock().await.error_message.clone()
    }

    /// Provider id currently attached to the flow
    pub async fn selected_provider(&self) -> Option<String> {
        self.flow
            .lock()
            .await
            .provider
            .as_ref()
            .map(|p| p.provider_id.clone())
    }

    /// Select (or re-select) a payment provider. Classifies the provider
    /// once and attaches the matching driver; unsupported providers are
    /// rejected before any session exists. Drivers that need the provider
    /// token ready before buyer approval get their session pre-created
    /// here and returned.
    #[instrument(skip(self), fields(collection_id = %self.collection_id))]
    pub async fn select_provider(
        &self,
        provider_id: &str,
        amount: i64,
    ) -> CheckoutResult<Option<PaymentSession>> {
        let (protocol, driver) = self.drivers.for_provider(provider_id)?;

        {
            let mut flow = self.flow.lock().await;
            if flow.state == EngineState::Confirming {
                return Err(CheckoutError::ConfirmationInFlight {
                    collection_id: self.collection_id.clone(),
                });
            }
            flow.provider = Some(SelectedProvider {
                provider_id: provider_id.to_string(),
                protocol,
                driver: driver.clone(),
            });
            flow.state = EngineState::AwaitingConfirmation;
            flow.error_message = None;
        }
        info!(%provider_id, %protocol, "payment provider selected");

        if driver.eager_session() {
            let session = self
                .store
                .create_session(&self.collection_id, provider_id, amount)
                .await?;
            debug!(
                session_id = %session.id,
                "session pre-created ahead of buyer approval"
            );
            return Ok(Some(session));
        }
        Ok(None)
    }

    /// Open (or idempotently reuse) the active session for the selected
    /// provider.
    pub async fn create_session(&self, amount: i64) -> CheckoutResult<PaymentSession> {
        let provider_id = {
            let flow = self.flow.lock().await;
            flow.provider
                .as_ref()
                .map(|p| p.provider_id.clone())
                .ok_or(CheckoutError::NoProviderSelected)?
        };
        self.store
            .create_session(&self.collection_id, &provider_id, amount)
            .await
    }

    /// Run the confirmation protocol for the active session and, on
    /// success, place the order through the completion gate exactly once.
    #[instrument(skip(self, ctx), fields(collection_id = %self.collection_id))]
    pub async fn confirm(&self, ctx: &ConfirmContext) -> CheckoutResult<PlacedOrder> {
        let selected = {
            let flow = self.flow.lock().await;
            if flow.state == EngineState::Confirming {
                return Err(CheckoutError::ConfirmationInFlight {
                    collection_id: self.collection_id.clone(),
                });
            }
            flow.provider
                .clone()
                .ok_or(CheckoutError::NoProviderSelected)?
        };

        // Uniform precondition gate, enforced before any driver runs.
        if let Some(reason) = ctx.not_ready() {
            debug!(%reason, "confirmation blocked by readiness gate");
            return Err(CheckoutError::NotReady(reason.to_string()));
        }

        let _submitting = self.confirm_gate.try_lock().map_err(|_| {
            CheckoutError::ConfirmationInFlight {
                collection_id: self.collection_id.clone(),
            }
        })?;

        self.transition(EngineState::Confirming, None).await;
        let result = self.confirm_locked(&selected, ctx).await;
        match &result {
            Ok(order) => {
                info!(order_id = %order.id, "checkout completed");
                self.transition(EngineState::Completed, None).await;
            }
            Err(err) => {
                let message = match err {
                    CheckoutError::ConfirmationFailed { reason } => reason.clone(),
                    other => other.to_string(),
                };
                self.transition(EngineState::Failed, Some(message)).await;
            }
        }
        result
    }

    async fn confirm_locked(
        &self,
        selected: &SelectedProvider,
        ctx: &ConfirmContext,
    ) -> CheckoutResult<PlacedOrder> {
        // Reuse the still-pending session from an abandoned or failed
        // attempt; otherwise open one. A pending session for a different
        // provider is superseded by the store.
        let session = match self.store.find_active_session(&self.collection_id).await? {
            Some(existing) if existing.provider_id == selected.provider_id => existing,
            _ => {
                self.store
                    .create_session(&self.collection_id, &selected.provider_id, ctx.amount)
                    .await?
            }
        };

        debug!(
            session_id = %session.id,
            protocol = %selected.protocol,
            "dispatching confirmation driver"
        );
        let outcome = selected.driver.confirm(&session, ctx).await;
        match outcome {
            CompletionOutcome::Completed { .. } => {
                self.store.mark_session(&session.id, &outcome).await?;
                self.gate
                    .complete(&self.collection_id)
                    .await
                    .map_err(|err| {
                        // The payment settled externally; this is a local
                        // completion failure and must stay distinguishable
                        // so operators can reconcile manually.
                        error!(error = %err, "payment settled but order completion failed");
                        match err {
                            gate_err @ CheckoutError::CompletionGate { .. } => gate_err,
                            other => CheckoutError::CompletionGate {
                                message: other.to_string(),
                            },
                        }
                    })
            }
            CompletionOutcome::Failed { reason } => {
                // Session is left in its last persisted status; the buyer
                // may retry with the same or a different provider.
                warn!(%reason, session_id = %session.id, "provider confirmation failed");
                Err(CheckoutError::ConfirmationFailed { reason })
            }
        }
    }

    async fn transition(&self, state: EngineState, error_message: Option<String>) {
        let mut flow = self.flow.lock().await;
        debug!(from = %flow.state, to = %state, "engine transition");
        flow.state = state;
        flow.error_message = error_message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Currency, SessionStatus};
    use crate::driver::{BillingDetail, ConfirmationDriver, ManualDriver};
    use crate::gate::{CompletionGate, MemoryCompletionGate};
    use crate::store::{MemorySessionStore, SessionStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct DecliningDriver;

    #[async_trait]
    impl ConfirmationDriver for DecliningDriver {
        fn protocol(&self) -> ProviderProtocol {
            ProviderProtocol::ClientConfirm
        }

        async fn confirm(
            &self,
            _session: &PaymentSession,
            _ctx: &ConfirmContext,
        ) -> CompletionOutcome {
            CompletionOutcome::failed("Your card was declined.")
        }
    }

    struct ApprovingRedirectDriver;

    #[async_trait]
    impl ConfirmationDriver for ApprovingRedirectDriver {
        fn protocol(&self) -> ProviderProtocol {
            ProviderProtocol::RedirectAuthorize
        }

        fn eager_session(&self) -> bool {
            true
        }

        async fn confirm(
            &self,
            _session: &PaymentSession,
            _ctx: &ConfirmContext,
        ) -> CompletionOutcome {
            CompletionOutcome::authorized()
        }
    }

    struct SlowDriver;

    #[async_trait]
    impl ConfirmationDriver for SlowDriver {
        fn protocol(&self) -> ProviderProtocol {
            ProviderProtocol::Manual
        }

        async fn confirm(
            &self,
            _session: &PaymentSession,
            _ctx: &ConfirmContext,
        ) -> CompletionOutcome {
            tokio::time::sleep(Duration::from_millis(50)).await;
            CompletionOutcome::captured()
        }
    }

    struct FailingGate;

    #[async_trait]
    impl CompletionGate for FailingGate {
        async fn complete(&self, _collection_id: &str) -> CheckoutResult<PlacedOrder> {
            Err(CheckoutError::NetworkError(
                "order service unavailable".into(),
            ))
        }
    }

    fn ready_context(amount: i64) -> ConfirmContext {
        ConfirmContext {
            billing: BillingDetail {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                email: Some("ada@example.com".into()),
                ..Default::default()
            },
            has_shipping_address: true,
            has_billing_address: true,
            shipping_method_count: 1,
            amount,
        }
    }

    async fn engine_setup(
        amount_due: i64,
        drivers: DriverSelector,
    ) -> (Arc<MemorySessionStore>, Arc<MemoryCompletionGate>, CheckoutEngine) {
        let store = Arc::new(MemorySessionStore::new());
        let collection_id = store.register_collection(Currency::USD, amount_due).await;
        let gate = Arc::new(MemoryCompletionGate::new(
            store.clone() as BoxedSessionStore
        ));
        let engine = CheckoutEngine::new(
            store.clone(),
            gate.clone(),
            drivers,
            collection_id,
        );
        (store, gate, engine)
    }

    fn manual_only() -> DriverSelector {
        DriverSelector::new().with_driver(Arc::new(ManualDriver::new()))
    }

    #[tokio::test]
    async fn test_manual_checkout_completes() {
        let (store, _gate, engine) = engine_setup(1000, manual_only()).await;

        assert_eq!(engine.state().await, EngineState::Idle);
        engine
            .select_provider("pp_system_default", 1000)
            .await
            .unwrap();
        assert_eq!(engine.state().await, EngineState::AwaitingConfirmation);

        let order = engine.confirm(&ready_context(1000)).await.unwrap();
        assert_eq!(engine.state().await, EngineState::Completed);
        assert!(engine.error_message().await.is_none());

        let collection = store.collection(engine.collection_id()).await.unwrap();
        assert!(collection.is_satisfied());
        assert_eq!(collection.sessions[0].status, SessionStatus::Captured);
        assert_eq!(order.collection_id, engine.collection_id());
    }

    #[tokio::test]
    async fn test_unsupported_provider_rejected_before_session_creation() {
        let (store, _gate, engine) = engine_setup(1000, manual_only()).await;

        let err = engine.select_provider("pp_adyen_card", 1000).await.unwrap_err();
        assert!(matches!(err, CheckoutError::UnsupportedProvider { .. }));
        assert_eq!(engine.state().await, EngineState::Idle);

        let collection = store.collection(engine.collection_id()).await.unwrap();
        assert!(collection.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_requires_provider() {
        let (_store, _gate, engine) = engine_setup(1000, manual_only()).await;

        let err = engine.confirm(&ready_context(1000)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NoProviderSelected));
    }

    #[tokio::test]
    async fn test_readiness_gate_blocks_every_driver() {
        let (store, _gate, engine) = engine_setup(1000, manual_only()).await;
        engine
            .select_provider("pp_system_default", 1000)
            .await
            .unwrap();

        let mut ctx = ready_context(1000);
        ctx.shipping_method_count = 0;
        let err = engine.confirm(&ctx).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotReady(_)));

        // Fail fast: no partial state, no session opened.
        assert_eq!(engine.state().await, EngineState::AwaitingConfirmation);
        let collection = store.collection(engine.collection_id()).await.unwrap();
        assert!(collection.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_driver_failure_leaves_session_retryable() {
        let drivers = manual_only().with_driver(Arc::new(DecliningDriver));
        let (store, _gate, engine) = engine_setup(1000, drivers).await;

        engine.select_provider("pp_stripe_card", 1000).await.unwrap();
        let err = engine.confirm(&ready_context(1000)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ConfirmationFailed { .. }));
        assert_eq!(engine.state().await, EngineState::Failed);
        assert_eq!(
            engine.error_message().await.as_deref(),
            Some("Your card was declined.")
        );

        // The engine never marks a session errored on a driver failure.
        let collection = store.collection(engine.collection_id()).await.unwrap();
        assert_eq!(collection.active_session().unwrap().status, SessionStatus::Pending);

        // Retry with a different provider: reclassify, supersede, complete.
        engine
            .select_provider("pp_system_default", 1000)
            .await
            .unwrap();
        assert_eq!(engine.state().await, EngineState::AwaitingConfirmation);
        assert!(engine.error_message().await.is_none());

        engine.confirm(&ready_context(1000)).await.unwrap();
        assert_eq!(engine.state().await, EngineState::Completed);

        let collection = store.collection(engine.collection_id()).await.unwrap();
        assert!(collection.is_satisfied());
    }

    #[tokio::test]
    async fn test_completion_gate_failure_is_distinct() {
        let store = Arc::new(MemorySessionStore::new());
        let collection_id = store.register_collection(Currency::USD, 1000).await;
        let engine = CheckoutEngine::new(
            store.clone(),
            Arc::new(FailingGate),
            manual_only(),
            collection_id.clone(),
        );

        engine
            .select_provider("pp_system_default", 1000)
            .await
            .unwrap();
        let err = engine.confirm(&ready_context(1000)).await.unwrap_err();

        assert!(matches!(err, CheckoutError::CompletionGate { .. }));
        assert_eq!(err.kind(), "completion_gate");
        assert_eq!(engine.state().await, EngineState::Failed);

        // The payment itself settled; only local completion failed.
        let collection = store.collection(&collection_id).await.unwrap();
        assert_eq!(collection.sessions[0].status, SessionStatus::Captured);
        assert_eq!(collection.paid_total(), 1000);
    }

    #[tokio::test]
    async fn test_double_submit_is_rejected_not_queued() {
        let drivers = DriverSelector::new().with_driver(Arc::new(SlowDriver));
        let (_store, _gate, engine) = engine_setup(1000, drivers).await;
        let engine = Arc::new(engine);

        engine
            .select_provider("pp_system_default", 1000)
            .await
            .unwrap();

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.confirm(&ready_context(1000)).await })
        };
        // Give the first confirm time to take the submitting guard.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = engine.confirm(&ready_context(1000)).await;

        assert!(matches!(
            second,
            Err(CheckoutError::ConfirmationInFlight { .. })
        ));
        assert!(first.await.unwrap().is_ok());
        assert_eq!(engine.state().await, EngineState::Completed);
    }

    #[tokio::test]
    async fn test_redirect_protocol_pre_creates_session() {
        let drivers = DriverSelector::new().with_driver(Arc::new(ApprovingRedirectDriver));
        let (store, _gate, engine) = engine_setup(1000, drivers).await;

        let pre_created = engine
            .select_provider("pp_paypal", 1000)
            .await
            .unwrap()
            .expect("redirect-authorize pre-creates its session");
        assert!(pre_created.is_pending());

        // Confirmation reuses the pre-created session instead of opening a
        // second one.
        engine.confirm(&ready_context(1000)).await.unwrap();
        let collection = store.collection(engine.collection_id()).await.unwrap();
        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.sessions[0].id, pre_created.id);
        assert_eq!(collection.sessions[0].status, SessionStatus::Authorized);
    }

    #[tokio::test]
    async fn test_session_reused_across_client_retries() {
        let (store, _gate, engine) = engine_setup(1000, manual_only()).await;
        engine
            .select_provider("pp_system_default", 1000)
            .await
            .unwrap();

        let a = engine.create_session(1000).await.unwrap();
        let b = engine.create_session(1000).await.unwrap();
        assert_eq!(a.id, b.id);

        let collection = store.collection(engine.collection_id()).await.unwrap();
        assert_eq!(collection.sessions.len(), 1);
    }
}

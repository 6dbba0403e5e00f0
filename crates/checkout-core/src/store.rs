//! # Payment Session Store
//!
//! The authoritative record of payment sessions belonging to a collection.
//! The engine never mutates persisted state directly; `create_session` and
//! `mark_session` are the single writers and therefore the consistency
//! boundary for concurrent checkout flows.

use crate::collection::{
    CompletionOutcome, Currency, Payment, PaymentCollection, PaymentSession, SessionStatus,
};
use crate::error::{CheckoutError, CheckoutResult};
use crate::provider::{classify, ProviderProtocol};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Store contract backing the orchestration engine.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Snapshot of a collection with its sessions and payments
    async fn collection(&self, collection_id: &str) -> CheckoutResult<PaymentCollection>;

    /// The session with status `pending`, if any
    async fn find_active_session(
        &self,
        collection_id: &str,
    ) -> CheckoutResult<Option<PaymentSession>>;

    /// Open a pending session for the collection.
    ///
    /// Idempotence rule: while a pending session for the same provider and
    /// amount exists, that session is returned as-is. A pending session for
    /// a different provider or amount is superseded (marked `canceled`).
    async fn create_session(
        &self,
        collection_id: &str,
        provider_id: &str,
        amount: i64,
    ) -> CheckoutResult<PaymentSession>;

    /// Transition the pending session per the driver outcome and record the
    /// resulting payment on success.
    async fn mark_session(
        &self,
        session_id: &str,
        outcome: &CompletionOutcome,
    ) -> CheckoutResult<PaymentSession>;
}

/// Type alias for a shared session store
pub type BoxedSessionStore = Arc<dyn SessionStore>;

/// In-memory session store. Used by tests and the development mode of the
/// API; production deployments back this trait with the commerce backend.
#[derive(Default)]
pub struct MemorySessionStore {
    collections: Mutex<HashMap<String, PaymentCollection>>,
    rejected_providers: HashSet<String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: simulate a provider that refuses to open sessions
    /// (invalid credentials, disabled account)
    pub fn with_rejected_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.rejected_providers.insert(provider_id.into());
        self
    }

    /// Register a collection owned by the external cart aggregate
    pub async fn insert_collection(&self, collection: PaymentCollection) {
        self.collections
            .lock()
            .await
            .insert(collection.id.clone(), collection);
    }

    /// Convenience: register a fresh collection and return its id
    pub async fn register_collection(&self, currency: Currency, amount_due: i64) -> String {
        let id = format!("paycol_{}", Uuid::new_v4().simple());
        self.insert_collection(PaymentCollection::new(&id, currency, amount_due))
            .await;
        id
    }

    /// Opaque session data the provider hands back when a session opens
    fn seed_session_data(provider_id: &str) -> serde_json::Value {
        match classify(provider_id) {
            ProviderProtocol::ClientConfirm => serde_json::json!({
                "client_secret": format!(
                    "pi_{}_secret_{}",
                    Uuid::new_v4().simple(),
                    Uuid::new_v4().simple()
                ),
            }),
            ProviderProtocol::RedirectAuthorize => serde_json::json!({
                "id": format!("paypal_order_{}", Uuid::new_v4().simple()),
            }),
            _ => serde_json::json!({}),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn collection(&self, collection_id: &str) -> CheckoutResult<PaymentCollection> {
        self.collections
            .lock()
            .await
            .get(collection_id)
            .cloned()
            .ok_or_else(|| CheckoutError::CollectionNotFound {
                collection_id: collection_id.to_string(),
            })
    }

    async fn find_active_session(
        &self,
        collection_id: &str,
    ) -> CheckoutResult<Option<PaymentSession>> {
        Ok(self
            .collection(collection_id)
            .await?
            .active_session()
            .cloned())
    }

    async fn create_session(
        &self,
        collection_id: &str,
        provider_id: &str,
        amount: i64,
    ) -> CheckoutResult<PaymentSession> {
        let mut collections = self.collections.lock().await;
        let collection = collections.get_mut(collection_id).ok_or_else(|| {
            CheckoutError::CollectionNotFound {
                collection_id: collection_id.to_string(),
            }
        })?;

        if amount <= 0 {
            return Err(CheckoutError::InvalidAmount {
                message: format!("session amount must be positive, got {}", amount),
            });
        }
        let remaining = collection.remaining_due();
        if amount > remaining {
            return Err(CheckoutError::InvalidAmount {
                message: format!(
                    "session amount {} exceeds remaining amount due {}",
                    amount, remaining
                ),
            });
        }
        if self.rejected_providers.contains(provider_id) {
            return Err(CheckoutError::ProviderRejected {
                provider: provider_id.to_string(),
                message: "provider refused to open a payment session".to_string(),
            });
        }

        let superseded = match collection.active_session() {
            Some(active) if active.provider_id == provider_id && active.amount == amount => {
                debug!(
                    session_id = %active.id,
                    %provider_id,
                    "reusing pending session"
                );
                return Ok(active.clone());
            }
            Some(active) => Some((active.id.clone(), active.provider_id.clone())),
            None => None,
        };
        if let Some((active_id, old_provider)) = superseded {
            // Supersede: exactly one session stays active per collection.
            info!(
                session_id = %active_id,
                %old_provider,
                new_provider = %provider_id,
                "superseding pending session"
            );
            if let Some(old) = collection.sessions.iter_mut().find(|s| s.id == active_id) {
                old.status = SessionStatus::Canceled;
            }
        }

        let session = PaymentSession::new(collection_id, provider_id, amount)
            .with_data(Self::seed_session_data(provider_id));
        info!(
            session_id = %session.id,
            %provider_id,
            amount,
            "created pending payment session"
        );
        collection.sessions.push(session.clone());
        Ok(session)
    }

    async fn mark_session(
        &self,
        session_id: &str,
        outcome: &CompletionOutcome,
    ) -> CheckoutResult<PaymentSession> {
        let mut collections = self.collections.lock().await;

        let collection = collections
            .values_mut()
            .find(|c| c.sessions.iter().any(|s| s.id == session_id))
            .ok_or_else(|| CheckoutError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        let session = collection
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .expect("session located above");

        if !session.is_pending() {
            return Err(CheckoutError::AlreadyTerminal {
                session_id: session_id.to_string(),
                status: session.status.to_string(),
            });
        }

        match outcome {
            CompletionOutcome::Completed { status } => {
                session.status = SessionStatus::from(*status);
                let payment = Payment::new(session.provider_id.clone(), session.amount);
                info!(
                    session_id = %session.id,
                    payment_id = %payment.id,
                    status = %session.status,
                    "session settled, payment recorded"
                );
                let marked = session.clone();
                collection.payments.push(payment);
                Ok(marked)
            }
            CompletionOutcome::Failed { reason } => {
                debug!(session_id = %session.id, %reason, "session marked as errored");
                session.status = SessionStatus::Error;
                Ok(session.clone())
            }
        }
    }
}

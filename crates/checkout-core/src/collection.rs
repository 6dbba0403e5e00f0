//! # Payment Collection Types
//!
//! The payment collection groups all payment activity for one order/cart:
//! the ordered list of payment sessions (attempts) and the payments that
//! actually settled. The collection itself is owned by the external cart
//! aggregate; this crate only applies transition logic to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Status of a payment session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, awaiting confirmation (the "active" session)
    Pending,
    /// Funds authorized, capture pending
    Authorized,
    /// Funds captured
    Captured,
    /// Session superseded or abandoned
    Canceled,
    /// Confirmation failed
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Authorized => "authorized",
            SessionStatus::Captured => "captured",
            SessionStatus::Canceled => "canceled",
            SessionStatus::Error => "error",
        }
    }

}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt to pay (part of) a collection via a specific provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Unique session ID (generated)
    pub id: String,

    /// Owning payment collection
    pub collection_id: String,

    /// Provider identifier (e.g., "pp_stripe_card", "pp_system_default")
    pub provider_id: String,

    /// Requested amount in the smallest currency unit
    pub amount: i64,

    /// Session status
    pub status: SessionStatus,

    /// Provider-opaque blob (client secret, order token, ...)
    #[serde(default)]
    pub data: serde_json::Value,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl PaymentSession {
    /// Create a new pending session with generated ID
    pub fn new(
        collection_id: impl Into<String>,
        provider_id: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            id: format!("payses_{}", Uuid::new_v4().simple()),
            collection_id: collection_id.into(),
            provider_id: provider_id.into(),
            amount,
            status: SessionStatus::Pending,
            data: serde_json::Value::Object(serde_json::Map::new()),
            created_at: Utc::now(),
        }
    }

    /// Builder: attach the provider's opaque session data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, SessionStatus::Pending)
    }

    /// Read a string field out of the provider-opaque data blob
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// A settled or partially-settled money movement. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment ID (generated)
    pub id: String,

    /// Provider that moved the money
    pub provider_id: String,

    /// Amount in the smallest currency unit
    pub amount: i64,

    /// Provider-specific metadata (masked card suffix, capture id, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Settlement timestamp
    pub captured_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(provider_id: impl Into<String>, amount: i64) -> Self {
        Self {
            id: format!("pay_{}", Uuid::new_v4().simple()),
            provider_id: provider_id.into(),
            amount,
            metadata: HashMap::new(),
            captured_at: Utc::now(),
        }
    }
}

/// Groups all payment activity for one order/cart.
///
/// Invariant: the sum of recorded payment amounts never exceeds `amount_due`;
/// the collection is satisfied when they are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCollection {
    /// Collection ID (assigned by the cart aggregate)
    pub id: String,

    /// Currency for the whole collection
    pub currency: Currency,

    /// Total amount due in the smallest currency unit
    pub amount_due: i64,

    /// Ordered list of sessions (attempts)
    #[serde(default)]
    pub sessions: Vec<PaymentSession>,

    /// Ordered list of settled payments
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl PaymentCollection {
    pub fn new(id: impl Into<String>, currency: Currency, amount_due: i64) -> Self {
        Self {
            id: id.into(),
            currency,
            amount_due,
            sessions: Vec::new(),
            payments: Vec::new(),
        }
    }

    /// Sum of settled payment amounts
    pub fn paid_total(&self) -> i64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Amount still owed
    pub fn remaining_due(&self) -> i64 {
        (self.amount_due - self.paid_total()).max(0)
    }

    /// True once the amount due is fully paid
    pub fn is_satisfied(&self) -> bool {
        self.paid_total() >= self.amount_due
    }

    /// The session currently in `pending` status, if any.
    /// At most one session per collection is pending at a time.
    pub fn active_session(&self) -> Option<&PaymentSession> {
        self.sessions.iter().find(|s| s.is_pending())
    }
}

/// Settled status a completed confirmation maps the session to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettledStatus {
    Authorized,
    Captured,
}

impl From<SettledStatus> for SessionStatus {
    fn from(settled: SettledStatus) -> Self {
        match settled {
            SettledStatus::Authorized => SessionStatus::Authorized,
            SettledStatus::Captured => SessionStatus::Captured,
        }
    }
}

/// Transient outcome produced by a confirmation driver.
/// Never persisted; consumed synchronously by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed { status: SettledStatus },
    Failed { reason: String },
}

impl CompletionOutcome {
    pub fn captured() -> Self {
        CompletionOutcome::Completed {
            status: SettledStatus::Captured,
        }
    }

    pub fn authorized() -> Self {
        CompletionOutcome::Completed {
            status: SettledStatus::Authorized,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        CompletionOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionOutcome::Completed { .. })
    }
}

/// Payment status of a placed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    /// Collection fully satisfied
    Captured,
    /// Some amount still outstanding
    PartiallyCaptured,
}

/// A placed/paid order produced by the completion gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    /// Unique order ID (generated)
    pub id: String,

    /// The payment collection that funded this order
    pub collection_id: String,

    /// Capture state at placement time
    pub payment_status: OrderPaymentStatus,

    /// Placement timestamp
    pub placed_at: DateTime<Utc>,
}

impl PlacedOrder {
    pub fn new(collection_id: impl Into<String>, payment_status: OrderPaymentStatus) -> Self {
        Self {
            id: format!("order_{}", Uuid::new_v4().simple()),
            collection_id: collection_id.into(),
            payment_status,
            placed_at: Utc::now(),
        }
    }
}

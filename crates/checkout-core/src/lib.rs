//! # checkout-core
//!
//! Core types and orchestration engine for checkout-orchestra-rs.
//!
//! This crate provides:
//! - `PaymentCollection`, `PaymentSession`, and `Payment` for the payment
//!   data model
//! - `classify` and `ProviderProtocol` for mapping provider identifiers to
//!   confirmation protocols
//! - `ConfirmationDriver` trait (and the built-in `ManualDriver`) for
//!   provider confirmation protocols
//! - `SessionStore` and `CompletionGate` traits with in-memory
//!   implementations
//! - `CheckoutEngine` for the session lifecycle state machine
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{
//!     CheckoutEngine, ConfirmContext, Currency, DriverSelector, ManualDriver,
//!     MemoryCompletionGate, MemorySessionStore,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemorySessionStore::new());
//! let collection_id = store.register_collection(Currency::USD, 1000).await;
//! let gate = Arc::new(MemoryCompletionGate::new(store.clone()));
//! let drivers = DriverSelector::new().with_driver(Arc::new(ManualDriver::new()));
//!
//! let engine = CheckoutEngine::new(store, gate, drivers, collection_id);
//! engine.select_provider("pp_system_default", 1000).await?;
//! let order = engine.confirm(&context).await?;
//! ```

pub mod collection;
pub mod driver;
pub mod engine;
pub mod error;
pub mod gate;
pub mod provider;
pub mod store;

// Re-exports for convenience
pub use collection::{
    CompletionOutcome, Currency, OrderPaymentStatus, Payment, PaymentCollection, PaymentSession,
    PlacedOrder, SessionStatus, SettledStatus,
};
pub use driver::{
    BillingDetail, BoxedConfirmationDriver, ConfirmContext, ConfirmationDriver, DriverSelector,
    ManualDriver,
};
pub use engine::{CheckoutEngine, EngineState};
pub use error::{CheckoutError, CheckoutResult};
pub use gate::{BoxedCompletionGate, CompletionGate, MemoryCompletionGate};
pub use provider::{classify, ProviderProtocol};
pub use store::{BoxedSessionStore, MemorySessionStore, SessionStore};

//! # checkout-api
//!
//! HTTP API layer for checkout-orchestra-rs. Exposes the orchestration
//! engine's operations (ensure session, confirm, order lookup) and wires
//! the session store and completion gate to either the in-memory
//! implementations or the commerce backend.

pub mod backend;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-exports
pub use backend::{BackendConfig, CommerceBackend, OrderReader};
pub use state::{AppConfig, AppState};

//! # Checkout Error Types
//!
//! Typed error handling for the checkout orchestration engine.
//! All checkout operations return `Result<T, CheckoutError>`.

use thiserror::Error;

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider identifier does not map to any known confirmation protocol
    #[error("Unsupported payment provider: {provider_id}")]
    UnsupportedProvider { provider_id: String },

    /// Session amount is non-positive or would exceed the collection's amount due
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// The external provider refused to open a payment session
    #[error("Provider [{provider}] rejected the payment session: {message}")]
    ProviderRejected { provider: String, message: String },

    /// The provider declined the payment or the buyer canceled
    #[error("Confirmation failed: {reason}")]
    ConfirmationFailed { reason: String },

    /// Payment succeeded externally but local order completion failed.
    /// Must never be retried as if it were a payment failure.
    #[error("Payment succeeded but order completion failed: {message}")]
    CompletionGate { message: String },

    /// Payment collection not found
    #[error("Payment collection not found: {collection_id}")]
    CollectionNotFound { collection_id: String },

    /// Payment session not found
    #[error("Payment session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Session was already captured/authorized/canceled
    #[error("Payment session {session_id} is already {status}")]
    AlreadyTerminal { session_id: String, status: String },

    /// Precondition gate failed (missing address, email, shipping method, ...)
    #[error("Checkout is not ready: {0}")]
    NotReady(String),

    /// Confirm was invoked before a payment provider was selected
    #[error("No payment provider selected")]
    NoProviderSelected,

    /// A confirm operation for this collection is already running
    #[error("A confirmation is already in flight for collection {collection_id}")]
    ConfirmationInFlight { collection_id: String },

    /// Network/HTTP error communicating with an external collaborator
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CheckoutError {
    /// Returns true if the buyer may safely retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::ConfirmationFailed { .. }
                | CheckoutError::ProviderRejected { .. }
                | CheckoutError::NetworkError(_)
                | CheckoutError::ConfirmationInFlight { .. }
        )
    }

    /// Stable machine-readable kind, so callers can tell a completion-gate
    /// failure ("payment succeeded, order placement failed") apart from a
    /// payment failure.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Configuration(_) => "configuration",
            CheckoutError::UnsupportedProvider { .. } => "unsupported_provider",
            CheckoutError::InvalidAmount { .. } => "invalid_amount",
            CheckoutError::ProviderRejected { .. } => "provider_rejected",
            CheckoutError::ConfirmationFailed { .. } => "confirmation_failed",
            CheckoutError::CompletionGate { .. } => "completion_gate",
            CheckoutError::CollectionNotFound { .. } => "collection_not_found",
            CheckoutError::SessionNotFound { .. } => "session_not_found",
            CheckoutError::AlreadyTerminal { .. } => "already_terminal",
            CheckoutError::NotReady(_) => "not_ready",
            CheckoutError::NoProviderSelected => "no_provider_selected",
            CheckoutError::ConfirmationInFlight { .. } => "confirmation_in_flight",
            CheckoutError::NetworkError(_) => "network",
            CheckoutError::Serialization(_) => "serialization",
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::Configuration(_) => 500,
            CheckoutError::UnsupportedProvider { .. } => 400,
            CheckoutError::InvalidAmount { .. } => 400,
            CheckoutError::ProviderRejected { .. } => 502,
            CheckoutError::ConfirmationFailed { .. } => 402,
            CheckoutError::CompletionGate { .. } => 502,
            CheckoutError::CollectionNotFound { .. } => 404,
            CheckoutError::SessionNotFound { .. } => 404,
            CheckoutError::AlreadyTerminal { .. } => 409,
            CheckoutError::NotReady(_) => 412,
            CheckoutError::NoProviderSelected => 400,
            CheckoutError::ConfirmationInFlight { .. } => 409,
            CheckoutError::NetworkError(_) => 503,
            CheckoutError::Serialization(_) => 500,
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

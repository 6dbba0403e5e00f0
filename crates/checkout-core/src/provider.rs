//! # Provider Capability Classifier
//!
//! Maps a provider identifier to its confirmation protocol. Pure and total:
//! unrecognized identifiers classify to `Unsupported`, which the engine
//! rejects before any session is created.

use serde::{Deserialize, Serialize};

/// Provider-id prefix for card-network processors (client-confirm protocol)
pub const STRIPE_PREFIX: &str = "pp_stripe_";

/// Provider-id prefix for buyer-approval processors (redirect-authorize protocol)
pub const PAYPAL_PREFIX: &str = "pp_paypal";

/// Provider-id prefix for the manual/test provider (no external confirmation)
pub const MANUAL_PREFIX: &str = "pp_system_default";

/// The three confirmation protocols, plus the rejection sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderProtocol {
    /// Client-held secret confirmed directly against the provider
    ClientConfirm,
    /// Buyer approval followed by a server-side authorization call
    RedirectAuthorize,
    /// No external confirmation step
    Manual,
    /// Unknown provider identifier
    Unsupported,
}

impl ProviderProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderProtocol::ClientConfirm => "client_confirm",
            ProviderProtocol::RedirectAuthorize => "redirect_authorize",
            ProviderProtocol::Manual => "manual",
            ProviderProtocol::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ProviderProtocol::Unsupported)
    }
}

impl std::fmt::Display for ProviderProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a provider identifier into its confirmation protocol
pub fn classify(provider_id: &str) -> ProviderProtocol {
    if provider_id.starts_with(STRIPE_PREFIX) {
        ProviderProtocol::ClientConfirm
    } else if provider_id.starts_with(PAYPAL_PREFIX) {
        ProviderProtocol::RedirectAuthorize
    } else if provider_id.starts_with(MANUAL_PREFIX) {
        ProviderProtocol::Manual
    } else {
        ProviderProtocol::Unsupported
    }
}

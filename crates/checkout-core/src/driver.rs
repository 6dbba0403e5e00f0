//! # Confirmation Driver Contract
//!
//! One trait, three protocols. Each payment provider class implements the
//! same completion contract against its external API; the engine selects a
//! driver once via the classifier and holds it for the session's lifetime.

use crate::collection::{CompletionOutcome, PaymentSession};
use crate::error::{CheckoutError, CheckoutResult};
use crate::provider::{classify, ProviderProtocol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Buyer/billing details forwarded to providers that need them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingDetail {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address_1: Option<String>,
    #[serde(default)]
    pub address_2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl BillingDetail {
    /// "First Last" as providers expect it on the card holder field
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// Everything a confirm call needs: billing details for the provider plus
/// the readiness facts the engine checks before any driver runs.
#[derive(Debug, Clone, Default)]
pub struct ConfirmContext {
    pub billing: BillingDetail,
    pub has_shipping_address: bool,
    pub has_billing_address: bool,
    pub shipping_method_count: usize,
    /// Amount this confirmation should settle, in the smallest currency unit
    pub amount: i64,
}

impl ConfirmContext {
    /// The uniform precondition gate. Returns the blocking reason, or `None`
    /// when confirmation may proceed. Enforced by the engine for every
    /// driver, not per-driver.
    pub fn not_ready(&self) -> Option<&'static str> {
        if !self.has_shipping_address {
            Some("missing shipping address")
        } else if !self.has_billing_address {
            Some("missing billing address")
        } else if self.billing.email.is_none() {
            Some("missing email")
        } else if self.shipping_method_count == 0 {
            Some("no shipping method selected")
        } else if self.amount <= 0 {
            Some("payment amount must be positive")
        } else {
            None
        }
    }
}

/// Core trait for provider confirmation protocols.
///
/// `confirm` never returns a `Result`: provider declines, buyer cancels, and
/// transport faults are all folded into `CompletionOutcome::Failed` so the
/// engine consumes one uniform outcome type.
#[async_trait]
pub trait ConfirmationDriver: Send + Sync {
    /// The protocol this driver implements
    fn protocol(&self) -> ProviderProtocol;

    /// Whether the session should be created as soon as the driver is
    /// attached, before the buyer acts. The redirect-authorize protocol
    /// needs the provider's order token ready when the approval widget
    /// mounts.
    fn eager_session(&self) -> bool {
        false
    }

    /// Run the provider's confirmation step for the active session.
    async fn confirm(&self, session: &PaymentSession, ctx: &ConfirmContext) -> CompletionOutcome;
}

impl std::fmt::Debug for dyn ConfirmationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationDriver")
            .field("protocol", &self.protocol())
            .finish()
    }
}

/// Type alias for a shared confirmation driver (dynamic dispatch)
pub type BoxedConfirmationDriver = Arc<dyn ConfirmationDriver>;

/// Registry of confirmation drivers, keyed by protocol
#[derive(Clone, Default)]
pub struct DriverSelector {
    drivers: HashMap<ProviderProtocol, BoxedConfirmationDriver>,
}

impl DriverSelector {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Register a driver for its protocol
    pub fn register(&mut self, driver: BoxedConfirmationDriver) {
        self.drivers.insert(driver.protocol(), driver);
    }

    /// Register with builder pattern
    pub fn with_driver(mut self, driver: BoxedConfirmationDriver) -> Self {
        self.register(driver);
        self
    }

    /// Get the driver for a protocol
    pub fn get(&self, protocol: ProviderProtocol) -> Option<&BoxedConfirmationDriver> {
        self.drivers.get(&protocol)
    }

    /// Classify a provider id and resolve its driver. Rejects unsupported
    /// providers before any session exists.
    pub fn for_provider(
        &self,
        provider_id: &str,
    ) -> CheckoutResult<(ProviderProtocol, BoxedConfirmationDriver)> {
        let protocol = classify(provider_id);
        if !protocol.is_supported() {
            return Err(CheckoutError::UnsupportedProvider {
                provider_id: provider_id.to_string(),
            });
        }
        let driver = self.drivers.get(&protocol).ok_or_else(|| {
            CheckoutError::Configuration(format!("no driver registered for protocol {}", protocol))
        })?;
        Ok((protocol, Arc::clone(driver)))
    }

    /// List registered protocols
    pub fn protocols(&self) -> Vec<ProviderProtocol> {
        self.drivers.keys().copied().collect()
    }
}

/// Driver for manual/test providers. No external confirmation step exists;
/// settlement is asynchronous/out-of-band, so confirm reports completion
/// immediately.
#[derive(Debug, Clone, Default)]
pub struct ManualDriver;

impl ManualDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfirmationDriver for ManualDriver {
    fn protocol(&self) -> ProviderProtocol {
        ProviderProtocol::Manual
    }

    async fn confirm(&self, session: &PaymentSession, _ctx: &ConfirmContext) -> CompletionOutcome {
        info!(
            session_id = %session.id,
            provider_id = %session.provider_id,
            "manual provider: completing without external confirmation"
        );
        CompletionOutcome::captured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_context() -> ConfirmContext {
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
            amount: 1000,
        }
    }

    #[test]
    fn test_not_ready_reasons() {
        let ready = ready_context();
        assert!(ready.not_ready().is_none());

        let mut missing_shipping = ready_context();
        missing_shipping.has_shipping_address = false;
        assert_eq!(missing_shipping.not_ready(), Some("missing shipping address"));

        let mut missing_email = ready_context();
        missing_email.billing.email = None;
        assert_eq!(missing_email.not_ready(), Some("missing email"));

        let mut no_method = ready_context();
        no_method.shipping_method_count = 0;
        assert_eq!(no_method.not_ready(), Some("no shipping method selected"));

        let mut zero_amount = ready_context();
        zero_amount.amount = 0;
        assert_eq!(zero_amount.not_ready(), Some("payment amount must be positive"));
    }

    #[test]
    fn test_full_name() {
        let billing = BillingDetail {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            ..Default::default()
        };
        assert_eq!(billing.full_name(), "Ada Lovelace");
        assert_eq!(BillingDetail::default().full_name(), "");
    }

    #[tokio::test]
    async fn test_manual_driver_always_completes() {
        let driver = ManualDriver::new();
        let session = PaymentSession::new("paycol_1", "pp_system_default", 1000);

        let outcome = driver.confirm(&session, &ready_context()).await;
        assert_eq!(outcome, CompletionOutcome::captured());
    }

    #[test]
    fn test_selector_rejects_unsupported_before_lookup() {
        let selector = DriverSelector::new().with_driver(Arc::new(ManualDriver::new()));

        let err = selector.for_provider("pp_adyen_card").unwrap_err();
        assert!(matches!(err, CheckoutError::UnsupportedProvider { .. }));

        let (protocol, _) = selector.for_provider("pp_system_default").unwrap();
        assert_eq!(protocol, ProviderProtocol::Manual);
    }

    #[test]
    fn test_selector_missing_driver_is_configuration_error() {
        let selector = DriverSelector::new();
        let err = selector.for_provider("pp_stripe_card").unwrap_err();
        assert!(matches!(err, CheckoutError::Configuration(_)));
    }
}

//! # Client-Confirm Driver (Stripe)
//!
//! Confirms the active session's payment intent with the buyer's billing
//! details. This is the only protocol that performs a synchronous external
//! confirmation before the engine settles the session.
//!
//! Error visibility: provider error messages are surfaced verbatim to the
//! caller. A nominal error response whose embedded payment intent already
//! reports `requires_capture`/`succeeded` still completes the payment; the
//! provider can report a stale error alongside a since-resolved success and
//! that precedence is kept as-is.

use crate::config::StripeConfig;
use async_trait::async_trait;
use checkout_core::{
    CheckoutResult, CompletionOutcome, ConfirmContext, ConfirmationDriver, PaymentSession,
    ProviderProtocol, SettledStatus,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Intent statuses that count as a completed confirmation
fn settled_status_for(intent_status: &str) -> Option<SettledStatus> {
    match intent_status {
        "requires_capture" => Some(SettledStatus::Authorized),
        "succeeded" => Some(SettledStatus::Captured),
        _ => None,
    }
}

/// Client-confirm driver backed by the Stripe payment-intents API
pub struct StripeConfirmDriver {
    config: StripeConfig,
    client: Client,
}

impl StripeConfirmDriver {
    /// Create a new driver with an owned HTTP client
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Derive the payment-intent id from its client secret
    /// (`pi_123_secret_456` -> `pi_123`)
    fn intent_id_from_secret(client_secret: &str) -> Option<&str> {
        let (intent_id, _) = client_secret.split_once("_secret_")?;
        if intent_id.is_empty() {
            return None;
        }
        Some(intent_id)
    }

    /// Billing details forwarded with the confirmation call.
    /// Only present fields are sent.
    fn billing_form(ctx: &ConfirmContext) -> Vec<(String, String)> {
        let billing = &ctx.billing;
        let mut form = Vec::new();

        let name = billing.full_name();
        if !name.is_empty() {
            form.push(("payment_method_data[billing_details][name]".to_string(), name));
        }

        let fields = [
            ("email", &billing.email),
            ("phone", &billing.phone),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                form.push((
                    format!("payment_method_data[billing_details][{}]", key),
                    value.clone(),
                ));
            }
        }

        let address_fields = [
            ("line1", &billing.address_1),
            ("line2", &billing.address_2),
            ("city", &billing.city),
            ("country", &billing.country_code),
            ("state", &billing.province),
            ("postal_code", &billing.postal_code),
        ];
        for (key, value) in address_fields {
            if let Some(value) = value {
                form.push((
                    format!("payment_method_data[billing_details][address][{}]", key),
                    value.clone(),
                ));
            }
        }

        form
    }
}

#[async_trait]
impl ConfirmationDriver for StripeConfirmDriver {
    fn protocol(&self) -> ProviderProtocol {
        ProviderProtocol::ClientConfirm
    }

    #[instrument(skip(self, session, ctx), fields(session_id = %session.id))]
    async fn confirm(&self, session: &PaymentSession, ctx: &ConfirmContext) -> CompletionOutcome {
        let Some(client_secret) = session.data_str("client_secret") else {
            return CompletionOutcome::failed("Payment session is missing its client secret.");
        };
        let Some(intent_id) = Self::intent_id_from_secret(client_secret) else {
            return CompletionOutcome::failed("Payment session client secret is malformed.");
        };

        let url = format!(
            "{}/v1/payment_intents/{}/confirm",
            self.config.api_base_url, intent_id
        );

        let mut form: Vec<(String, String)> =
            vec![("client_secret".to_string(), client_secret.to_string())];
        form.extend(Self::billing_form(ctx));

        debug!(%intent_id, "confirming payment intent");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(&form)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => return CompletionOutcome::failed(format!("Network error: {}", err)),
        };

        let http_ok = response.status().is_success();
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return CompletionOutcome::failed(format!("Network error: {}", err)),
        };

        interpret_confirm_response(http_ok, status.as_u16(), &body)
    }
}

/// Interpret the provider's confirmation response.
///
/// Success body: complete on `requires_capture`/`succeeded`, fail on any
/// other intent status. Error body: the dual-check — an embedded intent
/// that already settled wins over the error flag; otherwise the provider's
/// message is surfaced verbatim.
fn interpret_confirm_response(http_ok: bool, http_status: u16, body: &str) -> CompletionOutcome {
    if http_ok {
        let intent: PaymentIntentResponse = match serde_json::from_str(body) {
            Ok(intent) => intent,
            Err(err) => {
                return CompletionOutcome::failed(format!(
                    "Failed to parse payment intent response: {}",
                    err
                ))
            }
        };
        return match settled_status_for(&intent.status) {
            Some(SettledStatus::Captured) => CompletionOutcome::captured(),
            Some(SettledStatus::Authorized) => CompletionOutcome::authorized(),
            None => CompletionOutcome::failed(format!(
                "Payment not completed, intent status: {}",
                intent.status
            )),
        };
    }

    if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(body) {
        // Dual-check: the error may be stale; trust the embedded intent's
        // settled status over the error flag.
        if let Some(intent) = &error_response.error.payment_intent {
            if let Some(settled) = settled_status_for(&intent.status) {
                warn!(
                    intent_id = %intent.id,
                    intent_status = %intent.status,
                    error_message = %error_response.error.message,
                    "provider reported an error but the intent already settled"
                );
                return match settled {
                    SettledStatus::Captured => CompletionOutcome::captured(),
                    SettledStatus::Authorized => CompletionOutcome::authorized(),
                };
            }
        }
        return CompletionOutcome::failed(error_response.error.message);
    }

    CompletionOutcome::failed(format!("HTTP {}: {}", http_status, body))
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(default)]
    payment_intent: Option<PaymentIntentResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::BillingDetail;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ready_context() -> ConfirmContext {
        ConfirmContext {
            billing: BillingDetail {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                email: Some("ada@example.com".into()),
                city: Some("London".into()),
                country_code: Some("gb".into()),
                ..Default::default()
            },
            has_shipping_address: true,
            has_billing_address: true,
            shipping_method_count: 1,
            amount: 1000,
        }
    }

    fn session_with_secret(secret: &str) -> PaymentSession {
        PaymentSession::new("paycol_1", "pp_stripe_card", 1000)
            .with_data(serde_json::json!({ "client_secret": secret }))
    }

    fn driver_for(server_uri: &str) -> StripeConfirmDriver {
        let config = StripeConfig::new("sk_test_abc", "pk_test_xyz")
            .with_api_base_url(server_uri.to_string());
        StripeConfirmDriver::new(config)
    }

    #[test]
    fn test_intent_id_from_secret() {
        assert_eq!(
            StripeConfirmDriver::intent_id_from_secret("pi_123_secret_456"),
            Some("pi_123")
        );
        assert_eq!(StripeConfirmDriver::intent_id_from_secret("pi_123"), None);
        assert_eq!(
            StripeConfirmDriver::intent_id_from_secret("_secret_456"),
            None
        );
    }

    #[test]
    fn test_interpret_success_statuses() {
        let succeeded = interpret_confirm_response(
            true,
            200,
            r#"{"id":"pi_1","status":"succeeded"}"#,
        );
        assert_eq!(succeeded, CompletionOutcome::captured());

        let requires_capture = interpret_confirm_response(
            true,
            200,
            r#"{"id":"pi_1","status":"requires_capture"}"#,
        );
        assert_eq!(requires_capture, CompletionOutcome::authorized());
    }

    #[test]
    fn test_interpret_unsettled_status_fails() {
        let outcome = interpret_confirm_response(
            true,
            200,
            r#"{"id":"pi_1","status":"requires_action"}"#,
        );
        match outcome {
            CompletionOutcome::Failed { reason } => {
                assert!(reason.contains("requires_action"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_error_message_surfaced_verbatim() {
        let body = r#"{"error":{"message":"Your card was declined.","payment_intent":{"id":"pi_1","status":"requires_payment_method"}}}"#;
        let outcome = interpret_confirm_response(false, 402, body);
        assert_eq!(
            outcome,
            CompletionOutcome::failed("Your card was declined.")
        );
    }

    #[test]
    fn test_dual_check_completes_despite_error_flag() {
        // The intent settled even though the provider reports an error.
        let body = r#"{"error":{"message":"Something went wrong.","payment_intent":{"id":"pi_1","status":"succeeded"}}}"#;
        assert_eq!(
            interpret_confirm_response(false, 402, body),
            CompletionOutcome::captured()
        );

        let body = r#"{"error":{"message":"Something went wrong.","payment_intent":{"id":"pi_1","status":"requires_capture"}}}"#;
        assert_eq!(
            interpret_confirm_response(false, 402, body),
            CompletionOutcome::authorized()
        );
    }

    #[tokio::test]
    async fn test_confirm_posts_secret_and_billing_details() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_123/confirm"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(body_string_contains("client_secret=pi_123_secret_456"))
            .and(body_string_contains("Ada+Lovelace"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_123",
                "status": "succeeded",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let driver = driver_for(&server.uri());
        let session = session_with_secret("pi_123_secret_456");

        let outcome = driver.confirm(&session, &ready_context()).await;
        assert_eq!(outcome, CompletionOutcome::captured());
    }

    #[tokio::test]
    async fn test_confirm_decline_surfaces_provider_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_9/confirm"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": {
                    "message": "Your card has insufficient funds.",
                    "payment_intent": { "id": "pi_9", "status": "requires_payment_method" },
                }
            })))
            .mount(&server)
            .await;

        let driver = driver_for(&server.uri());
        let session = session_with_secret("pi_9_secret_1");

        let outcome = driver.confirm(&session, &ready_context()).await;
        assert_eq!(
            outcome,
            CompletionOutcome::failed("Your card has insufficient funds.")
        );
    }

    #[tokio::test]
    async fn test_confirm_without_client_secret_fails_locally() {
        let driver = driver_for("http://127.0.0.1:1");
        let session = PaymentSession::new("paycol_1", "pp_stripe_card", 1000);

        let outcome = driver.confirm(&session, &ready_context()).await;
        match outcome {
            CompletionOutcome::Failed { reason } => {
                assert!(reason.contains("client secret"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}

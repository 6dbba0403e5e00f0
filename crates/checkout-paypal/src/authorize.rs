//! # Redirect-Authorize Driver (PayPal)
//!
//! Buyer-approval flow: the session is created eagerly when the driver is
//! attached so the approval widget has the provider's order token ready;
//! after the buyer approves, the server-side authorize call settles it.
//!
//! Error visibility: unlike the client-confirm protocol, raw provider
//! errors are never shown to the buyer. Any provider-side exception folds
//! into one generic retry message; only a well-formed authorization with an
//! unexpected status echoes that status back.

use crate::config::PayPalConfig;
use async_trait::async_trait;
use checkout_core::{
    CheckoutError, CheckoutResult, CompletionOutcome, ConfirmContext, ConfirmationDriver,
    PaymentSession, ProviderProtocol,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Shown for any provider-side exception, verbatim
const GENERIC_RETRY_MESSAGE: &str = "An unknown error occurred, please try again.";

/// Authorization status that counts as completed
const STATUS_COMPLETED: &str = "COMPLETED";

/// Redirect-authorize driver backed by the PayPal orders API
pub struct PayPalAuthorizeDriver {
    config: PayPalConfig,
    client: Client,
}

impl PayPalAuthorizeDriver {
    /// Create a new driver with an owned HTTP client
    pub fn new(config: PayPalConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        let config = PayPalConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Fetch a client-credentials access token
    async fn access_token(&self) -> CheckoutResult<String> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|err| CheckoutError::NetworkError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(CheckoutError::ProviderRejected {
                provider: "paypal".to_string(),
                message: format!("token request failed with HTTP {}", response.status()),
            });
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|err| CheckoutError::Serialization(err.to_string()))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl ConfirmationDriver for PayPalAuthorizeDriver {
    fn protocol(&self) -> ProviderProtocol {
        ProviderProtocol::RedirectAuthorize
    }

    // The approval widget needs the provider order token before the buyer
    // clicks anything.
    fn eager_session(&self) -> bool {
        true
    }

    #[instrument(skip(self, session, _ctx), fields(session_id = %session.id))]
    async fn confirm(&self, session: &PaymentSession, _ctx: &ConfirmContext) -> CompletionOutcome {
        let Some(order_token) = session.data_str("id") else {
            return CompletionOutcome::failed("Payment session is missing its order token.");
        };

        let token = match self.access_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "token request failed");
                return CompletionOutcome::failed(GENERIC_RETRY_MESSAGE);
            }
        };

        let url = format!(
            "{}/v2/checkout/orders/{}/authorize",
            self.config.api_base_url, order_token
        );

        debug!(%order_token, "authorizing approved order");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "authorize call failed");
                return CompletionOutcome::failed(GENERIC_RETRY_MESSAGE);
            }
        };

        let http_ok = response.status().is_success();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "authorize response unreadable");
                return CompletionOutcome::failed(GENERIC_RETRY_MESSAGE);
            }
        };

        interpret_authorize_response(http_ok, &body)
    }
}

/// Interpret the authorization result. A well-formed response with an
/// unexpected status echoes that status; everything else collapses into the
/// generic retry message.
fn interpret_authorize_response(http_ok: bool, body: &str) -> CompletionOutcome {
    if !http_ok {
        return CompletionOutcome::failed(GENERIC_RETRY_MESSAGE);
    }

    let authorization: AuthorizeOrderResponse = match serde_json::from_str(body) {
        Ok(authorization) => authorization,
        Err(_) => return CompletionOutcome::failed(GENERIC_RETRY_MESSAGE),
    };

    if authorization.status == STATUS_COMPLETED {
        CompletionOutcome::authorized()
    } else {
        CompletionOutcome::failed(format!(
            "An error occurred, status: {}",
            authorization.status
        ))
    }
}

// =============================================================================
// PayPal API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AuthorizeOrderResponse {
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn driver_for(server_uri: &str) -> PayPalAuthorizeDriver {
        let config =
            PayPalConfig::new("client_abc", "secret_xyz").with_api_base_url(server_uri.to_string());
        PayPalAuthorizeDriver::new(config)
    }

    fn session_with_token(token: &str) -> PaymentSession {
        PaymentSession::new("paycol_1", "pp_paypal", 1000)
            .with_data(serde_json::json!({ "id": token }))
    }

    async fn mount_token_endpoint(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A21AA_test_token",
                "token_type": "Bearer",
                "expires_in": 32400,
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_eager_session_creation() {
        let driver = driver_for("http://127.0.0.1:1");
        assert!(driver.eager_session());
        assert_eq!(driver.protocol(), ProviderProtocol::RedirectAuthorize);
    }

    #[test]
    fn test_interpret_completed() {
        let outcome = interpret_authorize_response(true, r#"{"status":"COMPLETED"}"#);
        assert_eq!(outcome, CompletionOutcome::authorized());
    }

    #[test]
    fn test_interpret_other_status_echoes_status() {
        let outcome = interpret_authorize_response(true, r#"{"status":"VOIDED"}"#);
        assert_eq!(
            outcome,
            CompletionOutcome::failed("An error occurred, status: VOIDED")
        );
    }

    #[test]
    fn test_interpret_provider_exception_is_masked() {
        assert_eq!(
            interpret_authorize_response(false, r#"{"name":"UNPROCESSABLE_ENTITY"}"#),
            CompletionOutcome::failed(GENERIC_RETRY_MESSAGE)
        );
        assert_eq!(
            interpret_authorize_response(true, "not json"),
            CompletionOutcome::failed(GENERIC_RETRY_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_authorize_completed_order() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ord_123/authorize"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "ord_123",
                "status": "COMPLETED",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let driver = driver_for(&server.uri());
        let session = session_with_token("ord_123");

        let outcome = driver
            .confirm(&session, &ConfirmContext::default())
            .await;
        assert_eq!(outcome, CompletionOutcome::authorized());
    }

    #[tokio::test]
    async fn test_authorize_declined_status_reported() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ord_9/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "ord_9",
                "status": "PENDING",
            })))
            .mount(&server)
            .await;

        let driver = driver_for(&server.uri());
        let outcome = driver
            .confirm(&session_with_token("ord_9"), &ConfirmContext::default())
            .await;
        assert_eq!(
            outcome,
            CompletionOutcome::failed("An error occurred, status: PENDING")
        );
    }

    #[tokio::test]
    async fn test_provider_error_is_never_leaked() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ord_500/authorize"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "name": "INTERNAL_SERVER_ERROR",
                "message": "sensitive provider detail",
            })))
            .mount(&server)
            .await;

        let driver = driver_for(&server.uri());
        let outcome = driver
            .confirm(&session_with_token("ord_500"), &ConfirmContext::default())
            .await;
        assert_eq!(outcome, CompletionOutcome::failed(GENERIC_RETRY_MESSAGE));
    }

    #[tokio::test]
    async fn test_token_failure_is_masked() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let driver = driver_for(&server.uri());
        let outcome = driver
            .confirm(&session_with_token("ord_1"), &ConfirmContext::default())
            .await;
        assert_eq!(outcome, CompletionOutcome::failed(GENERIC_RETRY_MESSAGE));
    }
}

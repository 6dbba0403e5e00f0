//! # Commerce Backend Client
//!
//! HTTP-backed session store and completion gate for production wiring.
//! The storefront backend owns carts, payment collections, and orders; this
//! client maps the store/gate traits onto its REST surface.

use async_trait::async_trait;
use checkout_core::{
    CheckoutError, CheckoutResult, CompletionOutcome, CompletionGate, PaymentCollection,
    PaymentSession, PlacedOrder, SessionStatus, SessionStore, SettledStatus,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, instrument};

/// Commerce backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend base URL (e.g. "https://commerce.internal:9000")
    pub base_url: String,

    /// Storefront publishable key, sent with every request
    pub publishable_key: Option<String>,
}

impl BackendConfig {
    /// Load from environment variables (`BACKEND_URL`, `BACKEND_PUBLISHABLE_KEY`)
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok();

        let base_url = env::var("BACKEND_URL")
            .map_err(|_| CheckoutError::Configuration("BACKEND_URL not set".to_string()))?;

        Ok(Self {
            base_url,
            publishable_key: env::var("BACKEND_PUBLISHABLE_KEY").ok(),
        })
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            publishable_key: None,
        }
    }
}

/// Reads placed orders for the confirmation surface
#[async_trait]
pub trait OrderReader: Send + Sync {
    async fn retrieve_order(&self, order_id: &str) -> CheckoutResult<Option<PlacedOrder>>;
}

/// HTTP client against the commerce backend
pub struct CommerceBackend {
    config: BackendConfig,
    client: Client,
}

impl CommerceBackend {
    pub fn new(config: BackendConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn from_env() -> CheckoutResult<Self> {
        Ok(Self::new(BackendConfig::from_env()?))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.config.base_url, path));
        if let Some(key) = &self.config.publishable_key {
            builder = builder.header("x-publishable-api-key", key);
        }
        builder
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.message,
            Err(_) => format!("backend returned HTTP {}", status),
        }
    }
}

#[async_trait]
impl SessionStore for CommerceBackend {
    #[instrument(skip(self))]
    async fn collection(&self, collection_id: &str) -> CheckoutResult<PaymentCollection> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/store/payment-collections/{}", collection_id),
            )
            .send()
            .await
            .map_err(|err| CheckoutError::NetworkError(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CheckoutError::CollectionNotFound {
                collection_id: collection_id.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(CheckoutError::NetworkError(
                Self::error_message(response).await,
            ));
        }

        let envelope: PaymentCollectionEnvelope = response
            .json()
            .await
            .map_err(|err| CheckoutError::Serialization(err.to_string()))?;
        Ok(envelope.payment_collection)
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

    #[instrument(skip(self))]
    async fn create_session(
        &self,
        collection_id: &str,
        provider_id: &str,
        amount: i64,
    ) -> CheckoutResult<PaymentSession> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/store/payment-collections/{}/payment-sessions", collection_id),
            )
            .json(&CreateSessionBody {
                provider_id,
                amount,
                context: serde_json::json!({}),
            })
            .send()
            .await
            .map_err(|err| CheckoutError::NetworkError(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response).await;
            return Err(match status.as_u16() {
                404 => CheckoutError::CollectionNotFound {
                    collection_id: collection_id.to_string(),
                },
                400 => CheckoutError::InvalidAmount { message },
                _ => CheckoutError::ProviderRejected {
                    provider: provider_id.to_string(),
                    message,
                },
            });
        }

        let envelope: PaymentCollectionEnvelope = response
            .json()
            .await
            .map_err(|err| CheckoutError::Serialization(err.to_string()))?;

        // The backend returns the whole collection; the freshly ensured
        // session is the active one.
        envelope
            .payment_collection
            .active_session()
            .cloned()
            .ok_or_else(|| {
                CheckoutError::Serialization(
                    "backend response contains no pending session".to_string(),
                )
            })
    }

    #[instrument(skip(self, outcome))]
    async fn mark_session(
        &self,
        session_id: &str,
        outcome: &CompletionOutcome,
    ) -> CheckoutResult<PaymentSession> {
        let status = match outcome {
            CompletionOutcome::Completed {
                status: SettledStatus::Captured,
            } => SessionStatus::Captured,
            CompletionOutcome::Completed {
                status: SettledStatus::Authorized,
            } => SessionStatus::Authorized,
            CompletionOutcome::Failed { .. } => SessionStatus::Error,
        };
        debug!(%session_id, status = %status, "marking session");

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/store/payment-sessions/{}/mark", session_id),
            )
            .json(&MarkSessionBody { status })
            .send()
            .await
            .map_err(|err| CheckoutError::NetworkError(err.to_string()))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let message = Self::error_message(response).await;
            return Err(match http_status.as_u16() {
                404 => CheckoutError::SessionNotFound {
                    session_id: session_id.to_string(),
                },
                409 => CheckoutError::AlreadyTerminal {
                    session_id: session_id.to_string(),
                    status: message,
                },
                _ => CheckoutError::NetworkError(message),
            });
        }

        let envelope: SessionEnvelope = response
            .json()
            .await
            .map_err(|err| CheckoutError::Serialization(err.to_string()))?;
        Ok(envelope.payment_session)
    }
}

#[async_trait]
impl CompletionGate for CommerceBackend {
    #[instrument(skip(self))]
    async fn complete(&self, collection_id: &str) -> CheckoutResult<PlacedOrder> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/store/payment-collections/{}/complete", collection_id),
            )
            .send()
            .await
            .map_err(|err| CheckoutError::CompletionGate {
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(CheckoutError::CompletionGate {
                message: Self::error_message(response).await,
            });
        }

        let envelope: OrderEnvelope = response
            .json()
            .await
            .map_err(|err| CheckoutError::CompletionGate {
                message: err.to_string(),
            })?;
        Ok(envelope.order)
    }
}

#[async_trait]
impl OrderReader for CommerceBackend {
    async fn retrieve_order(&self, order_id: &str) -> CheckoutResult<Option<PlacedOrder>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/store/orders/{}", order_id))
            .send()
            .await
            .map_err(|err| CheckoutError::NetworkError(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CheckoutError::NetworkError(
                Self::error_message(response).await,
            ));
        }

        let envelope: OrderEnvelope = response
            .json()
            .await
            .map_err(|err| CheckoutError::Serialization(err.to_string()))?;
        Ok(Some(envelope.order))
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    provider_id: &'a str,
    amount: i64,
    context: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct MarkSessionBody {
    status: SessionStatus,
}

#[derive(Debug, Deserialize)]
struct PaymentCollectionEnvelope {
    payment_collection: PaymentCollection,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    payment_session: PaymentSession,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: PlacedOrder,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: String,
}

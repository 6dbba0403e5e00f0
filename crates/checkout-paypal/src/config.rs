//! # PayPal Configuration
//!
//! Configuration management for the redirect-authorize driver.
//! All credentials are loaded from environment variables.

use checkout_core::CheckoutError;
use std::env;

/// PayPal REST API configuration
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// API base URL (sandbox, live, or a mock server in tests)
    pub api_base_url: String,
}

impl PayPalConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYPAL_CLIENT_ID`
    /// - `PAYPAL_CLIENT_SECRET`
    ///
    /// Optional:
    /// - `PAYPAL_API_BASE_URL` (defaults to the sandbox)
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let client_id = env::var("PAYPAL_CLIENT_ID")
            .map_err(|_| CheckoutError::Configuration("PAYPAL_CLIENT_ID not set".to_string()))?;

        let client_secret = env::var("PAYPAL_CLIENT_SECRET").map_err(|_| {
            CheckoutError::Configuration("PAYPAL_CLIENT_SECRET not set".to_string())
        })?;

        let api_base_url = env::var("PAYPAL_API_BASE_URL")
            .unwrap_or_else(|_| "https://api-m.sandbox.paypal.com".to_string());

        Ok(Self {
            client_id,
            client_secret,
            api_base_url,
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base_url: "https://api-m.sandbox.paypal.com".to_string(),
        }
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_sandbox() {
        let config = PayPalConfig::new("client", "secret");
        assert_eq!(config.api_base_url, "https://api-m.sandbox.paypal.com");
    }

    #[test]
    fn test_api_base_url_override() {
        let config = PayPalConfig::new("client", "secret")
            .with_api_base_url("http://localhost:9999");
        assert_eq!(config.api_base_url, "http://localhost:9999");
    }
}

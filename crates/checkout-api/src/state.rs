//! # Application State
//!
//! Shared state for the Axum application: session store, completion gate,
//! confirmation drivers, and the per-collection engines. Provider clients
//! are constructed here, at the composition root, and injected — no global
//! client singletons.

use crate::backend::{CommerceBackend, OrderReader};
use checkout_core::{
    BoxedCompletionGate, BoxedSessionStore, CheckoutEngine, DriverSelector, ManualDriver,
    MemoryCompletionGate, MemorySessionStore, PlacedOrder,
};
use checkout_paypal::PayPalAuthorizeDriver;
use checkout_stripe::StripeConfirmDriver;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait::async_trait]
impl OrderReader for MemoryCompletionGate {
    async fn retrieve_order(&self, order_id: &str) -> checkout_core::CheckoutResult<Option<PlacedOrder>> {
        Ok(self.find_order(order_id).await)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Session store (in-memory or commerce backend)
    pub store: BoxedSessionStore,
    /// Order completion gate
    pub gate: BoxedCompletionGate,
    /// Placed-order lookup for the confirmation surface
    pub orders: Arc<dyn OrderReader>,
    /// Confirmation drivers, keyed by protocol
    pub drivers: DriverSelector,
    /// Dev-mode store handle for seeding collections; absent when the
    /// commerce backend owns them
    pub seed_store: Option<Arc<MemorySessionStore>>,
    /// One engine per collection, created on first use
    engines: Arc<Mutex<HashMap<String, Arc<CheckoutEngine>>>>,
}

impl AppState {
    /// Create state from the environment. Uses the commerce backend when
    /// `BACKEND_URL` is set, the in-memory store/gate otherwise.
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let drivers = build_drivers();

        if std::env::var("BACKEND_URL").is_ok() {
            let backend = Arc::new(
                CommerceBackend::from_env()
                    .map_err(|e| anyhow::anyhow!("Failed to initialize backend client: {}", e))?,
            );
            info!("session store backed by commerce backend");
            Ok(Self {
                config,
                store: backend.clone(),
                gate: backend.clone(),
                orders: backend,
                drivers,
                seed_store: None,
                engines: Arc::new(Mutex::new(HashMap::new())),
            })
        } else {
            warn!("BACKEND_URL not set, using in-memory store");
            Ok(Self::with_memory_store(config, drivers))
        }
    }

    /// In-memory state with only the manual driver registered (tests,
    /// local development)
    pub fn in_memory() -> Self {
        let drivers = DriverSelector::new().with_driver(Arc::new(ManualDriver::new()));
        Self::with_memory_store(AppConfig::from_env(), drivers)
    }

    fn with_memory_store(config: AppConfig, drivers: DriverSelector) -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let gate = Arc::new(MemoryCompletionGate::new(
            store.clone() as BoxedSessionStore
        ));
        Self {
            config,
            store: store.clone(),
            gate: gate.clone(),
            orders: gate,
            drivers,
            seed_store: Some(store),
            engines: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Engine for a collection, created on first use and shared by
    /// subsequent requests so the single-flight confirm guard holds.
    pub async fn engine_for(&self, collection_id: &str) -> Arc<CheckoutEngine> {
        let mut engines = self.engines.lock().await;
        engines
            .entry(collection_id.to_string())
            .or_insert_with(|| {
                Arc::new(CheckoutEngine::new(
                    self.store.clone(),
                    self.gate.clone(),
                    self.drivers.clone(),
                    collection_id,
                ))
            })
            .clone()
    }
}

/// Register every driver whose provider credentials are configured.
/// The manual driver needs no credentials and is always available.
fn build_drivers() -> DriverSelector {
    let mut drivers = DriverSelector::new();
    drivers.register(Arc::new(ManualDriver::new()));

    match StripeConfirmDriver::from_env() {
        Ok(driver) => drivers.register(Arc::new(driver)),
        Err(err) => warn!("client-confirm driver disabled: {}", err),
    }
    match PayPalAuthorizeDriver::from_env() {
        Ok(driver) => drivers.register(Arc::new(driver)),
        Err(err) => warn!("redirect-authorize driver disabled: {}", err),
    }

    drivers
}

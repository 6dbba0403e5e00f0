//! # Checkout Orchestra RS
//!
//! Payment-session orchestration service.
//!
//! ## Usage
//!
//! ```bash
//! # Optional provider credentials
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export PAYPAL_CLIENT_ID=...
//! export PAYPAL_CLIENT_SECRET=...
//!
//! # Optional commerce backend (in-memory store otherwise)
//! export BACKEND_URL=http://localhost:9000
//!
//! # Run the server
//! checkout-orchestra
//! ```

use checkout_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Initialize application state
    let state = AppState::new()?;

    let addr = state.config.socket_addr();
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Confirmation protocols: {:?}", state.drivers.protocols());

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("Checkout Orchestra starting on http://{}", addr);

    if !is_prod {
        info!("Health: GET http://{}/health", addr);
        info!(
            "Sessions: POST http://{}/api/v1/collections/{{id}}/sessions",
            addr
        );
        info!(
            "Confirm: POST http://{}/api/v1/collections/{{id}}/confirm",
            addr
        );
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

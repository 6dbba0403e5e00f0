//! # checkout-paypal
//!
//! Redirect-authorize payment driver for checkout-orchestra-rs.
//!
//! Buyer-approval processors hand the storefront an order token when a
//! payment session opens; the approval widget needs that token before the
//! buyer acts, so the session is created eagerly on driver attach. After
//! approval, the server-side authorize call settles the payment; only a
//! `COMPLETED` authorization counts.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_paypal::PayPalAuthorizeDriver;
//! use checkout_core::DriverSelector;
//! use std::sync::Arc;
//!
//! let driver = PayPalAuthorizeDriver::from_env()?;
//! let drivers = DriverSelector::new().with_driver(Arc::new(driver));
//! ```

pub mod authorize;
pub mod config;

// Re-exports
pub use authorize::PayPalAuthorizeDriver;
pub use config::PayPalConfig;

//! # checkout-stripe
//!
//! Client-confirm payment driver for checkout-orchestra-rs.
//!
//! Card-network processors hand the storefront an opaque client secret when
//! a payment session opens; this driver confirms that secret together with
//! the buyer's billing details and interprets the resulting payment-intent
//! status. `requires_capture` and `succeeded` both count as completed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_stripe::StripeConfirmDriver;
//! use checkout_core::DriverSelector;
//! use std::sync::Arc;
//!
//! let driver = StripeConfirmDriver::from_env()?;
//! let drivers = DriverSelector::new().with_driver(Arc::new(driver));
//! ```

pub mod config;
pub mod confirm;

// Re-exports
pub use config::StripeConfig;
pub use confirm::StripeConfirmDriver;

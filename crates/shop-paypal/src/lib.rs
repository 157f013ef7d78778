//! # shop-paypal
//!
//! PayPal Orders API gateway for the storefront checkout.
//!
//! - **PaypalClient** - creates and captures orders, implements `PaymentGateway`
//! - **TokenCache** - shared OAuth2 client-credentials token, refreshed single-flight
//! - **Transaction** - typed capture response with validation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_paypal::PaypalClient;
//! use shop_core::{Currency, ReferenceId};
//!
//! // Create client from environment (PAYPAL_KEY, PAYPAL_SECRET, PROD)
//! let client = PaypalClient::from_env()?;
//!
//! // Create an order for the shopper to approve
//! let created = client.create_order(ReferenceId::new(), Currency::USD, total).await?;
//!
//! // Later, on the capture request
//! let reference_id = client.authenticate_capture(authorization, reference_header)?;
//! let captured = client.capture_order(&created.provider_order_id).await?;
//! ```

pub mod client;
pub mod config;
pub mod token;
pub mod types;

// Re-exports
pub use client::PaypalClient;
pub use config::{PaypalConfig, DEFAULT_SITE_URL, LIVE_API_BASE_URL, SANDBOX_API_BASE_URL};
pub use token::{AccessToken, TokenCache};
pub use types::{Transaction, TransactionStatus};

//! # shop-api
//!
//! HTTP API layer for the storefront checkout.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Checkout endpoints wired to the PayPal gateway
//! - Session principal extraction from upstream headers
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/create-order` | Check stock, price and create the provider order |
//! | POST | `/capture-order/{order_id}` | Capture and record the order |

pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};

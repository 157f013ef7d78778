//! # Payment Gateway Trait
//!
//! The seam between the checkout pipeline and a payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentGateway (trait)                     │
//! │  ├── create_order()          reference id + total → payload │
//! │  ├── authenticate_capture()  bearer + Reference-Id check    │
//! │  ├── capture()               provider order → capture       │
//! │  └── provider()                                             │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴───────┐
//!                    │ PaypalClient  │
//!                    └───────────────┘
//! ```

use crate::error::{CheckoutError, CheckoutResult};
use crate::money::Currency;
use crate::order::{Payer, ReferenceId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported payment providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Paypal,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Paypal => "paypal",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = CheckoutError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "paypal" => Ok(PaymentProvider::Paypal),
            other => Err(CheckoutError::UnsupportedProvider {
                provider: other.to_string(),
            }),
        }
    }
}

/// A provider-side order awaiting shopper approval
#[derive(Debug, Clone)]
pub struct ProviderOrder {
    /// Provider's order id
    pub provider_order_id: String,

    /// Raw provider payload, returned to the client untouched
    pub payload: serde_json::Value,

    /// Bearer token used to create the order; the capture call must echo it
    pub bearer_token: String,

    pub reference_id: ReferenceId,
}

/// A completed capture, reduced to what the order record needs
#[derive(Debug, Clone)]
pub struct CapturedPayment {
    /// Provider's order/transaction id
    pub provider_order_id: String,
    pub payer: Payer,
    pub capture_ids: Vec<String>,
    /// Reference ids echoed back on the captured purchase units
    pub reference_ids: Vec<String>,
    /// Net amount received per capture
    pub net_amounts: Vec<Decimal>,
    /// Raw provider response body
    pub raw_body: String,
}

impl CapturedPayment {
    /// True when the provider echoed `reference_id` on a purchase unit
    pub fn carries_reference(&self, reference_id: &ReferenceId) -> bool {
        let expected = reference_id.to_string();
        self.reference_ids
            .iter()
            .any(|r| r.eq_ignore_ascii_case(&expected))
    }
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a provider order for `total` tagged with `reference_id`.
    async fn create_order(
        &self,
        reference_id: ReferenceId,
        currency: Currency,
        total: Decimal,
    ) -> CheckoutResult<ProviderOrder>;

    /// Check that a capture request carries this service's bearer token and
    /// the reference id minted at order creation. Must not call the provider.
    ///
    /// # Arguments
    /// * `authorization` - Raw `Authorization` header value
    /// * `reference_id` - Raw `Reference-Id` header value
    fn authenticate_capture(
        &self,
        authorization: Option<&str>,
        reference_id: Option<&str>,
    ) -> CheckoutResult<ReferenceId>;

    /// Capture an approved provider order. Only a COMPLETED capture is `Ok`.
    async fn capture(&self, provider_order_id: &str) -> CheckoutResult<CapturedPayment>;

    /// Get the provider (for logging and the order record).
    fn provider(&self) -> PaymentProvider;
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

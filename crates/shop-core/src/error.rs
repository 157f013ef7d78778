//! # Checkout Error Types
//!
//! Typed error handling for the checkout pipeline.
//! All checkout operations return `Result<T, CheckoutError>`.

use thiserror::Error;

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// SKU could not be encoded or decoded
    #[error("Invalid sku: {0}")]
    InvalidSku(String),

    /// Quantity must be strictly positive
    #[error("Invalid quantity {quantity} for sku {sku}")]
    InvalidQuantity { sku: String, quantity: u32 },

    /// Currency not supported
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Payment provider not supported
    #[error("Unsupported payment provider: {provider}")]
    UnsupportedProvider { provider: String },

    /// Totals need at least one item
    #[error("Empty item set")]
    EmptyItemSet,

    /// Any other bad input shape or range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested quantity exceeds available stock
    #[error("Insufficient stock for {}", sku.as_deref().unwrap_or("requested items"))]
    InsufficientStock { sku: Option<String> },

    /// Transport failure talking to the payment gateway
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Gateway answered with a non-2xx status
    #[error("Payment gateway rejected request with HTTP {status}")]
    GatewayRejected { status: u16, body: String },

    /// Capture came back with a status other than COMPLETED
    #[error("Capture not completed, status: {status}")]
    CaptureNotCompleted { status: String, body: String },

    /// Capture call timed out; the charge may or may not have happened
    #[error("Capture outcome unknown for provider order {order_id}")]
    CaptureUnknown { order_id: String },

    /// Capture request did not carry the bearer token issued at order creation
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Capture request did not carry the reference id minted at order creation
    #[error("Missing Reference-Id")]
    MissingReference,

    /// Gateway response violated its contract
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Returns true if a fresh checkout attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::GatewayUnavailable(_) | CheckoutError::GatewayRejected { .. }
        )
    }

    /// Returns true for bad-input errors raised before touching any collaborator
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CheckoutError::InvalidSku(_)
                | CheckoutError::InvalidQuantity { .. }
                | CheckoutError::UnsupportedCurrency { .. }
                | CheckoutError::UnsupportedProvider { .. }
                | CheckoutError::EmptyItemSet
                | CheckoutError::Validation(_)
        )
    }

    /// Raw provider body carried by gateway failures, if any
    pub fn provider_body(&self) -> Option<&str> {
        match self {
            CheckoutError::GatewayRejected { body, .. }
            | CheckoutError::CaptureNotCompleted { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::InvalidSku(_)
            | CheckoutError::InvalidQuantity { .. }
            | CheckoutError::UnsupportedCurrency { .. }
            | CheckoutError::UnsupportedProvider { .. }
            | CheckoutError::EmptyItemSet
            | CheckoutError::Validation(_)
            | CheckoutError::MissingReference => 400,
            CheckoutError::Unauthenticated(_) => 401,
            CheckoutError::CaptureNotCompleted { .. } => 402,
            CheckoutError::InsufficientStock { .. } => 409,
            CheckoutError::GatewayRejected { .. } | CheckoutError::MalformedTransaction(_) => 502,
            CheckoutError::GatewayUnavailable(_) => 503,
            CheckoutError::CaptureUnknown { .. } => 504,
            CheckoutError::Storage(_)
            | CheckoutError::Configuration(_)
            | CheckoutError::Serialization(_)
            | CheckoutError::Internal(_) => 500,
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

//! # PayPal Configuration
//!
//! Configuration management for the PayPal integration.
//! All secrets are loaded from environment variables.

use secrecy::SecretString;
use shop_core::CheckoutError;
use std::env;
use std::time::Duration;

/// Sandbox REST API base URL
pub const SANDBOX_API_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

/// Production REST API base URL
pub const LIVE_API_BASE_URL: &str = "https://api-m.paypal.com";

/// Storefront URL used when `BASE_URL` is unset
pub const DEFAULT_SITE_URL: &str = "http://localhost:8080";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// PayPal API configuration
#[derive(Debug, Clone)]
pub struct PaypalConfig {
    /// REST app client id
    pub client_id: String,

    /// REST app secret
    pub client_secret: SecretString,

    /// API base URL (sandbox, live, or a mock server)
    pub api_base_url: String,

    /// Where PayPal sends the shopper after approval
    pub return_url: String,

    /// Where PayPal sends the shopper after cancelling
    pub cancel_url: String,

    /// Brand shown on the PayPal approval page
    pub brand_name: String,

    pub locale: String,

    /// Upper bound for every call to the API
    pub request_timeout: Duration,
}

impl PaypalConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYPAL_KEY`
    /// - `PAYPAL_SECRET`
    ///
    /// `PROD=true` selects the live API; `PAYPAL_API_BASE_URL` overrides both.
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let client_id = env::var("PAYPAL_KEY")
            .map_err(|_| CheckoutError::Configuration("PAYPAL_KEY not set".to_string()))?;

        let client_secret = env::var("PAYPAL_SECRET")
            .map_err(|_| CheckoutError::Configuration("PAYPAL_SECRET not set".to_string()))?;

        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "PAYPAL_KEY and PAYPAL_SECRET must not be empty".to_string(),
            ));
        }

        let production = env::var("PROD")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let api_base_url = env::var("PAYPAL_API_BASE_URL").unwrap_or_else(|_| {
            if production {
                LIVE_API_BASE_URL.to_string()
            } else {
                SANDBOX_API_BASE_URL.to_string()
            }
        });

        let timeout_secs = match env::var("PAYPAL_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                CheckoutError::Configuration(format!("PAYPAL_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let base_url = env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_SITE_URL.to_string());

        let mut config = Self::new(client_id, client_secret)
            .with_api_base_url(api_base_url)
            .with_site_url(&base_url)
            .with_request_timeout(Duration::from_secs(timeout_secs));

        if let Ok(brand) = env::var("PAYPAL_BRAND_NAME") {
            config.brand_name = brand;
        }

        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            api_base_url: SANDBOX_API_BASE_URL.to_string(),
            return_url: format!("{}/thanks", DEFAULT_SITE_URL),
            cancel_url: format!("{}/cart", DEFAULT_SITE_URL),
            brand_name: "Storefront".to_string(),
            locale: "en-US".to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Check if pointed at the sandbox
    pub fn is_sandbox(&self) -> bool {
        self.api_base_url == SANDBOX_API_BASE_URL
    }

    pub fn token_url(&self) -> String {
        format!("{}/v1/oauth2/token", self.api_base_url)
    }

    pub fn orders_url(&self) -> String {
        format!("{}/v2/checkout/orders", self.api_base_url)
    }

    pub fn capture_url(&self, order_id: &str) -> String {
        format!("{}/v2/checkout/orders/{}/capture", self.api_base_url, order_id)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: derive return and cancel URLs from the public site URL
    pub fn with_site_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.return_url = format!("{}/thanks", base);
        self.cancel_url = format!("{}/cart", base);
        self
    }

    /// Builder: set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

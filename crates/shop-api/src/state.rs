//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the checkout service, the backing store and configuration.

use anyhow::Context;
use shop_core::{
    BoxedPaymentGateway, CheckoutInventory, CheckoutService, FulfillmentWorker, InMemoryStore,
    OrderMaterializer, ProductCatalog,
};
use shop_paypal::{PaypalClient, DEFAULT_SITE_URL};
use std::net::SocketAddr;
use std::sync::Arc;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the storefront
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Explicit catalog seed file
    pub catalog_path: Option<String>,
    /// Attempts before a fulfillment task is parked as dead
    pub fulfillment_max_attempts: u32,
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
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| DEFAULT_SITE_URL.to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            catalog_path: std::env::var("CATALOG_PATH").ok().filter(|p| !p.is_empty()),
            fulfillment_max_attempts: std::env::var("FULFILLMENT_MAX_ATTEMPTS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
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

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout pipeline
    pub checkout: CheckoutService,
    /// Stock, carts and recorded orders
    pub store: Arc<InMemoryStore>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState backed by PayPal.
    ///
    /// Spawns the fulfillment worker, so it must run inside a Tokio runtime.
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let catalog = load_product_catalog(config.catalog_path.as_deref())?;
        let store = Arc::new(
            InMemoryStore::from_catalog(&catalog)
                .map_err(|e| anyhow::anyhow!("Failed to seed inventory: {}", e))?,
        );

        let paypal = PaypalClient::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize PayPal: {}", e))?;
        tracing::info!(
            sandbox = paypal.config().is_sandbox(),
            api = %paypal.config().api_base_url,
            "PayPal gateway configured"
        );

        Ok(Self::from_parts(config, store, Arc::new(paypal)))
    }

    /// Wire state from explicit collaborators and start the fulfillment worker
    pub fn from_parts(
        config: AppConfig,
        store: Arc<InMemoryStore>,
        gateway: BoxedPaymentGateway,
    ) -> Self {
        let (materializer, wake) = OrderMaterializer::new(store.clone());
        let worker =
            FulfillmentWorker::new(store.clone(), store.clone(), config.fulfillment_max_attempts);
        tokio::spawn(worker.run(wake));

        let checkout = CheckoutService::new(CheckoutInventory::new(store.clone()), gateway, materializer);

        Self {
            checkout,
            store,
            config,
        }
    }
}

/// Load the product catalog seed
fn load_product_catalog(explicit: Option<&str>) -> anyhow::Result<ProductCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path))?;
        let catalog = ProductCatalog::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
        tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
        return Ok(catalog);
    }

    let config_paths = [
        "config/catalog.toml",
        "../config/catalog.toml",
        "../../config/catalog.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    tracing::warn!("No product catalog found, starting with empty inventory");
    Ok(ProductCatalog::default())
}

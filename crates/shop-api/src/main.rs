//! # Storefront Checkout
//!
//! Checkout-to-order service backed by PayPal.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export PAYPAL_KEY=...
//! export PAYPAL_SECRET=...
//! export PROD=false
//!
//! # Run the server
//! storefront-checkout
//! ```

use shop_api::{routes, state::AppState};
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

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Base URL: {}", state.config.base_url);
    info!(
        "Payment provider: {}",
        state.checkout.gateway().provider()
    );

    let app = routes::create_router(state);

    info!("Storefront checkout starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Create order: POST http://{}/create-order", addr);
        info!("Capture: POST http://{}/capture-order/{{order_id}}", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  Storefront Checkout
  -------------------
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

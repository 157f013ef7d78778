//! # shop-core
//!
//! Domain types and the checkout-to-order pipeline for the storefront.
//!
//! This crate provides:
//! - `Sku` codec and the `Currency`/`Money` engine
//! - `CheckoutInventory` over an `InventoryStore` for stock checks and cart reconciliation
//! - `PaymentGateway` trait for payment providers
//! - `OrderMaterializer` and `FulfillmentWorker` for durable orders with an outbox
//! - `CheckoutService` tying them together
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CheckoutService, Currency, Order, OrderItem, BeginOutcome};
//!
//! let order = Order::new(Currency::USD, vec![OrderItem::new("TS-SM-RD-1", 1)], true);
//!
//! match service.begin(user_id, order).await? {
//!     BeginOutcome::CartAdjusted(cart) => { /* show the cart again */ }
//!     BeginOutcome::Created(created) => { /* hand created.payload to the client */ }
//! }
//! ```

pub mod checkout;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod materialize;
pub mod memory;
pub mod money;
pub mod order;
pub mod principal;
pub mod product;
pub mod sku;

// Re-exports for convenience
pub use checkout::{BeginOutcome, CheckoutService, CompletedOrder};
pub use error::{CheckoutError, CheckoutResult};
pub use gateway::{BoxedPaymentGateway, CapturedPayment, PaymentGateway, PaymentProvider, ProviderOrder};
pub use inventory::{
    BoxedInventoryStore, CartReconciliation, CartTotal, CheckoutInventory, InventoryStore,
    StockDecision,
};
pub use materialize::{
    BoxedOrderRepository, DrainReport, FulfillmentTask, FulfillmentWorker, OrderMaterializer,
    OrderRepository, OutboxEntry, TaskStatus,
};
pub use memory::InMemoryStore;
pub use money::{Currency, Money, PricedLine};
pub use order::{
    CartEntry, CartSnapshot, Combination, NewOrder, Order, OrderId, OrderItem, Payer,
    PersistedOrder, PricedItem, ReferenceId, UserId,
};
pub use principal::{Principal, Role};
pub use product::{Product, ProductCatalog};
pub use sku::Sku;

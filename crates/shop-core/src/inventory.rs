//! # Inventory Consistency Gateway
//!
//! Stock checks in front of the backing store. Buy-now attempts are a pure
//! validation; cart attempts let the store clamp the cart to what is in stock
//! and report whether anything changed, in which case the shopper has to see
//! the new cart before paying for it.

use crate::error::{CheckoutError, CheckoutResult};
use crate::money::{self, Money};
use crate::order::{CartEntry, CartSnapshot, Order, OrderItem, PricedItem, UserId};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result of reconciling a cart against current stock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartReconciliation {
    /// Whether any cart quantity was changed
    pub adjusted: bool,
    /// Store-provided note for the logs
    pub note: Option<String>,
}

/// Item count and total of a user's cart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartTotal {
    pub count: u32,
    pub total: Money,
}

/// Backing-store operations the checkout pipeline relies on.
///
/// Implementations must make each stock mutation atomic per SKU and report
/// shortfalls as [`CheckoutError::InsufficientStock`].
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Clamp the user's cart to available stock
    async fn check_and_reconcile_cart(
        &self,
        user_id: UserId,
        items: &[OrderItem],
    ) -> CheckoutResult<CartReconciliation>;

    /// Fail if any item exceeds available stock. Never mutates.
    async fn check_stock(&self, items: &[OrderItem]) -> CheckoutResult<()>;

    /// Decrement stock for every item, all or nothing
    async fn update_stock(&self, items: &[OrderItem]) -> CheckoutResult<()>;

    async fn empty_cart(&self, user_id: UserId) -> CheckoutResult<()>;

    /// Cart entries, newest first
    async fn cart(&self, user_id: UserId) -> CheckoutResult<Vec<CartEntry>>;

    async fn cart_total(&self, user_id: UserId) -> CheckoutResult<CartTotal>;

    /// Resolve items to their combination prices
    async fn price_items(&self, items: &[OrderItem]) -> CheckoutResult<Vec<PricedItem>>;
}

/// Shared inventory store (dynamic dispatch)
pub type BoxedInventoryStore = Arc<dyn InventoryStore>;

/// What the caller should do after the stock check
#[derive(Debug, Clone)]
pub enum StockDecision {
    /// Stock is sufficient; go on to create the provider order
    Proceed,
    /// The cart was changed; re-render it instead of charging
    CartAdjusted(CartSnapshot),
}

/// Stock reservation and authoritative pricing for checkout attempts
#[derive(Clone)]
pub struct CheckoutInventory {
    store: BoxedInventoryStore,
}

impl CheckoutInventory {
    pub fn new(store: BoxedInventoryStore) -> Self {
        Self { store }
    }

    /// Access the underlying store
    pub fn store(&self) -> &BoxedInventoryStore {
        &self.store
    }

    /// Check stock for a checkout attempt.
    ///
    /// In cart mode an adjusted cart is reloaded and handed back together
    /// with its new count and total.
    #[instrument(skip(self, order), fields(from_cart = order.from_cart, items = order.products.len()))]
    pub async fn reserve(&self, user_id: UserId, order: &Order) -> CheckoutResult<StockDecision> {
        if !order.from_cart {
            self.store.check_stock(&order.products).await?;
            return Ok(StockDecision::Proceed);
        }

        let reconciliation = self
            .store
            .check_and_reconcile_cart(user_id, &order.products)
            .await?;

        if !reconciliation.adjusted {
            return Ok(StockDecision::Proceed);
        }

        if let Some(note) = &reconciliation.note {
            warn!(user_id, note = %note, "Cart adjusted to available stock");
        }

        let items = self.store.cart(user_id).await?;
        let CartTotal { count, total } = self.store.cart_total(user_id).await?;

        info!(user_id, count, total = %total.display(), "Returning adjusted cart");

        Ok(StockDecision::CartAdjusted(CartSnapshot {
            items,
            count,
            total,
        }))
    }

    /// Price the order's items from the store and total them
    pub async fn authoritative_total(&self, order: &Order) -> CheckoutResult<Decimal> {
        let priced = self.store.price_items(&order.products).await?;

        if let Some(item) = priced.iter().find(|i| i.currency != order.currency) {
            return Err(CheckoutError::Validation(format!(
                "{} is priced in {}, order is in {}",
                item.sku, item.currency, order.currency
            )));
        }

        money::total(order.currency, &priced)
    }
}

//! # In-Memory Store
//!
//! A mutex-guarded implementation of [`InventoryStore`] and
//! [`OrderRepository`]. Every operation runs under one lock, which gives the
//! per-SKU atomicity and the order-plus-outbox atomicity both traits require.

use crate::error::{CheckoutError, CheckoutResult};
use crate::inventory::{CartReconciliation, CartTotal, InventoryStore};
use crate::materialize::{FulfillmentTask, OrderRepository, OutboxEntry, TaskId, TaskStatus};
use crate::money::{self, Currency, Money};
use crate::order::{
    CartEntry, Combination, NewOrder, OrderId, OrderItem, PersistedOrder, PricedItem, UserId,
};
use crate::product::ProductCatalog;
use crate::sku::Sku;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone)]
struct ProductInfo {
    name: String,
    images: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    products: HashMap<u64, ProductInfo>,
    combinations: HashMap<Sku, Combination>,
    /// Entries in insertion order
    carts: HashMap<UserId, Vec<CartEntry>>,
    orders: Vec<PersistedOrder>,
    outbox: Vec<OutboxEntry>,
    next_order_id: OrderId,
    next_task_id: TaskId,
}

impl State {
    fn combination(&self, sku: &Sku) -> CheckoutResult<&Combination> {
        self.combinations
            .get(sku)
            .ok_or_else(|| CheckoutError::Validation(format!("unknown sku {}", sku)))
    }

    /// Fail on the first SKU whose requested total exceeds stock
    fn ensure_stock(&self, items: &[OrderItem]) -> CheckoutResult<BTreeMap<Sku, u32>> {
        let requested = merge_quantities(items)?;
        for (sku, quantity) in &requested {
            if self.combination(sku)?.stock < *quantity {
                return Err(CheckoutError::InsufficientStock {
                    sku: Some(sku.to_string()),
                });
            }
        }
        Ok(requested)
    }

    fn outbox_entry(&mut self, id: TaskId) -> CheckoutResult<&mut OutboxEntry> {
        self.outbox
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CheckoutError::Storage(format!("no outbox entry {}", id)))
    }
}

/// Sum quantities per SKU; a sum past `u32::MAX` can never be in stock
fn merge_quantities(items: &[OrderItem]) -> CheckoutResult<BTreeMap<Sku, u32>> {
    let mut merged: BTreeMap<Sku, u32> = BTreeMap::new();
    for item in items {
        let quantity = merged.entry(item.sku.clone()).or_insert(0);
        *quantity = quantity
            .checked_add(item.quantity)
            .ok_or_else(|| CheckoutError::InsufficientStock {
                sku: Some(item.sku.to_string()),
            })?;
    }
    Ok(merged)
}

/// Reference store for development and tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with every combination in `catalog`
    pub fn from_catalog(catalog: &ProductCatalog) -> CheckoutResult<Self> {
        let store = Self::new();
        for product in &catalog.products {
            let mut state = store.state();
            state.products.insert(
                product.id,
                ProductInfo {
                    name: product.name.clone(),
                    images: product.images.clone(),
                },
            );
            for combination in product.combinations()? {
                state.combinations.insert(combination.sku.clone(), combination);
            }
        }
        Ok(store)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a single combination
    pub fn insert_combination(&self, product_id: u64, name: &str, combination: Combination) {
        let mut state = self.state();
        state
            .products
            .entry(product_id)
            .or_insert_with(|| ProductInfo {
                name: name.to_string(),
                images: Vec::new(),
            });
        state.combinations.insert(combination.sku.clone(), combination);
    }

    /// Current stock of a SKU
    pub fn stock(&self, sku: &Sku) -> Option<u32> {
        self.state().combinations.get(sku).map(|c| c.stock)
    }

    /// Put `quantity` more of `sku` in the user's cart
    pub fn add_to_cart(&self, user_id: UserId, sku: &Sku, quantity: u32) -> CheckoutResult<()> {
        if quantity == 0 {
            return Err(CheckoutError::InvalidQuantity {
                sku: sku.to_string(),
                quantity,
            });
        }

        let mut state = self.state();
        let combination = state.combination(sku)?.clone();
        let product_id = sku.product_id()?;
        let info = state
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| CheckoutError::Validation(format!("unknown product {}", product_id)))?;

        let cart = state.carts.entry(user_id).or_default();
        match cart.iter_mut().find(|e| &e.combination.sku == sku) {
            Some(entry) => {
                entry.quantity = entry.quantity.checked_add(quantity).ok_or_else(|| {
                    CheckoutError::Validation(format!("cart quantity for {} overflows", sku))
                })?;
            }
            None => cart.push(CartEntry {
                product_id,
                name: info.name,
                images: info.images,
                combination,
                quantity,
                created_at: Utc::now(),
            }),
        }
        Ok(())
    }

    /// Cart entries in insertion order
    pub fn cart_entries(&self, user_id: UserId) -> Vec<CartEntry> {
        self.state().carts.get(&user_id).cloned().unwrap_or_default()
    }

    pub fn orders(&self) -> Vec<PersistedOrder> {
        self.state().orders.clone()
    }

    pub fn outbox(&self) -> Vec<OutboxEntry> {
        self.state().outbox.clone()
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn check_and_reconcile_cart(
        &self,
        user_id: UserId,
        items: &[OrderItem],
    ) -> CheckoutResult<CartReconciliation> {
        let mut state = self.state();
        let stock: HashMap<Sku, u32> = state
            .combinations
            .iter()
            .map(|(sku, c)| (sku.clone(), c.stock))
            .collect();

        let mut notes = Vec::new();
        let cart = state.carts.entry(user_id).or_default();
        cart.retain_mut(|entry| {
            let sku = &entry.combination.sku;
            let available = stock.get(sku).copied().unwrap_or(0);
            entry.combination.stock = available;
            if entry.quantity > available {
                notes.push(format!("{} reduced from {} to {}", sku, entry.quantity, available));
                entry.quantity = available;
            }
            entry.quantity > 0
        });

        let in_cart = merge_quantities(&cart.iter().map(CartEntry::order_item).collect::<Vec<_>>())?;
        if notes.is_empty() && in_cart != merge_quantities(items)? {
            notes.push("requested items differ from the stored cart".to_string());
        }

        debug!(user_id, changes = notes.len(), "Cart reconciled");

        Ok(CartReconciliation {
            adjusted: !notes.is_empty(),
            note: (!notes.is_empty()).then(|| notes.join("; ")),
        })
    }

    async fn check_stock(&self, items: &[OrderItem]) -> CheckoutResult<()> {
        self.state().ensure_stock(items).map(|_| ())
    }

    async fn update_stock(&self, items: &[OrderItem]) -> CheckoutResult<()> {
        let mut state = self.state();
        let requested = state.ensure_stock(items)?;
        for (sku, quantity) in requested {
            if let Some(combination) = state.combinations.get_mut(&sku) {
                combination.stock -= quantity;
            }
        }
        Ok(())
    }

    async fn empty_cart(&self, user_id: UserId) -> CheckoutResult<()> {
        self.state().carts.remove(&user_id);
        Ok(())
    }

    async fn cart(&self, user_id: UserId) -> CheckoutResult<Vec<CartEntry>> {
        let mut entries = self.cart_entries(user_id);
        entries.reverse();
        Ok(entries)
    }

    async fn cart_total(&self, user_id: UserId) -> CheckoutResult<CartTotal> {
        let entries = self.cart_entries(user_id);
        let Some(first) = entries.first() else {
            return Ok(CartTotal {
                count: 0,
                total: Money::new(Decimal::ZERO, Currency::default()),
            });
        };

        let currency = first.combination.currency;
        if entries.iter().any(|e| e.combination.currency != currency) {
            return Err(CheckoutError::Validation(
                "cart mixes currencies".to_string(),
            ));
        }

        Ok(CartTotal {
            count: entries
                .iter()
                .try_fold(0u32, |count, e| count.checked_add(e.quantity))
                .ok_or_else(|| CheckoutError::Validation("cart item count overflows".to_string()))?,
            total: Money::new(money::total(currency, &entries)?, currency),
        })
    }

    async fn price_items(&self, items: &[OrderItem]) -> CheckoutResult<Vec<PricedItem>> {
        let state = self.state();
        items
            .iter()
            .map(|item| {
                let combination = state.combination(&item.sku)?;
                Ok(PricedItem {
                    sku: item.sku.clone(),
                    unit_price: combination.price,
                    currency: combination.currency,
                    quantity: item.quantity,
                })
            })
            .collect()
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(
        &self,
        order: NewOrder,
        tasks: Vec<FulfillmentTask>,
    ) -> CheckoutResult<OrderId> {
        let mut state = self.state();
        state.next_order_id += 1;
        let order_id = state.next_order_id;

        for task in tasks {
            state.next_task_id += 1;
            let id = state.next_task_id;
            state.outbox.push(OutboxEntry {
                id,
                order_id,
                task,
                status: TaskStatus::Pending,
                attempts: 0,
                last_error: None,
            });
        }
        state.orders.push(PersistedOrder::from_new(order_id, order));

        Ok(order_id)
    }

    async fn pending_tasks(&self, limit: usize) -> CheckoutResult<Vec<OutboxEntry>> {
        Ok(self
            .state()
            .outbox
            .iter()
            .filter(|e| e.status == TaskStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn complete_task(&self, id: TaskId) -> CheckoutResult<()> {
        let mut state = self.state();
        let entry = state.outbox_entry(id)?;
        entry.status = TaskStatus::Done;
        entry.last_error = None;
        Ok(())
    }

    async fn fail_task(&self, id: TaskId, error: String, dead: bool) -> CheckoutResult<()> {
        let mut state = self.state();
        let entry = state.outbox_entry(id)?;
        entry.attempts += 1;
        entry.last_error = Some(error);
        if dead {
            entry.status = TaskStatus::Dead;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;

    fn store(stock: u32) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_combination(
            1,
            "T-shirt",
            Combination {
                sku: Sku::from("TS-SM-RD-1"),
                price: Decimal::from_str("19.99").unwrap(),
                currency: Currency::USD,
                stock,
                options: vec![],
            },
        );
        store
    }

    #[tokio::test]
    async fn test_update_stock_is_all_or_nothing() {
        let store = store(2);
        store.insert_combination(
            2,
            "Mug",
            Combination {
                sku: Sku::from("MG-2"),
                price: Decimal::ONE,
                currency: Currency::USD,
                stock: 0,
                options: vec![],
            },
        );

        let items = [OrderItem::new("TS-SM-RD-1", 1), OrderItem::new("MG-2", 1)];
        let err = store.update_stock(&items).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { sku: Some(ref s) } if s == "MG-2"
        ));
        assert_eq!(store.stock(&Sku::from("TS-SM-RD-1")), Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_merged() {
        let store = store(3);
        let items = [OrderItem::new("TS-SM-RD-1", 2), OrderItem::new("TS-SM-RD-1", 2)];
        assert!(store.check_stock(&items).await.is_err());
    }

    #[tokio::test]
    async fn test_overflowing_duplicate_lines_never_pass() {
        let store = store(1);
        let items = [
            OrderItem::new("TS-SM-RD-1", u32::MAX),
            OrderItem::new("TS-SM-RD-1", 1),
        ];

        assert!(matches!(
            store.check_stock(&items).await,
            Err(CheckoutError::InsufficientStock { .. })
        ));
        assert!(store.update_stock(&items).await.is_err());
        assert_eq!(store.stock(&Sku::from("TS-SM-RD-1")), Some(1));
    }

    #[tokio::test]
    async fn test_last_unit_is_sold_once() {
        let store = Arc::new(store(1));
        let items = vec![OrderItem::new("TS-SM-RD-1", 1)];

        let (a, b) = tokio::join!(
            {
                let store = store.clone();
                let items = items.clone();
                async move { store.update_stock(&items).await }
            },
            {
                let store = store.clone();
                let items = items.clone();
                async move { store.update_stock(&items).await }
            }
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CheckoutError::InsufficientStock { .. }))));
        assert_eq!(store.stock(&Sku::from("TS-SM-RD-1")), Some(0));
    }

    #[tokio::test]
    async fn test_reconcile_drops_sold_out_entries() {
        let store = store(0);
        store.add_to_cart(7, &Sku::from("TS-SM-RD-1"), 2).unwrap();

        let outcome = store
            .check_and_reconcile_cart(7, &[OrderItem::new("TS-SM-RD-1", 2)])
            .await
            .unwrap();

        assert!(outcome.adjusted);
        assert!(outcome.note.unwrap().contains("TS-SM-RD-1"));
        assert!(store.cart_entries(7).is_empty());
        assert_eq!(store.cart_total(7).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_reconcile_flags_stale_request() {
        let store = store(5);
        store.add_to_cart(7, &Sku::from("TS-SM-RD-1"), 1).unwrap();

        let outcome = store
            .check_and_reconcile_cart(7, &[OrderItem::new("TS-SM-RD-1", 4)])
            .await
            .unwrap();
        assert!(outcome.adjusted);
        assert_eq!(store.cart_entries(7)[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_cart_is_newest_first() {
        let store = store(5);
        store.insert_combination(
            2,
            "Mug",
            Combination {
                sku: Sku::from("MG-2"),
                price: Decimal::from_str("4.50").unwrap(),
                currency: Currency::USD,
                stock: 5,
                options: vec![],
            },
        );
        store.add_to_cart(7, &Sku::from("TS-SM-RD-1"), 1).unwrap();
        store.add_to_cart(7, &Sku::from("MG-2"), 2).unwrap();

        let cart = store.cart(7).await.unwrap();
        assert_eq!(cart[0].combination.sku.as_str(), "MG-2");
        assert_eq!(cart[0].name, "Mug");

        let total = store.cart_total(7).await.unwrap();
        assert_eq!(total.count, 3);
        assert_eq!(total.total.display(), "$28.99");
    }

    #[test]
    fn test_from_catalog() {
        let catalog = ProductCatalog::from_toml(
            r#"
[[products]]
id = 3
name = "Hoodie"

[[products.combinations]]
options = ["Large"]
price = "45.00"
stock = 4
"#,
        )
        .unwrap();

        let store = InMemoryStore::from_catalog(&catalog).unwrap();
        assert_eq!(store.stock(&Sku::from("HD-LR-3")), Some(4));
    }
}

//! # Order Types
//!
//! Checkout request, cart and persisted order types.

use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::PaymentProvider;
use crate::money::{Currency, Money, PricedLine};
use crate::sku::Sku;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Store-assigned user identifier
pub type UserId = i64;

/// Store-assigned order identifier
pub type OrderId = i64;

/// A SKU and the quantity requested of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub sku: Sku,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }

    /// Check the quantity and that the SKU decodes to a product
    pub fn validate(&self) -> CheckoutResult<()> {
        if self.quantity == 0 {
            return Err(CheckoutError::InvalidQuantity {
                sku: self.sku.to_string(),
                quantity: self.quantity,
            });
        }
        self.sku.product_id()?;
        Ok(())
    }
}

/// A checkout attempt as sent by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Requested items
    pub products: Vec<OrderItem>,

    /// Currency of the attempt
    pub currency: Currency,

    /// Whether the items come from the shopper's persisted cart
    #[serde(default)]
    pub from_cart: bool,
}

impl Order {
    pub fn new(currency: Currency, products: Vec<OrderItem>, from_cart: bool) -> Self {
        Self {
            products,
            currency,
            from_cart,
        }
    }

    /// Validate every item; an order needs at least one
    pub fn validate(&self) -> CheckoutResult<()> {
        if self.products.is_empty() {
            return Err(CheckoutError::EmptyItemSet);
        }
        self.products.iter().try_for_each(OrderItem::validate)?;
        self.item_count()?;
        Ok(())
    }

    /// Total units across all lines
    pub fn item_count(&self) -> CheckoutResult<u32> {
        self.products
            .iter()
            .try_fold(0u32, |count, item| count.checked_add(item.quantity))
            .ok_or_else(|| CheckoutError::Validation("order quantity overflows".to_string()))
    }
}

/// The priced, stocked variant of a product for one option set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    pub sku: Sku,
    pub price: Decimal,
    pub currency: Currency,
    pub stock: u32,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A requested item resolved against its combination price
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItem {
    pub sku: Sku,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub quantity: u32,
}

impl PricedLine for PricedItem {
    fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// A line in a shopper's persisted cart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    pub product_id: u64,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub combination: Combination,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

impl CartEntry {
    pub fn order_item(&self) -> OrderItem {
        OrderItem::new(self.combination.sku.clone(), self.quantity)
    }
}

impl PricedLine for CartEntry {
    fn unit_price(&self) -> Decimal {
        self.combination.price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// Cart contents after the store reconciled them against stock
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Entries, newest first
    pub items: Vec<CartEntry>,
    pub count: u32,
    pub total: Money,
}

/// Client-minted correlation id tying order creation to its capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(Uuid);

impl ReferenceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the `Reference-Id` header value
    pub fn parse(raw: &str) -> CheckoutResult<Self> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|e| CheckoutError::Validation(format!("invalid reference id: {}", e)))
    }
}

impl Default for ReferenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Payer identity reported by the provider on capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub name: String,
    pub email: String,
    pub payer_id: String,
}

/// Everything needed to record a captured order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub provider: PaymentProvider,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub currency: Currency,
    pub provider_order_id: String,
    pub payer: Payer,
    pub reference_ids: Vec<String>,
    pub capture_ids: Vec<String>,
    /// Whether the originating cart should be cleared afterwards
    pub from_cart: bool,
}

/// A durable order row. Never updated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedOrder {
    pub id: OrderId,
    pub provider: PaymentProvider,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub currency: Currency,
    pub provider_order_id: String,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_id: String,
    pub reference_ids: Vec<String>,
    pub capture_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PersistedOrder {
    pub fn from_new(id: OrderId, order: NewOrder) -> Self {
        Self {
            id,
            provider: order.provider,
            user_id: order.user_id,
            items: order.items,
            total: order.total,
            currency: order.currency,
            provider_order_id: order.provider_order_id,
            payer_name: order.payer.name,
            payer_email: order.payer.email,
            payer_id: order.payer.payer_id,
            reference_ids: order.reference_ids,
            capture_ids: order.capture_ids,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_order_json_shape() {
        let order: Order = serde_json::from_str(
            r#"{"products":[{"sku":"TS-SM-RD-1","quantity":2}],"currency":"USD","fromCart":true}"#,
        )
        .unwrap();

        assert_eq!(order.currency, Currency::USD);
        assert!(order.from_cart);
        assert_eq!(order.products[0].sku.as_str(), "TS-SM-RD-1");
        assert_eq!(order.item_count().unwrap(), 2);
    }

    #[test]
    fn test_order_rejects_unknown_currency() {
        let parsed = serde_json::from_str::<Order>(
            r#"{"products":[{"sku":"T-1","quantity":1}],"currency":"EUR"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_order_validation() {
        let order = Order::new(Currency::USD, vec![], false);
        assert!(matches!(order.validate(), Err(CheckoutError::EmptyItemSet)));

        let order = Order::new(Currency::USD, vec![OrderItem::new("T-1", 0)], false);
        assert!(matches!(
            order.validate(),
            Err(CheckoutError::InvalidQuantity { .. })
        ));

        let order = Order::new(Currency::USD, vec![OrderItem::new("TX", 1)], false);
        assert!(matches!(order.validate(), Err(CheckoutError::InvalidSku(_))));

        let order = Order::new(Currency::COP, vec![OrderItem::new("T-1", 3)], true);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_overflowing_quantities_are_rejected() {
        let order = Order::new(
            Currency::USD,
            vec![
                OrderItem::new("TS-SM-RD-1", u32::MAX),
                OrderItem::new("TS-SM-RD-1", 1),
            ],
            false,
        );
        assert!(matches!(order.validate(), Err(CheckoutError::Validation(_))));
        assert!(order.item_count().is_err());
    }

    #[test]
    fn test_reference_id_parse() {
        let id = ReferenceId::new();
        assert_eq!(ReferenceId::parse(&id.to_string()).unwrap(), id);
        assert!(ReferenceId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_persisted_order_from_new() {
        let order = NewOrder {
            provider: PaymentProvider::Paypal,
            user_id: 7,
            items: vec![OrderItem::new("T-1", 1)],
            total: Decimal::from_str("19.99").unwrap(),
            currency: Currency::USD,
            provider_order_id: "5O190127TN364715T".into(),
            payer: Payer {
                name: "John".into(),
                email: "john@example.com".into(),
                payer_id: "QYR5Z8XDVJNXQ".into(),
            },
            reference_ids: vec!["ref".into()],
            capture_ids: vec!["3C679366HH908993F".into()],
            from_cart: false,
        };

        let persisted = PersistedOrder::from_new(11, order);
        assert_eq!(persisted.id, 11);
        assert_eq!(persisted.payer_id, "QYR5Z8XDVJNXQ");
        assert_eq!(persisted.capture_ids, vec!["3C679366HH908993F"]);
    }
}

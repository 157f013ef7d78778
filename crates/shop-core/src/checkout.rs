//! # Checkout Service
//!
//! Ties the inventory gateway, the payment gateway and the materializer into
//! the two halves of a checkout attempt: [`CheckoutService::begin`] creates
//! the provider order the shopper approves, [`CheckoutService::complete`]
//! captures it and records the order.

use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::{BoxedPaymentGateway, ProviderOrder};
use crate::inventory::{CheckoutInventory, StockDecision};
use crate::materialize::OrderMaterializer;
use crate::money::{self, Money};
use crate::order::{CartSnapshot, NewOrder, Order, OrderId, ReferenceId, UserId};
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

/// Outcome of starting a checkout attempt
#[derive(Debug, Clone)]
pub enum BeginOutcome {
    /// The cart changed; show it again instead of charging
    CartAdjusted(CartSnapshot),
    /// A provider order awaits shopper approval
    Created(ProviderOrder),
}

/// A captured and recorded order
#[derive(Debug, Clone)]
pub struct CompletedOrder {
    pub order_id: OrderId,
    pub provider_order_id: String,
    pub total: Money,
}

#[derive(Clone)]
pub struct CheckoutService {
    inventory: CheckoutInventory,
    gateway: BoxedPaymentGateway,
    materializer: OrderMaterializer,
}

impl CheckoutService {
    pub fn new(
        inventory: CheckoutInventory,
        gateway: BoxedPaymentGateway,
        materializer: OrderMaterializer,
    ) -> Self {
        Self {
            inventory,
            gateway,
            materializer,
        }
    }

    pub fn gateway(&self) -> &BoxedPaymentGateway {
        &self.gateway
    }

    /// Check stock, price the order and create the provider order.
    #[instrument(skip(self, order), fields(provider = %self.gateway.provider(), currency = %order.currency))]
    pub async fn begin(&self, user_id: UserId, order: Order) -> CheckoutResult<BeginOutcome> {
        order.validate()?;

        if let StockDecision::CartAdjusted(snapshot) = self.inventory.reserve(user_id, &order).await? {
            return Ok(BeginOutcome::CartAdjusted(snapshot));
        }

        let total = self.inventory.authoritative_total(&order).await?;
        let reference_id = ReferenceId::new();

        let created = self
            .gateway
            .create_order(reference_id, order.currency, total)
            .await?;

        info!(
            provider_order_id = %created.provider_order_id,
            reference_id = %reference_id,
            total = %Money::new(total, order.currency).display(),
            "Checkout started"
        );

        Ok(BeginOutcome::Created(created))
    }

    /// Authenticate the capture request, capture the payment and record the
    /// order.
    ///
    /// # Arguments
    /// * `authorization` - Raw `Authorization` header of the capture request
    /// * `reference_id` - Raw `Reference-Id` header of the capture request
    #[instrument(skip(self, order, authorization, reference_id), fields(provider = %self.gateway.provider()))]
    pub async fn complete(
        &self,
        user_id: UserId,
        provider_order_id: &str,
        order: Order,
        authorization: Option<&str>,
        reference_id: Option<&str>,
    ) -> CheckoutResult<CompletedOrder> {
        let reference_id = self
            .gateway
            .authenticate_capture(authorization, reference_id)?;

        order.validate()?;
        if user_id <= 0 {
            return Err(CheckoutError::Unauthenticated(format!(
                "invalid user id {}",
                user_id
            )));
        }

        let captured = self.gateway.capture(provider_order_id).await?;

        if !captured.carries_reference(&reference_id) {
            warn!(
                provider_order_id = %captured.provider_order_id,
                reference_id = %reference_id,
                captured_reference_ids = ?captured.reference_ids,
                "Captured order does not carry the reference id presented with the capture"
            );
        }

        let total: Decimal = money::total_from_amounts(order.currency, &captured.net_amounts)?;

        let new_order = NewOrder {
            provider: self.gateway.provider(),
            user_id,
            items: order.products,
            total,
            currency: order.currency,
            provider_order_id: captured.provider_order_id.clone(),
            payer: captured.payer,
            reference_ids: vec![reference_id.to_string()],
            capture_ids: captured.capture_ids,
            from_cart: order.from_cart,
        };

        let order_id = self.materializer.materialize(new_order).await.map_err(|e| {
            error!(
                provider_order_id = %captured.provider_order_id,
                reference_id = %reference_id,
                error = %e,
                "Payment captured but order was not recorded"
            );
            e
        })?;

        Ok(CompletedOrder {
            order_id,
            provider_order_id: captured.provider_order_id,
            total: Money::new(total, order.currency),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CapturedPayment, PaymentGateway, PaymentProvider};
    use crate::materialize::{FulfillmentTask, FulfillmentWorker};
    use crate::memory::InMemoryStore;
    use crate::money::Currency;
    use crate::order::{Combination, OrderItem, Payer};
    use crate::sku::Sku;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const TOKEN: &str = "A21AAFEpH4PsADK7qSS7pSRsgzfENtu";

    struct StubGateway {
        capture_status: &'static str,
        created_totals: Mutex<Vec<Decimal>>,
        references: Mutex<Vec<String>>,
        captures: AtomicUsize,
    }

    impl StubGateway {
        fn new(capture_status: &'static str) -> Arc<Self> {
            Arc::new(Self {
                capture_status,
                created_totals: Mutex::new(Vec::new()),
                references: Mutex::new(Vec::new()),
                captures: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_order(
            &self,
            reference_id: ReferenceId,
            currency: Currency,
            total: Decimal,
        ) -> CheckoutResult<ProviderOrder> {
            self.created_totals.lock().unwrap().push(total);
            self.references.lock().unwrap().push(reference_id.to_string());
            Ok(ProviderOrder {
                provider_order_id: "5O190127TN364715T".into(),
                payload: serde_json::json!({
                    "id": "5O190127TN364715T",
                    "status": "PAYER_ACTION_REQUIRED",
                    "amount": currency.format_amount(total),
                }),
                bearer_token: TOKEN.into(),
                reference_id,
            })
        }

        fn authenticate_capture(
            &self,
            authorization: Option<&str>,
            reference_id: Option<&str>,
        ) -> CheckoutResult<ReferenceId> {
            if authorization != Some(format!("Bearer {}", TOKEN).as_str()) {
                return Err(CheckoutError::Unauthenticated("token mismatch".into()));
            }
            ReferenceId::parse(reference_id.ok_or(CheckoutError::MissingReference)?)
        }

        async fn capture(&self, provider_order_id: &str) -> CheckoutResult<CapturedPayment> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            let body = format!(
                r#"{{"id":"{}","status":"{}"}}"#,
                provider_order_id, self.capture_status
            );
            if self.capture_status != "COMPLETED" {
                return Err(CheckoutError::CaptureNotCompleted {
                    status: self.capture_status.into(),
                    body,
                });
            }
            Ok(CapturedPayment {
                provider_order_id: provider_order_id.into(),
                payer: Payer {
                    name: "John Doe".into(),
                    email: "john@example.com".into(),
                    payer_id: "QYR5Z8XDVJNXQ".into(),
                },
                capture_ids: vec!["3C679366HH908993F".into()],
                reference_ids: self.references.lock().unwrap().clone(),
                net_amounts: vec![Decimal::from_str("18.91").unwrap()],
                raw_body: body,
            })
        }

        fn provider(&self) -> PaymentProvider {
            PaymentProvider::Paypal
        }
    }

    fn setup(stock: u32, gateway: Arc<StubGateway>) -> (CheckoutService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.insert_combination(
            1,
            "T-shirt",
            Combination {
                sku: Sku::from("TS-SM-RD-1"),
                price: Decimal::from_str("19.995").unwrap(),
                currency: Currency::USD,
                stock,
                options: vec!["Small".into(), "Red".into()],
            },
        );
        let (materializer, _rx) = OrderMaterializer::new(store.clone());
        let service = CheckoutService::new(
            CheckoutInventory::new(store.clone()),
            gateway,
            materializer,
        );
        (service, store)
    }

    fn cart_order() -> Order {
        Order::new(Currency::USD, vec![OrderItem::new("TS-SM-RD-1", 1)], true)
    }

    fn reference(outcome: BeginOutcome) -> String {
        match outcome {
            BeginOutcome::Created(created) => created.reference_id.to_string(),
            other => panic!("expected provider order, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cart_checkout_end_to_end() {
        let gateway = StubGateway::new("COMPLETED");
        let (service, store) = setup(5, gateway.clone());
        store.add_to_cart(7, &Sku::from("TS-SM-RD-1"), 1).unwrap();

        let outcome = service.begin(7, cart_order()).await.unwrap();
        assert_eq!(
            *gateway.created_totals.lock().unwrap(),
            vec![Decimal::from_str("19.99").unwrap()]
        );
        let reference_id = reference(outcome);

        let bearer = format!("Bearer {}", TOKEN);
        let completed = service
            .complete(
                7,
                "5O190127TN364715T",
                cart_order(),
                Some(bearer.as_str()),
                Some(reference_id.as_str()),
            )
            .await
            .unwrap();

        assert!(completed.order_id > 0);
        assert_eq!(completed.total.display(), "$18.91");

        let orders = store.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].reference_ids, vec![reference_id]);
        assert_eq!(orders[0].payer_id, "QYR5Z8XDVJNXQ");

        let tasks: Vec<_> = store.outbox().into_iter().map(|e| e.task).collect();
        assert!(tasks.contains(&FulfillmentTask::ClearCart { user_id: 7 }));

        FulfillmentWorker::new(store.clone(), store.clone(), 3)
            .drain_once()
            .await
            .unwrap();
        assert_eq!(store.stock(&Sku::from("TS-SM-RD-1")), Some(4));
        assert!(store.cart_entries(7).is_empty());
    }

    #[tokio::test]
    async fn test_sold_out_cart_is_rendered_not_charged() {
        let gateway = StubGateway::new("COMPLETED");
        let (service, store) = setup(0, gateway.clone());
        store.add_to_cart(7, &Sku::from("TS-SM-RD-1"), 1).unwrap();

        match service.begin(7, cart_order()).await.unwrap() {
            BeginOutcome::CartAdjusted(snapshot) => {
                assert!(snapshot.items.is_empty());
                assert_eq!(snapshot.count, 0);
            }
            other => panic!("expected adjusted cart, got {:?}", other),
        }
        assert!(gateway.created_totals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declined_capture_records_nothing() {
        let gateway = StubGateway::new("DECLINED");
        let (service, store) = setup(5, gateway.clone());

        let bearer = format!("Bearer {}", TOKEN);
        let reference_id = ReferenceId::new().to_string();
        let err = service
            .complete(
                7,
                "5O190127TN364715T",
                cart_order(),
                Some(bearer.as_str()),
                Some(reference_id.as_str()),
            )
            .await
            .unwrap_err();

        match err {
            CheckoutError::CaptureNotCompleted { status, body } => {
                assert_eq!(status, "DECLINED");
                assert!(body.contains("\"DECLINED\""));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(store.orders().is_empty());
        assert!(store.outbox().is_empty());
    }

    #[tokio::test]
    async fn test_reference_mismatch_still_records_captured_payment() {
        let gateway = StubGateway::new("COMPLETED");
        let (service, store) = setup(5, gateway.clone());
        service.begin(7, buy_now_order()).await.unwrap();

        let other = ReferenceId::new().to_string();
        let bearer = format!("Bearer {}", TOKEN);
        service
            .complete(
                7,
                "5O190127TN364715T",
                buy_now_order(),
                Some(bearer.as_str()),
                Some(other.as_str()),
            )
            .await
            .unwrap();

        let orders = store.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].reference_ids, vec![other]);
    }

    fn buy_now_order() -> Order {
        Order::new(Currency::USD, vec![OrderItem::new("TS-SM-RD-1", 1)], false)
    }

    #[tokio::test]
    async fn test_forged_capture_never_reaches_gateway() {
        let gateway = StubGateway::new("COMPLETED");
        let (service, store) = setup(5, gateway.clone());
        let reference_id = ReferenceId::new().to_string();

        let err = service
            .complete(
                7,
                "5O190127TN364715T",
                cart_order(),
                Some("Bearer forged"),
                Some(reference_id.as_str()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Unauthenticated(_)));

        let bearer = format!("Bearer {}", TOKEN);
        let err = service
            .complete(7, "5O190127TN364715T", cart_order(), Some(bearer.as_str()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingReference));

        assert_eq!(gateway.captures.load(Ordering::SeqCst), 0);
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_order_rejected_before_stock_check() {
        let gateway = StubGateway::new("COMPLETED");
        let (service, _store) = setup(5, gateway.clone());

        let order = Order::new(Currency::USD, vec![OrderItem::new("TX", 1)], false);
        assert!(matches!(
            service.begin(7, order).await,
            Err(CheckoutError::InvalidSku(_))
        ));
        assert!(gateway.created_totals.lock().unwrap().is_empty());
    }
}

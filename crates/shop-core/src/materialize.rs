//! # Order Materializer
//!
//! Records a captured payment as one immutable order row and, in the same
//! write, the fulfillment tasks that still have to run against inventory
//! (clear the cart, decrement stock). A background [`FulfillmentWorker`]
//! drains those tasks so the shopper's response never waits on them, and a
//! failed task stays in the outbox until it succeeds or runs out of attempts.

use crate::error::{CheckoutError, CheckoutResult};
use crate::inventory::BoxedInventoryStore;
use crate::order::{NewOrder, OrderId, OrderItem, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// Outbox entry identifier
pub type TaskId = u64;

/// Post-capture work recorded alongside an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FulfillmentTask {
    ClearCart { user_id: UserId },
    UpdateStock { items: Vec<OrderItem> },
}

/// Outbox entry state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Done,
    /// Gave up; needs manual attention
    Dead,
}

/// A fulfillment task with its bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: TaskId,
    pub order_id: OrderId,
    pub task: FulfillmentTask,
    pub status: TaskStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Durable order storage.
///
/// `insert_order` must persist the order and its tasks together or not at
/// all.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(
        &self,
        order: NewOrder,
        tasks: Vec<FulfillmentTask>,
    ) -> CheckoutResult<OrderId>;

    /// Pending tasks, oldest first
    async fn pending_tasks(&self, limit: usize) -> CheckoutResult<Vec<OutboxEntry>>;

    async fn complete_task(&self, id: TaskId) -> CheckoutResult<()>;

    /// Record a failed attempt; `dead` retires the task
    async fn fail_task(&self, id: TaskId, error: String, dead: bool) -> CheckoutResult<()>;
}

/// Shared order repository (dynamic dispatch)
pub type BoxedOrderRepository = Arc<dyn OrderRepository>;

/// Persists orders and wakes the fulfillment worker
#[derive(Clone)]
pub struct OrderMaterializer {
    repo: BoxedOrderRepository,
    wake: mpsc::Sender<()>,
}

impl OrderMaterializer {
    /// Create a materializer and the receiving end for its worker
    pub fn new(repo: BoxedOrderRepository) -> (Self, mpsc::Receiver<()>) {
        let (wake, rx) = mpsc::channel(1);
        (Self { repo, wake }, rx)
    }

    /// Validate and persist a captured order with its fulfillment tasks.
    #[instrument(skip(self, order), fields(user_id = order.user_id, provider_order_id = %order.provider_order_id))]
    pub async fn materialize(&self, order: NewOrder) -> CheckoutResult<OrderId> {
        validate(&order)?;

        let mut tasks = Vec::with_capacity(2);
        if order.from_cart {
            tasks.push(FulfillmentTask::ClearCart {
                user_id: order.user_id,
            });
        }
        tasks.push(FulfillmentTask::UpdateStock {
            items: order.items.clone(),
        });

        let total = order.total;
        let currency = order.currency;
        let order_id = self.repo.insert_order(order, tasks).await?;

        info!(order_id, total = %total, currency = %currency, "Order recorded");

        // A full channel already holds a wake-up
        let _ = self.wake.try_send(());

        Ok(order_id)
    }
}

fn validate(order: &NewOrder) -> CheckoutResult<()> {
    if order.items.is_empty() {
        return Err(CheckoutError::EmptyItemSet);
    }
    order.items.iter().try_for_each(OrderItem::validate)?;

    if order.payer.payer_id.trim().is_empty() {
        return Err(CheckoutError::Validation("payer id is required".to_string()));
    }
    if order.user_id <= 0 {
        return Err(CheckoutError::Validation(format!(
            "invalid user id {}",
            order.user_id
        )));
    }
    if order.total <= rust_decimal::Decimal::ZERO {
        return Err(CheckoutError::Validation(format!(
            "order total must be positive, got {}",
            order.total
        )));
    }
    if order.provider_order_id.is_empty() {
        return Err(CheckoutError::Validation(
            "provider order id is required".to_string(),
        ));
    }
    Ok(())
}

/// Counts from one pass over the outbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub failed: usize,
    pub dead: usize,
}

/// Applies outbox tasks against the inventory store
pub struct FulfillmentWorker {
    repo: BoxedOrderRepository,
    store: BoxedInventoryStore,
    max_attempts: u32,
    poll_interval: Duration,
    batch_size: usize,
}

impl FulfillmentWorker {
    pub fn new(repo: BoxedOrderRepository, store: BoxedInventoryStore, max_attempts: u32) -> Self {
        Self {
            repo,
            store,
            max_attempts: max_attempts.max(1),
            poll_interval: Duration::from_secs(30),
            batch_size: 64,
        }
    }

    /// Builder: set how often failed tasks are retried without a wake-up
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run one pass over the pending tasks
    pub async fn drain_once(&self) -> CheckoutResult<DrainReport> {
        let mut report = DrainReport::default();

        for entry in self.repo.pending_tasks(self.batch_size).await? {
            match self.apply(&entry.task).await {
                Ok(()) => {
                    self.repo.complete_task(entry.id).await?;
                    report.completed += 1;
                }
                Err(e) => {
                    let attempts = entry.attempts + 1;
                    // Stock will not come back for an already paid order
                    let dead = attempts >= self.max_attempts
                        || matches!(e, CheckoutError::InsufficientStock { .. });

                    if dead {
                        error!(
                            task_id = entry.id,
                            order_id = entry.order_id,
                            attempts,
                            task = ?entry.task,
                            error = %e,
                            "Fulfillment task abandoned"
                        );
                        report.dead += 1;
                    } else {
                        warn!(
                            task_id = entry.id,
                            order_id = entry.order_id,
                            attempts,
                            error = %e,
                            "Fulfillment task failed, will retry"
                        );
                        report.failed += 1;
                    }

                    self.repo.fail_task(entry.id, e.to_string(), dead).await?;
                }
            }
        }

        Ok(report)
    }

    async fn apply(&self, task: &FulfillmentTask) -> CheckoutResult<()> {
        match task {
            FulfillmentTask::ClearCart { user_id } => self.store.empty_cart(*user_id).await,
            FulfillmentTask::UpdateStock { items } => self.store.update_stock(items).await,
        }
    }

    /// Drain on every wake-up and on the poll interval, until every
    /// materializer is dropped.
    pub async fn run(self, mut wake: mpsc::Receiver<()>) {
        info!(max_attempts = self.max_attempts, "Fulfillment worker started");

        loop {
            tokio::select! {
                signal = wake.recv() => {
                    if signal.is_none() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            if let Err(e) = self.drain_once().await {
                error!(error = %e, "Failed to drain fulfillment outbox");
            }
        }

        info!("Fulfillment worker stopped");
    }
}

//! # Order Storage
//!
//! Persistence port for orders and an in-memory adapter. The port mirrors
//! what a relational store gives us: a unique constraint on the public
//! order id and a conditional update (`UPDATE ... WHERE payment_status =
//! 'pending'`) that serialises concurrent writers on one row.

use crate::error::{PaymentError, PaymentResult};
use crate::order::{Order, OrderId, OrderUpdate, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Result of a conditional status write
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The row was in the expected state and now carries the new status
    Applied(Order),
    /// The row had already moved on; this is its current state
    Current(Order),
}

/// Port over the orders table
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order, assigning its storage id.
    /// Fails with `DuplicateOrderId` if the public id is taken.
    async fn insert(&self, order: Order) -> PaymentResult<Order>;

    async fn find_by_order_id(&self, order_id: &OrderId) -> PaymentResult<Option<Order>>;

    /// Apply `update` only while the order is still pending.
    /// Returns `InvalidOrderState` if it is not.
    async fn update_pending(&self, order_id: &OrderId, update: OrderUpdate) -> PaymentResult<Order>;

    /// Atomically move `order_id` from `expected` to `new_status`
    async fn compare_and_set_status(
        &self,
        order_id: &OrderId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> PaymentResult<CasOutcome>;
}

#[derive(Default)]
struct OrderTable {
    next_id: u64,
    rows: HashMap<OrderId, Order>,
}

/// In-memory order store; all writes go through one lock
#[derive(Default)]
pub struct InMemoryOrderStore {
    table: RwLock<OrderTable>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, mut order: Order) -> PaymentResult<Order> {
        let mut table = self.table.write().await;
        if table.rows.contains_key(&order.order_id) {
            return Err(PaymentError::DuplicateOrderId {
                order_id: order.order_id,
            });
        }
        table.next_id += 1;
        order.id = table.next_id;
        table.rows.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> PaymentResult<Option<Order>> {
        Ok(self.table.read().await.rows.get(order_id).cloned())
    }

    async fn update_pending(&self, order_id: &OrderId, update: OrderUpdate) -> PaymentResult<Order> {
        let mut table = self.table.write().await;
        let order = table
            .rows
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if !order.is_pending() {
            return Err(PaymentError::InvalidOrderState {
                order_id: order_id.clone(),
                status: order.payment_status,
            });
        }

        order.amount = update.amount;
        order.currency = update.currency;
        order.pay_system = update.pay_system;
        if update.description.is_some() {
            order.description = update.description;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn compare_and_set_status(
        &self,
        order_id: &OrderId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> PaymentResult<CasOutcome> {
        let mut table = self.table.write().await;
        let order = table
            .rows
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.payment_status != expected {
            return Ok(CasOutcome::Current(order.clone()));
        }

        order.payment_status = new_status;
        order.paid_at = paid_at;
        order.updated_at = Utc::now();
        Ok(CasOutcome::Applied(order.clone()))
    }
}

//! # Payment Order Reconciler
//!
//! Owns the order lifecycle: creates orders, re-targets pending ones and
//! applies verified callback outcomes. Status moves forward exactly once,
//! from `pending` into a terminal state:
//!
//! ```text
//!              ┌──────────► success  (paid_at set)
//!              ├──────────► fail
//!   pending ───┼──────────► cancel
//!              ├──────────► refund
//!              └──────────► expired
//! ```
//!
//! A repeated callback with the same terminal status is a no-op; one with
//! a different terminal status is a conflict and leaves the order as is.

use crate::driver::CallbackOutcome;
use crate::error::{PaymentError, PaymentResult};
use crate::order::{Currency, Order, OrderId, OrderUpdate, PaymentStatus, MAX_ORDER_AMOUNT};
use crate::principal::{Capability, Principal, UserId};
use crate::store::{CasOutcome, OrderStore};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Input for creating or re-targeting an order
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: UserId,
    /// Existing pending order to reuse; `None` creates a new order
    pub order_id: Option<OrderId>,
    pub amount: Decimal,
    pub currency: Currency,
    pub pay_system: String,
    pub description: Option<String>,
}

pub struct PaymentOrderReconciler {
    store: Arc<dyn OrderStore>,
}

impl PaymentOrderReconciler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Create a fresh pending order, or update a pending one the caller owns
    #[instrument(skip(self, request), fields(user_id = %request.user_id, pay_system = %request.pay_system))]
    pub async fn create_or_get_order(&self, request: CreateOrder) -> PaymentResult<Order> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::validation("amount", "must be greater than zero"));
        }
        if request.amount > MAX_ORDER_AMOUNT {
            return Err(PaymentError::validation(
                "amount",
                format!("must not exceed {MAX_ORDER_AMOUNT}"),
            ));
        }

        let Some(order_id) = request.order_id else {
            let mut order = Order::pending(
                request.user_id,
                OrderId::generate(),
                request.amount,
                request.currency,
                request.pay_system,
            );
            if let Some(description) = request.description {
                order = order.with_description(description);
            }
            let order = self.store.insert(order).await?;
            info!(order_id = %order.order_id, amount = %order.amount, "Created order");
            return Ok(order);
        };

        let existing = self
            .store
            .find_by_order_id(&order_id)
            .await?
            .filter(|order| order.user_id == request.user_id)
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if !existing.is_pending() {
            return Err(PaymentError::InvalidOrderState {
                order_id,
                status: existing.payment_status,
            });
        }

        let order = self
            .store
            .update_pending(
                &order_id,
                OrderUpdate {
                    amount: request.amount,
                    currency: request.currency,
                    pay_system: request.pay_system,
                    description: request.description,
                },
            )
            .await?;
        info!(order_id = %order.order_id, amount = %order.amount, "Reusing pending order");
        Ok(order)
    }

    /// Apply a verified callback outcome to its order
    #[instrument(skip(self, outcome), fields(order_id = %outcome.order_id, status = %outcome.payment_status))]
    pub async fn apply_callback(&self, outcome: &CallbackOutcome) -> PaymentResult<Order> {
        let order_id = &outcome.order_id;
        let incoming = outcome.payment_status;

        let order = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.payment_status.is_terminal() {
            return settle_terminal(order, incoming);
        }

        if !incoming.is_terminal() {
            debug!("Non-terminal callback, order stays pending");
            return Ok(order);
        }

        let paid_at = (incoming == PaymentStatus::Success).then(Utc::now);
        match self
            .store
            .compare_and_set_status(order_id, PaymentStatus::Pending, incoming, paid_at)
            .await?
        {
            CasOutcome::Applied(order) => {
                info!("Order moved to {}", order.payment_status);
                Ok(order)
            }
            // Lost the race to a concurrent callback; judge against what it wrote
            CasOutcome::Current(order) => settle_terminal(order, incoming),
        }
    }

    /// Fetch an order for the result query. Owners see their orders;
    /// `ViewAnyOrder` sees all. Reads retry once on transient storage errors.
    pub async fn order_for_user(&self, order_id: &OrderId, principal: &Principal) -> PaymentResult<Order> {
        let found = match self.store.find_by_order_id(order_id).await {
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Order read failed, retrying once");
                self.store.find_by_order_id(order_id).await?
            }
            other => other?,
        };

        found
            .filter(|order| {
                order.user_id == principal.id || principal.can(Capability::ViewAnyOrder)
            })
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })
    }
}

/// Compare an incoming status with an order that already left `pending`
fn settle_terminal(order: Order, incoming: PaymentStatus) -> PaymentResult<Order> {
    if order.payment_status == incoming {
        debug!("Duplicate callback, order already {}", incoming);
        return Ok(order);
    }
    if !incoming.is_terminal() {
        debug!("Stale {} callback for {} order", incoming, order.payment_status);
        return Ok(order);
    }
    warn!(
        current = %order.payment_status,
        incoming = %incoming,
        "Conflicting callback status"
    );
    Err(PaymentError::ConflictingStatus {
        order_id: order.order_id,
        current: order.payment_status,
        incoming,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Role;
    use crate::store::InMemoryOrderStore;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn reconciler() -> (Arc<InMemoryOrderStore>, PaymentOrderReconciler) {
        let store = Arc::new(InMemoryOrderStore::new());
        (store.clone(), PaymentOrderReconciler::new(store))
    }

    fn new_order(user: u64) -> CreateOrder {
        CreateOrder {
            user_id: UserId(user),
            order_id: None,
            amount: Decimal::new(10000, 2),
            currency: Currency::UAH,
            pay_system: "liqpay".into(),
            description: None,
        }
    }

    fn outcome(order: &Order, status: PaymentStatus) -> CallbackOutcome {
        CallbackOutcome {
            order_id: order.order_id.clone(),
            payment_status: status,
            raw: serde_json::json!({ "status": status.as_str() }),
        }
    }

    #[tokio::test]
    async fn test_create_new_order_is_pending_with_fresh_id() {
        let (_, reconciler) = reconciler();
        let a = reconciler.create_or_get_order(new_order(1)).await.unwrap();
        let b = reconciler.create_or_get_order(new_order(1)).await.unwrap();

        assert_eq!(a.payment_status, PaymentStatus::Pending);
        assert_ne!(a.order_id, b.order_id);
        assert!(a.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let (_, reconciler) = reconciler();
        let request = CreateOrder {
            amount: Decimal::ZERO,
            ..new_order(1)
        };
        assert!(matches!(
            reconciler.create_or_get_order(request).await,
            Err(PaymentError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_amount_above_ceiling() {
        let (store, reconciler) = reconciler();
        for amount in [Decimal::MAX, MAX_ORDER_AMOUNT + Decimal::new(1, 2)] {
            let request = CreateOrder {
                amount,
                ..new_order(1)
            };
            assert!(matches!(
                reconciler.create_or_get_order(request).await,
                Err(PaymentError::Validation { field, .. }) if field == "amount"
            ));
        }

        let at_ceiling = CreateOrder {
            amount: MAX_ORDER_AMOUNT,
            ..new_order(1)
        };
        let order = reconciler.create_or_get_order(at_ceiling).await.unwrap();
        assert!(store.find_by_order_id(&order.order_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reuse_pending_order_updates_fields() {
        let (_, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();

        let reused = reconciler
            .create_or_get_order(CreateOrder {
                order_id: Some(order.order_id.clone()),
                amount: Decimal::new(25000, 2),
                pay_system: "stripe".into(),
                ..new_order(1)
            })
            .await
            .unwrap();

        assert_eq!(reused.order_id, order.order_id);
        assert_eq!(reused.id, order.id);
        assert_eq!(reused.amount, Decimal::new(25000, 2));
        assert_eq!(reused.pay_system, "stripe");
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_order_not_found() {
        let (_, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();

        let missing = CreateOrder {
            order_id: Some(OrderId::from_trusted("ORD-missing")),
            ..new_order(1)
        };
        assert!(matches!(
            reconciler.create_or_get_order(missing).await,
            Err(PaymentError::OrderNotFound { .. })
        ));

        let foreign = CreateOrder {
            order_id: Some(order.order_id.clone()),
            ..new_order(2)
        };
        assert!(matches!(
            reconciler.create_or_get_order(foreign).await,
            Err(PaymentError::OrderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_paid_order_cannot_be_retargeted() {
        let (_, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();
        reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Success))
            .await
            .unwrap();

        let retry = CreateOrder {
            order_id: Some(order.order_id.clone()),
            ..new_order(1)
        };
        assert!(matches!(
            reconciler.create_or_get_order(retry).await,
            Err(PaymentError::InvalidOrderState {
                status: PaymentStatus::Success,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_success_callback_is_idempotent() {
        let (_, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();

        let first = reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Success))
            .await
            .unwrap();
        let second = reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Success))
            .await
            .unwrap();

        assert_eq!(first.payment_status, PaymentStatus::Success);
        assert!(first.paid_at.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_conflicting_terminal_status_is_rejected() {
        let (store, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();
        reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Success))
            .await
            .unwrap();

        let err = reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Fail))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::ConflictingStatus {
                current: PaymentStatus::Success,
                incoming: PaymentStatus::Fail,
                ..
            }
        ));

        let stored = store.find_by_order_id(&order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_failure_leaves_paid_at_empty() {
        let (_, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();
        let failed = reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Fail))
            .await
            .unwrap();
        assert_eq!(failed.payment_status, PaymentStatus::Fail);
        assert!(failed.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_non_terminal_callbacks_never_move_or_conflict() {
        let (_, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();

        let still = reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Pending))
            .await
            .unwrap();
        assert!(still.is_pending());

        reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Success))
            .await
            .unwrap();
        let late = reconciler
            .apply_callback(&outcome(&order, PaymentStatus::Pending))
            .await
            .unwrap();
        assert_eq!(late.payment_status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_unknown_order_callback() {
        let (_, reconciler) = reconciler();
        let ghost = CallbackOutcome {
            order_id: OrderId::from_trusted("ORD-ghost"),
            payment_status: PaymentStatus::Success,
            raw: serde_json::Value::Null,
        };
        assert!(matches!(
            reconciler.apply_callback(&ghost).await,
            Err(PaymentError::OrderNotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_callbacks_set_paid_at_once() {
        let (store, reconciler) = reconciler();
        let reconciler = Arc::new(reconciler);
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();
        let callback = outcome(&order, PaymentStatus::Success);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = reconciler.clone();
                let callback = callback.clone();
                tokio::spawn(async move { reconciler.apply_callback(&callback).await })
            })
            .collect();

        let mut paid: Vec<DateTime<Utc>> = Vec::new();
        for handle in handles {
            let order = handle.await.unwrap().unwrap();
            assert_eq!(order.payment_status, PaymentStatus::Success);
            paid.push(order.paid_at.unwrap());
        }

        let stored = store.find_by_order_id(&order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Success);
        assert!(paid.iter().all(|at| Some(*at) == stored.paid_at));
    }

    #[tokio::test]
    async fn test_result_visibility() {
        let (_, reconciler) = reconciler();
        let order = reconciler.create_or_get_order(new_order(1)).await.unwrap();

        let owner = Principal::new(UserId(1), "owner@example.com");
        let stranger = Principal::new(UserId(2), "other@example.com");
        let admin = Principal::new(UserId(3), "admin@example.com").with_role(Role::Admin);

        assert!(reconciler.order_for_user(&order.order_id, &owner).await.is_ok());
        assert!(matches!(
            reconciler.order_for_user(&order.order_id, &stranger).await,
            Err(PaymentError::OrderNotFound { .. })
        ));
        assert!(reconciler.order_for_user(&order.order_id, &admin).await.is_ok());
    }

    struct FlakyStore {
        inner: InMemoryOrderStore,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl OrderStore for FlakyStore {
        async fn insert(&self, order: Order) -> PaymentResult<Order> {
            self.inner.insert(order).await
        }

        async fn find_by_order_id(&self, order_id: &OrderId) -> PaymentResult<Option<Order>> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(PaymentError::Storage("connection reset".into()));
            }
            self.inner.find_by_order_id(order_id).await
        }

        async fn update_pending(&self, order_id: &OrderId, update: OrderUpdate) -> PaymentResult<Order> {
            self.inner.update_pending(order_id, update).await
        }

        async fn compare_and_set_status(
            &self,
            order_id: &OrderId,
            expected: PaymentStatus,
            new_status: PaymentStatus,
            paid_at: Option<DateTime<Utc>>,
        ) -> PaymentResult<CasOutcome> {
            self.inner
                .compare_and_set_status(order_id, expected, new_status, paid_at)
                .await
        }
    }

    #[tokio::test]
    async fn test_result_read_retries_once() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryOrderStore::new(),
            failed_once: AtomicBool::new(false),
        });
        let order = store
            .inner
            .insert(Order::pending(
                UserId(1),
                OrderId::from_trusted("ORD-1"),
                Decimal::ONE,
                Currency::UAH,
                "liqpay",
            ))
            .await
            .unwrap();
        let reconciler = PaymentOrderReconciler::new(store);

        let owner = Principal::new(UserId(1), "owner@example.com");
        let found = reconciler.order_for_user(&order.order_id, &owner).await.unwrap();
        assert_eq!(found.order_id, order.order_id);
    }
}

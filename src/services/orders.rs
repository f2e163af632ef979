use chrono::{NaiveDate, NaiveTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::CanteenStore,
    error::{AppError, LockReason, WindowStateError},
    models::{
        admin_state::DailyAdminState,
        order::{clamp_quantity, NewOrder, Order},
    },
    services::{
        metrics,
        window::{self, CutoffPolicy},
    },
};

pub struct OrderService;

impl OrderService {
    /// Places the caller's special-item order for `date`.
    ///
    /// The policy check reads current state; the insert then re-checks the
    /// window and the (user, date) key atomically, so a lost race surfaces
    /// as `AlreadyOrdered` or `WindowClosed`, never as a second row.
    pub async fn place<S: CanteenStore>(
        store: &S,
        policy: CutoffPolicy,
        user_id: Uuid,
        date: NaiveDate,
        now: NaiveTime,
        requested_quantity: i64,
    ) -> Result<Order, AppError> {
        let result = Self::try_place(store, policy, user_id, date, now, requested_quantity).await;
        if let Err(AppError::Window(e)) = &result {
            metrics::record_rejection(e);
        }
        result
    }

    async fn try_place<S: CanteenStore>(
        store: &S,
        policy: CutoffPolicy,
        user_id: Uuid,
        date: NaiveDate,
        now: NaiveTime,
        requested_quantity: i64,
    ) -> Result<Order, AppError> {
        let state = store
            .admin_state(date)
            .await?
            .unwrap_or_else(|| DailyAdminState::fresh(date));
        let existing = store.order_for(user_id, date).await?;
        window::check_place(&state, existing.as_ref(), policy.is_after_cutoff(now))?;

        let profile = store
            .profile(user_id)
            .await?
            .filter(|p| p.is_complete())
            .ok_or(WindowStateError::ProfileMissing)?;

        let new = NewOrder {
            user_id,
            date,
            quantity: clamp_quantity(requested_quantity),
            user_name: profile.name,
            user_phone: profile.phone,
        };

        match store.insert_order(&new).await? {
            Some(order) => {
                metrics::ORDERS_PLACED.inc();
                info!(
                    "Order placed: user={} date={} quantity={}",
                    user_id, date, order.quantity
                );
                Ok(order)
            }
            None => {
                if store.order_for(user_id, date).await?.is_some() {
                    Err(WindowStateError::AlreadyOrdered.into())
                } else {
                    Err(WindowStateError::WindowClosed.into())
                }
            }
        }
    }

    /// Cancels the caller's order for `date`, returning the removed order.
    pub async fn cancel<S: CanteenStore>(
        store: &S,
        policy: CutoffPolicy,
        user_id: Uuid,
        date: NaiveDate,
        now: NaiveTime,
    ) -> Result<Order, AppError> {
        let result = Self::try_cancel(store, policy, user_id, date, now).await;
        if let Err(AppError::Window(e)) = &result {
            metrics::record_rejection(e);
        }
        result
    }

    async fn try_cancel<S: CanteenStore>(
        store: &S,
        policy: CutoffPolicy,
        user_id: Uuid,
        date: NaiveDate,
        now: NaiveTime,
    ) -> Result<Order, AppError> {
        let existing = store.order_for(user_id, date).await?;
        let window = store
            .admin_state(date)
            .await?
            .map(|s| s.special_window)
            .unwrap_or_default();
        window::check_cancel(window, existing.as_ref(), policy.is_after_cutoff(now))?;

        if store.delete_order(user_id, date).await? {
            metrics::ORDERS_CANCELLED.inc();
            info!("Order cancelled: user={} date={}", user_id, date);
            // check_cancel guarantees `existing` is Some here
            existing.ok_or(WindowStateError::NothingToCancel.into())
        } else if store.order_for(user_id, date).await?.is_some() {
            // the admin closed the window between our check and the delete
            Err(WindowStateError::Locked(LockReason::WindowClosed).into())
        } else {
            Err(WindowStateError::NothingToCancel.into())
        }
    }

    /// Admin-only completion flag. Not gated by the window; setting the same value twice is a no-op.
    pub async fn set_completed<S: CanteenStore>(
        store: &S,
        order_id: Uuid,
        completed: bool,
    ) -> Result<Order, AppError> {
        let order = store
            .set_completed(order_id, completed)
            .await?
            .ok_or(AppError::NotFound)?;
        info!("Order {} marked completed={}", order_id, completed);
        Ok(order)
    }
}

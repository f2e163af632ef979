use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::CanteenStore,
    models::{
        admin_state::{AdminStateView, DailyAdminState},
        order::{NumberedOrder, Order},
    },
    services::window::{self, CutoffPolicy},
};

/// What a regular user sees for today.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub state: AdminStateView,
    pub cutoff: String,
    /// Server-side clock reading; clients use it only to pick a message.
    pub after_cutoff: bool,
    pub can_order: bool,
    pub can_cancel: bool,
    pub my_order: Option<Order>,
    pub menu_images: HashMap<String, String>,
    pub special_day: bool,
    pub extra_plates_available: i32,
}

/// The admin's view of today: state plus every order in arrival order.
#[derive(Debug, Clone, Serialize)]
pub struct AdminView {
    #[serde(flatten)]
    pub state: AdminStateView,
    pub orders: Vec<NumberedOrder>,
    pub total_quantity: i64,
    pub completed_count: usize,
    pub pending_count: usize,
    pub catalog: Vec<String>,
    pub menu_images: HashMap<String, String>,
    pub cutoff: String,
}

pub struct ConsoleService;

impl ConsoleService {
    /// Does not create the day's row; an unconfigured day reads as closed.
    pub async fn user_view<S: CanteenStore>(
        store: &S,
        policy: CutoffPolicy,
        user_id: Uuid,
        date: NaiveDate,
        now: NaiveTime,
    ) -> anyhow::Result<UserView> {
        let mut state = store
            .admin_state(date)
            .await?
            .unwrap_or_else(|| DailyAdminState::fresh(date));
        if !state.canteen_open {
            state.menu_items.clear();
        }
        let my_order = store.order_for(user_id, date).await?;
        let settings = store.settings().await?;
        let after_cutoff = policy.is_after_cutoff(now);

        Ok(UserView {
            can_order: window::check_place(&state, my_order.as_ref(), after_cutoff).is_ok(),
            can_cancel: window::check_cancel(state.special_window, my_order.as_ref(), after_cutoff)
                .is_ok(),
            state: AdminStateView::from(&state),
            cutoff: format_time(policy.cutoff()),
            after_cutoff,
            my_order,
            menu_images: settings.menu_images,
            special_day: settings.special_day,
            extra_plates_available: settings.extra_plates_available,
        })
    }

    pub async fn admin_view<S: CanteenStore>(
        store: &S,
        policy: CutoffPolicy,
        date: NaiveDate,
    ) -> anyhow::Result<AdminView> {
        let state = store.ensure_admin_state(date).await?;
        let orders = store.orders_for_date(date).await?;
        let settings = store.settings().await?;

        let total_quantity = orders.iter().map(|o| o.quantity as i64).sum();
        let completed_count = orders.iter().filter(|o| o.completed).count();

        Ok(AdminView {
            state: AdminStateView::from(&state),
            pending_count: orders.len() - completed_count,
            completed_count,
            total_quantity,
            orders: number_orders(orders),
            catalog: settings.catalog(),
            menu_images: settings.menu_images,
            cutoff: format_time(policy.cutoff()),
        })
    }
}

/// Serial numbers follow the store's oldest-first order, 1-based.
fn number_orders(orders: Vec<Order>) -> Vec<NumberedOrder> {
    orders
        .into_iter()
        .enumerate()
        .map(|(i, order)| NumberedOrder { serial: i + 1, order })
        .collect()
}

fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

//! In-process store used by the unit tests. Mirrors the guarded writes of the
//! Postgres store, and yields between calls so concurrent callers interleave.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::store::CanteenStore;
use crate::models::{
    admin_state::{DailyAdminState, WindowState},
    order::{NewOrder, Order, SPECIAL_ITEM},
    settings::Settings,
    user::UserProfile,
};

#[derive(Default)]
struct Inner {
    states: HashMap<NaiveDate, DailyAdminState>,
    orders: Vec<Order>,
    profiles: HashMap<Uuid, UserProfile>,
    settings: Settings,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, profile: UserProfile) {
        self.inner.lock().unwrap().profiles.insert(profile.id, profile);
    }

    pub fn put_state(&self, state: DailyAdminState) {
        self.inner.lock().unwrap().states.insert(state.date, state);
    }

    pub fn put_settings(&self, settings: Settings) {
        self.inner.lock().unwrap().settings = settings;
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }
}

impl CanteenStore for MemoryStore {
    async fn admin_state(&self, date: NaiveDate) -> anyhow::Result<Option<DailyAdminState>> {
        tokio::task::yield_now().await;
        Ok(self.inner.lock().unwrap().states.get(&date).cloned())
    }

    async fn ensure_admin_state(&self, date: NaiveDate) -> anyhow::Result<DailyAdminState> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .states
            .entry(date)
            .or_insert_with(|| DailyAdminState::fresh(date))
            .clone())
    }

    async fn save_admin_state(&self, state: &DailyAdminState) -> anyhow::Result<DailyAdminState> {
        tokio::task::yield_now().await;
        let mut saved = state.clone();
        saved.updated_at = Some(Utc::now());
        self.inner.lock().unwrap().states.insert(saved.date, saved.clone());
        Ok(saved)
    }

    async fn settings(&self) -> anyhow::Result<Settings> {
        Ok(self.inner.lock().unwrap().settings.clone())
    }

    async fn profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        tokio::task::yield_now().await;
        Ok(self.inner.lock().unwrap().profiles.get(&user_id).cloned())
    }

    async fn order_for(&self, user_id: Uuid, date: NaiveDate) -> anyhow::Result<Option<Order>> {
        tokio::task::yield_now().await;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .iter()
            .find(|o| o.user_id == user_id && o.date == date)
            .cloned())
    }

    async fn orders_for_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Order>> {
        tokio::task::yield_now().await;
        let inner = self.inner.lock().unwrap();
        let mut orders: Vec<Order> = inner.orders.iter().filter(|o| o.date == date).cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn insert_order(&self, new: &NewOrder) -> anyhow::Result<Option<Order>> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock().unwrap();

        let takes_orders = inner
            .states
            .get(&new.date)
            .map(|s| s.canteen_open && s.special_window.accepts_orders())
            .unwrap_or(false);
        let duplicate = inner
            .orders
            .iter()
            .any(|o| o.user_id == new.user_id && o.date == new.date);
        if !takes_orders || duplicate {
            return Ok(None);
        }

        let order = Order {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            date: new.date,
            menu: SPECIAL_ITEM.to_string(),
            quantity: new.quantity,
            status: "pending".to_string(),
            completed: false,
            user_name: new.user_name.clone(),
            user_phone: new.user_phone.clone(),
            created_at: Utc::now(),
        };
        inner.orders.push(order.clone());
        Ok(Some(order))
    }

    async fn delete_order(&self, user_id: Uuid, date: NaiveDate) -> anyhow::Result<bool> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock().unwrap();

        let closed = inner
            .states
            .get(&date)
            .map(|s| s.special_window == WindowState::Closed)
            .unwrap_or(false);
        if closed {
            return Ok(false);
        }

        let before = inner.orders.len();
        inner.orders.retain(|o| !(o.user_id == user_id && o.date == date));
        Ok(inner.orders.len() < before)
    }

    async fn set_completed(&self, order_id: Uuid, completed: bool) -> anyhow::Result<Option<Order>> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.orders.iter_mut().find(|o| o.id == order_id).map(|o| {
            o.completed = completed;
            o.clone()
        }))
    }
}

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    admin_state::DailyAdminState,
    order::{NewOrder, Order},
    settings::Settings,
    user::UserProfile,
};

/// Row operations the order window and consoles depend on.
///
/// Each method is a single round trip. The two guarded writes re-check the
/// window inside the same statement so a concurrent admin change cannot slip
/// between the policy check and the write.
#[allow(async_fn_in_trait)]
pub trait CanteenStore {
    async fn admin_state(&self, date: NaiveDate) -> anyhow::Result<Option<DailyAdminState>>;

    /// Creates the all-false row for `date` unless it exists, then returns the stored row.
    async fn ensure_admin_state(&self, date: NaiveDate) -> anyhow::Result<DailyAdminState>;

    /// Whole-row upsert keyed by date. Last writer wins.
    async fn save_admin_state(&self, state: &DailyAdminState) -> anyhow::Result<DailyAdminState>;

    async fn settings(&self) -> anyhow::Result<Settings>;

    async fn profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>>;

    async fn order_for(&self, user_id: Uuid, date: NaiveDate) -> anyhow::Result<Option<Order>>;

    /// All orders for the day, oldest first.
    async fn orders_for_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Order>>;

    /// Returns `None` if (user, date) already has an order or the window no longer takes orders.
    async fn insert_order(&self, new: &NewOrder) -> anyhow::Result<Option<Order>>;

    /// Returns false if there was nothing to delete or the window is closed.
    async fn delete_order(&self, user_id: Uuid, date: NaiveDate) -> anyhow::Result<bool>;

    async fn set_completed(&self, order_id: Uuid, completed: bool) -> anyhow::Result<Option<Order>>;
}

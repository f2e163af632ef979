use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The one item that can be pre-ordered.
pub const SPECIAL_ITEM: &str = "Biryani";

pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 3;

/// Quantities outside [1, 3] are clamped, never rejected.
pub fn clamp_quantity(requested: i64) -> i32 {
    requested.clamp(MIN_QUANTITY as i64, MAX_QUANTITY as i64) as i32
}

/// One user's special-item order for one day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub menu: String,
    pub quantity: i32,
    pub status: String,
    pub completed: bool,
    pub user_name: String,
    pub user_phone: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; name and phone are copied from the profile so the admin list needs no join.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub quantity: i32,
    pub user_name: String,
    pub user_phone: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    MIN_QUANTITY as i64
}

#[derive(Debug, Deserialize)]
pub struct SetCompletedRequest {
    pub completed: bool,
}

/// Admin list row: the order plus its 1-based position in arrival order.
#[derive(Debug, Clone, Serialize)]
pub struct NumberedOrder {
    pub serial: usize,
    #[serde(flatten)]
    pub order: Order,
}

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::store::CanteenStore;
use crate::models::{
    admin_state::DailyAdminState,
    order::{NewOrder, Order, SPECIAL_ITEM},
    settings::{Settings, UpdateSettingsRequest},
    user::UserProfile,
};

const ORDER_COLUMNS: &str =
    "id, user_id, date, menu, quantity, status, completed, user_name, user_phone, created_at";

/// Window state is stored as TEXT and parsed on the way out.
#[derive(FromRow)]
struct AdminStateRow {
    date: NaiveDate,
    canteen_open: bool,
    menu_items: Vec<String>,
    special_window: String,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<AdminStateRow> for DailyAdminState {
    type Error = anyhow::Error;

    fn try_from(row: AdminStateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            date: row.date,
            canteen_open: row.canteen_open,
            menu_items: row.menu_items,
            special_window: row.special_window.parse()?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SettingsRow {
    menu_images: Json<HashMap<String, String>>,
    menu_options: Vec<String>,
    special_day: bool,
    extra_plates_available: i32,
    updated_at: Option<DateTime<Utc>>,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        Self {
            menu_images: row.menu_images.0,
            menu_options: row.menu_options,
            special_day: row.special_day,
            extra_plates_available: row.extra_plates_available,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Partial update of the settings row; absent fields keep their value.
    pub async fn update_settings(&self, req: &UpdateSettingsRequest) -> anyhow::Result<Settings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"UPDATE settings SET
                   menu_images = COALESCE($1, menu_images),
                   menu_options = COALESCE($2, menu_options),
                   special_day = COALESCE($3, special_day),
                   extra_plates_available = COALESCE($4, extra_plates_available),
                   updated_at = NOW()
               WHERE id = 1
               RETURNING menu_images, menu_options, special_day, extra_plates_available, updated_at"#,
        )
        .bind(req.menu_images.clone().map(Json))
        .bind(req.menu_options.clone())
        .bind(req.special_day)
        .bind(req.extra_plates_available)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}

impl CanteenStore for PgStore {
    async fn admin_state(&self, date: NaiveDate) -> anyhow::Result<Option<DailyAdminState>> {
        sqlx::query_as::<_, AdminStateRow>(
            "SELECT date, canteen_open, menu_items, special_window, updated_at
             FROM admin_state WHERE date = $1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .map(DailyAdminState::try_from)
        .transpose()
    }

    async fn ensure_admin_state(&self, date: NaiveDate) -> anyhow::Result<DailyAdminState> {
        sqlx::query("INSERT INTO admin_state (date) VALUES ($1) ON CONFLICT (date) DO NOTHING")
            .bind(date)
            .execute(&self.pool)
            .await?;

        self.admin_state(date)
            .await?
            .ok_or_else(|| anyhow::anyhow!("admin_state row for {date} vanished after insert"))
    }

    async fn save_admin_state(&self, state: &DailyAdminState) -> anyhow::Result<DailyAdminState> {
        let row = sqlx::query_as::<_, AdminStateRow>(
            r#"INSERT INTO admin_state (date, canteen_open, menu_items, special_window)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (date) DO UPDATE SET
                   canteen_open = EXCLUDED.canteen_open,
                   menu_items = EXCLUDED.menu_items,
                   special_window = EXCLUDED.special_window,
                   updated_at = NOW()
               RETURNING date, canteen_open, menu_items, special_window, updated_at"#,
        )
        .bind(state.date)
        .bind(state.canteen_open)
        .bind(&state.menu_items)
        .bind(state.special_window.to_string())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn settings(&self) -> anyhow::Result<Settings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT menu_images, menu_options, special_day, extra_plates_available, updated_at
             FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Settings::from).unwrap_or_default())
    }

    async fn profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT id, name, phone FROM users WHERE id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn order_for(&self, user_id: Uuid, date: NaiveDate) -> anyhow::Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND date = $2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn orders_for_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE date = $1 ORDER BY created_at, id"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn insert_order(&self, new: &NewOrder) -> anyhow::Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"INSERT INTO orders (user_id, date, menu, quantity, status, user_name, user_phone)
               SELECT $1, $2, $3, $4, 'pending', $5, $6
               WHERE EXISTS (
                   SELECT 1 FROM admin_state
                   WHERE date = $2 AND canteen_open AND special_window IN ('active', 'ending')
               )
               ON CONFLICT (user_id, date) DO NOTHING
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(new.user_id)
        .bind(new.date)
        .bind(SPECIAL_ITEM)
        .bind(new.quantity)
        .bind(&new.user_name)
        .bind(&new.user_phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn delete_order(&self, user_id: Uuid, date: NaiveDate) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"DELETE FROM orders
               WHERE user_id = $1 AND date = $2
                 AND NOT EXISTS (
                     SELECT 1 FROM admin_state WHERE date = $2 AND special_window = 'closed'
                 )"#,
        )
        .bind(user_id)
        .bind(date)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_completed(&self, order_id: Uuid, completed: bool) -> anyhow::Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET completed = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(completed)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }
}

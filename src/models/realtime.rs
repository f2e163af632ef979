use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published on the change channel after every write that affects a view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    AdminState { date: NaiveDate },
    Order { date: NaiveDate, user_id: Uuid },
    Settings,
}

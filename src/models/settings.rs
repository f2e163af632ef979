use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog used when no custom menu options have been saved.
pub const DEFAULT_CATALOG: [&str; 8] = [
    "Roti", "Raita", "Dal", "Sambar", "Potato", "Chana", "Egg", "Rice",
];

/// Canteen-wide settings (single row).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub menu_images: HashMap<String, String>,
    pub menu_options: Vec<String>,
    pub special_day: bool,
    pub extra_plates_available: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Settings {
    /// The fixed catalog today's menu is picked from.
    pub fn catalog(&self) -> Vec<String> {
        if self.menu_options.is_empty() {
            DEFAULT_CATALOG.iter().map(|s| s.to_string()).collect()
        } else {
            self.menu_options.clone()
        }
    }
}

/// Body for PUT /admin/settings. Missing fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub menu_images: Option<HashMap<String, String>>,
    pub menu_options: Option<Vec<String>>,
    pub special_day: Option<bool>,
    pub extra_plates_available: Option<i32>,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Special-item order window for one day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    #[default]
    Inactive,
    Active,
    Ending,
    Closed,
}

impl WindowState {
    /// Builds the state from the three flags older clients send.
    /// `closed` wins over `ending`; neither means anything without `active`.
    pub fn from_flags(active: bool, ending: bool, closed: bool) -> Self {
        match (active, ending, closed) {
            (false, _, _) => WindowState::Inactive,
            (true, _, true) => WindowState::Closed,
            (true, true, false) => WindowState::Ending,
            (true, false, false) => WindowState::Active,
        }
    }

    pub fn is_active(self) -> bool {
        self != WindowState::Inactive
    }

    pub fn is_ending(self) -> bool {
        self == WindowState::Ending
    }

    pub fn is_closed(self) -> bool {
        self == WindowState::Closed
    }

    /// New orders are only taken while the window is active or ending.
    pub fn accepts_orders(self) -> bool {
        matches!(self, WindowState::Active | WindowState::Ending)
    }
}

impl std::fmt::Display for WindowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WindowState::Inactive => "inactive",
            WindowState::Active => "active",
            WindowState::Ending => "ending",
            WindowState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WindowState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(WindowState::Inactive),
            "active" => Ok(WindowState::Active),
            "ending" => Ok(WindowState::Ending),
            "closed" => Ok(WindowState::Closed),
            _ => Err(anyhow::anyhow!("Unknown window state: {s}")),
        }
    }
}

/// The per-day record of canteen, menu and window configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAdminState {
    pub date: NaiveDate,
    pub canteen_open: bool,
    pub menu_items: Vec<String>,
    pub special_window: WindowState,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailyAdminState {
    /// The row created lazily for a date nobody has configured yet.
    pub fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            canteen_open: false,
            menu_items: Vec::new(),
            special_window: WindowState::Inactive,
            updated_at: None,
        }
    }
}

/// API shape of the daily state. The three legacy flags are derived from the window.
#[derive(Debug, Clone, Serialize)]
pub struct AdminStateView {
    pub date: NaiveDate,
    pub canteen_open: bool,
    pub menu_items: Vec<String>,
    pub special_window: WindowState,
    pub special_active: bool,
    pub special_ending: bool,
    pub special_closed_to_new: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&DailyAdminState> for AdminStateView {
    fn from(s: &DailyAdminState) -> Self {
        Self {
            date: s.date,
            canteen_open: s.canteen_open,
            menu_items: s.menu_items.clone(),
            special_window: s.special_window,
            special_active: s.special_window.is_active(),
            special_ending: s.special_window.is_ending(),
            special_closed_to_new: s.special_window.is_closed(),
            updated_at: s.updated_at,
        }
    }
}

/// Body for PUT /admin/state: the admin's whole draft for today.
///
/// `special_window` takes precedence; otherwise the legacy flags are folded into it.
#[derive(Debug, Deserialize)]
pub struct SaveAdminStateRequest {
    pub canteen_open: bool,
    #[serde(default)]
    pub menu_items: Vec<String>,
    pub special_window: Option<WindowState>,
    #[serde(default)]
    pub special_active: bool,
    #[serde(default)]
    pub special_ending: bool,
    #[serde(default)]
    pub special_closed_to_new: bool,
}

impl SaveAdminStateRequest {
    pub fn window(&self) -> WindowState {
        self.special_window.unwrap_or_else(|| {
            WindowState::from_flags(
                self.special_active,
                self.special_ending,
                self.special_closed_to_new,
            )
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct WindowTransitionRequest {
    pub state: WindowState,
}

#[derive(Debug, Deserialize)]
pub struct MenuToggleRequest {
    pub item: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_fold_into_window() {
        assert_eq!(WindowState::from_flags(false, true, true), WindowState::Inactive);
        assert_eq!(WindowState::from_flags(true, false, false), WindowState::Active);
        assert_eq!(WindowState::from_flags(true, true, false), WindowState::Ending);
        assert_eq!(WindowState::from_flags(true, true, true), WindowState::Closed);
    }

    #[test]
    fn view_never_reports_ending_without_active() {
        for state in [
            WindowState::Inactive,
            WindowState::Active,
            WindowState::Ending,
            WindowState::Closed,
        ] {
            let mut s = DailyAdminState::fresh(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
            s.special_window = state;
            let view = AdminStateView::from(&s);
            assert!(!view.special_ending || view.special_active);
            assert!(!view.special_closed_to_new || view.special_active);
        }
    }

    #[test]
    fn window_round_trips_through_text() {
        for state in ["inactive", "active", "ending", "closed"] {
            let parsed: WindowState = state.parse().unwrap();
            assert_eq!(parsed.to_string(), state);
        }
        assert!("open".parse::<WindowState>().is_err());
    }
}

//! Special-item order window: legal transitions, admin draft toggles and the
//! place/cancel rules. Everything here is pure; callers pass the clock in.

use chrono::{NaiveDate, NaiveTime};

use crate::{
    error::{AppError, LockReason, WindowStateError},
    models::{
        admin_state::{DailyAdminState, WindowState},
        order::Order,
    },
};

/// Fixed daily time after which orders can be neither placed nor cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffPolicy {
    cutoff: NaiveTime,
}

impl CutoffPolicy {
    pub fn new(cutoff: NaiveTime) -> Self {
        Self { cutoff }
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    /// The cutoff minute itself is already too late.
    pub fn is_after_cutoff(&self, now: NaiveTime) -> bool {
        now >= self.cutoff
    }
}

/// Checks a requested window move. Moving to the current state is a no-op.
pub fn transition(from: WindowState, to: WindowState) -> Result<WindowState, WindowStateError> {
    use WindowState::*;

    let legal = from == to
        || matches!(
            (from, to),
            (_, Inactive)
                | (Inactive, Active)
                | (Active, Ending)
                | (Ending, Active)
                | (Active, Closed)
                | (Ending, Closed)
        );

    if legal {
        Ok(to)
    } else {
        Err(WindowStateError::InvalidTransition { from, to })
    }
}

/// The admin's editable copy of one day's state. Nothing is persisted until it is saved.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminDraft {
    pub canteen_open: bool,
    pub menu_items: Vec<String>,
    pub window: WindowState,
}

impl From<&DailyAdminState> for AdminDraft {
    fn from(s: &DailyAdminState) -> Self {
        Self {
            canteen_open: s.canteen_open,
            menu_items: s.menu_items.clone(),
            window: s.special_window,
        }
    }
}

impl AdminDraft {
    /// Closing the canteen also resets the special window and clears the menu.
    pub fn toggle_canteen(&mut self) {
        self.canteen_open = !self.canteen_open;
        if !self.canteen_open {
            self.reset();
        }
    }

    /// Opens an inactive window; any other state is switched off (which drops "ending").
    /// Switching off this way keeps today's menu, unlike `set_window(Inactive)`.
    pub fn toggle_special_active(&mut self) {
        self.window = match self.window {
            WindowState::Inactive => WindowState::Active,
            _ => WindowState::Inactive,
        };
    }

    /// Flips "almost over". Ignored unless the window is active or ending.
    pub fn toggle_special_ending(&mut self) {
        self.window = match self.window {
            WindowState::Active => WindowState::Ending,
            WindowState::Ending => WindowState::Active,
            other => other,
        };
    }

    pub fn close_to_new_orders(&mut self) -> Result<(), WindowStateError> {
        self.set_window(WindowState::Closed)
    }

    /// Explicit transition. Going back to inactive is a full reset that also clears the menu.
    pub fn set_window(&mut self, to: WindowState) -> Result<(), WindowStateError> {
        let next = transition(self.window, to)?;
        if next == WindowState::Inactive && self.window != WindowState::Inactive {
            self.menu_items.clear();
        }
        self.window = next;
        Ok(())
    }

    /// Adds the item if absent, removes it if present.
    pub fn toggle_menu_item(&mut self, item: &str, catalog: &[String]) -> Result<(), AppError> {
        let item = item.trim();
        if let Some(pos) = self.menu_items.iter().position(|i| i == item) {
            self.menu_items.remove(pos);
            return Ok(());
        }
        ensure_in_catalog(item, catalog)?;
        self.menu_items.push(item.to_string());
        Ok(())
    }

    /// Replaces the menu wholesale, keeping the first occurrence of duplicates.
    pub fn set_menu(&mut self, items: &[String], catalog: &[String]) -> Result<(), AppError> {
        let mut menu: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let item = item.trim();
            ensure_in_catalog(item, catalog)?;
            if !menu.iter().any(|m| m == item) {
                menu.push(item.to_string());
            }
        }
        self.menu_items = menu;
        Ok(())
    }

    /// A closed canteen carries no window and no menu.
    pub fn normalized(mut self) -> Self {
        if !self.canteen_open {
            self.reset();
        }
        self
    }

    pub fn into_state(self, date: NaiveDate) -> DailyAdminState {
        let draft = self.normalized();
        DailyAdminState {
            date,
            canteen_open: draft.canteen_open,
            menu_items: draft.menu_items,
            special_window: draft.window,
            updated_at: None,
        }
    }

    fn reset(&mut self) {
        self.window = WindowState::Inactive;
        self.menu_items.clear();
    }
}

fn ensure_in_catalog(item: &str, catalog: &[String]) -> Result<(), AppError> {
    if catalog.iter().any(|c| c == item) {
        Ok(())
    } else {
        Err(AppError::validation(format!("'{item}' is not on the menu catalog")))
    }
}

/// Whether a new order may be placed. Checked in order: window, existing order, cutoff.
pub fn check_place(
    state: &DailyAdminState,
    existing: Option<&Order>,
    after_cutoff: bool,
) -> Result<(), WindowStateError> {
    if !state.canteen_open || !state.special_window.accepts_orders() {
        return Err(WindowStateError::WindowClosed);
    }
    if existing.is_some() {
        return Err(WindowStateError::AlreadyOrdered);
    }
    if after_cutoff {
        return Err(WindowStateError::PastCutoff);
    }
    Ok(())
}

/// Whether the caller's order may be cancelled. A closed window locks regardless of the clock.
pub fn check_cancel(
    window: WindowState,
    existing: Option<&Order>,
    after_cutoff: bool,
) -> Result<(), WindowStateError> {
    if existing.is_none() {
        return Err(WindowStateError::NothingToCancel);
    }
    if window.is_closed() {
        return Err(WindowStateError::Locked(LockReason::WindowClosed));
    }
    if after_cutoff {
        return Err(WindowStateError::Locked(LockReason::Cutoff));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    const ALL: [WindowState; 4] = [
        WindowState::Inactive,
        WindowState::Active,
        WindowState::Ending,
        WindowState::Closed,
    ];

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
    }

    fn catalog() -> Vec<String> {
        vec!["Roti".into(), "Dal".into(), "Rice".into()]
    }

    fn open_with(window: WindowState) -> DailyAdminState {
        DailyAdminState {
            canteen_open: true,
            special_window: window,
            ..DailyAdminState::fresh(day())
        }
    }

    fn some_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            date: day(),
            menu: "Biryani".into(),
            quantity: 1,
            status: "pending".into(),
            completed: false,
            user_name: "Ravi".into(),
            user_phone: "900".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cutoff_is_inclusive() {
        let policy = CutoffPolicy::new(NaiveTime::from_hms_opt(13, 44, 0).unwrap());
        assert!(!policy.is_after_cutoff(NaiveTime::from_hms_opt(13, 43, 59).unwrap()));
        assert!(policy.is_after_cutoff(NaiveTime::from_hms_opt(13, 44, 0).unwrap()));
        assert!(policy.is_after_cutoff(NaiveTime::from_hms_opt(23, 0, 0).unwrap()));
    }

    #[test]
    fn every_state_can_be_reset() {
        for from in ALL {
            assert_eq!(transition(from, WindowState::Inactive), Ok(WindowState::Inactive));
        }
    }

    #[test]
    fn ending_may_be_skipped() {
        assert_eq!(
            transition(WindowState::Active, WindowState::Closed),
            Ok(WindowState::Closed)
        );
    }

    #[test]
    fn closed_cannot_reopen_without_reset() {
        assert!(matches!(
            transition(WindowState::Closed, WindowState::Active),
            Err(WindowStateError::InvalidTransition { .. })
        ));
        assert!(transition(WindowState::Inactive, WindowState::Ending).is_err());
        assert!(transition(WindowState::Inactive, WindowState::Closed).is_err());
    }

    #[test]
    fn closing_canteen_resets_window_and_menu() {
        let mut draft = AdminDraft {
            canteen_open: true,
            menu_items: vec!["Dal".into()],
            window: WindowState::Ending,
        };
        draft.toggle_canteen();
        assert!(!draft.canteen_open);
        assert_eq!(draft.window, WindowState::Inactive);
        assert!(draft.menu_items.is_empty());

        let view = crate::models::admin_state::AdminStateView::from(&draft.into_state(day()));
        assert!(!view.special_active);
        assert!(!view.special_ending);
    }

    #[test]
    fn opening_canteen_leaves_window_alone() {
        let mut draft = AdminDraft {
            canteen_open: false,
            menu_items: vec![],
            window: WindowState::Inactive,
        };
        draft.toggle_canteen();
        assert!(draft.canteen_open);
        assert_eq!(draft.window, WindowState::Inactive);
    }

    #[test]
    fn special_toggle_off_drops_ending_but_keeps_menu() {
        let mut draft = AdminDraft {
            canteen_open: true,
            menu_items: vec!["Roti".into()],
            window: WindowState::Ending,
        };
        draft.toggle_special_active();
        assert_eq!(draft.window, WindowState::Inactive);
        assert_eq!(draft.menu_items, vec!["Roti".to_string()]);
        draft.toggle_special_active();
        assert_eq!(draft.window, WindowState::Active);
    }

    #[test]
    fn ending_toggle_needs_active_window() {
        let mut draft = AdminDraft {
            canteen_open: true,
            menu_items: vec![],
            window: WindowState::Inactive,
        };
        draft.toggle_special_ending();
        assert_eq!(draft.window, WindowState::Inactive);

        draft.window = WindowState::Active;
        draft.toggle_special_ending();
        assert_eq!(draft.window, WindowState::Ending);
        draft.toggle_special_ending();
        assert_eq!(draft.window, WindowState::Active);

        draft.window = WindowState::Closed;
        draft.toggle_special_ending();
        assert_eq!(draft.window, WindowState::Closed);
    }

    #[test]
    fn explicit_reset_clears_menu() {
        let mut draft = AdminDraft {
            canteen_open: true,
            menu_items: vec!["Rice".into()],
            window: WindowState::Closed,
        };
        draft.set_window(WindowState::Inactive).unwrap();
        assert!(draft.menu_items.is_empty());
    }

    #[test]
    fn close_to_new_orders_requires_open_window() {
        let mut draft = AdminDraft {
            canteen_open: true,
            menu_items: vec![],
            window: WindowState::Inactive,
        };
        assert!(draft.close_to_new_orders().is_err());
        draft.window = WindowState::Ending;
        draft.close_to_new_orders().unwrap();
        assert_eq!(draft.window, WindowState::Closed);
    }

    #[test]
    fn menu_toggle_adds_then_removes() {
        let mut draft = AdminDraft::from(&open_with(WindowState::Inactive));
        draft.toggle_menu_item("Dal", &catalog()).unwrap();
        draft.toggle_menu_item("Roti", &catalog()).unwrap();
        assert_eq!(draft.menu_items, vec!["Dal".to_string(), "Roti".to_string()]);
        draft.toggle_menu_item("Dal", &catalog()).unwrap();
        assert_eq!(draft.menu_items, vec!["Roti".to_string()]);
    }

    #[test]
    fn menu_rejects_items_outside_catalog() {
        let mut draft = AdminDraft::from(&open_with(WindowState::Inactive));
        assert!(matches!(
            draft.toggle_menu_item("Pizza", &catalog()),
            Err(AppError::Validation(_))
        ));
        assert!(draft.set_menu(&["Rice".into(), "Pizza".into()], &catalog()).is_err());
        assert!(draft.menu_items.is_empty());
    }

    #[test]
    fn set_menu_drops_duplicates_in_order() {
        let mut draft = AdminDraft::from(&open_with(WindowState::Inactive));
        draft
            .set_menu(&["Rice".into(), "Dal".into(), "Rice".into()], &catalog())
            .unwrap();
        assert_eq!(draft.menu_items, vec!["Rice".to_string(), "Dal".to_string()]);
    }

    #[test]
    fn place_refused_unless_window_takes_orders() {
        for window in [WindowState::Inactive, WindowState::Closed] {
            assert_eq!(
                check_place(&open_with(window), None, false),
                Err(WindowStateError::WindowClosed)
            );
        }
        let mut closed_canteen = open_with(WindowState::Active);
        closed_canteen.canteen_open = false;
        assert_eq!(
            check_place(&closed_canteen, None, false),
            Err(WindowStateError::WindowClosed)
        );
    }

    #[test]
    fn ending_still_takes_orders_before_cutoff() {
        assert_eq!(check_place(&open_with(WindowState::Ending), None, false), Ok(()));
        assert_eq!(
            check_place(&open_with(WindowState::Ending), None, true),
            Err(WindowStateError::PastCutoff)
        );
    }

    #[test]
    fn closed_window_wins_over_cutoff_when_placing() {
        assert_eq!(
            check_place(&open_with(WindowState::Closed), None, true),
            Err(WindowStateError::WindowClosed)
        );
    }

    #[test]
    fn second_order_is_refused() {
        let existing = some_order();
        assert_eq!(
            check_place(&open_with(WindowState::Active), Some(&existing), false),
            Err(WindowStateError::AlreadyOrdered)
        );
    }

    #[test]
    fn cancel_rules() {
        let existing = some_order();
        assert_eq!(
            check_cancel(WindowState::Active, None, false),
            Err(WindowStateError::NothingToCancel)
        );
        assert_eq!(check_cancel(WindowState::Active, Some(&existing), false), Ok(()));
        assert_eq!(
            check_cancel(WindowState::Active, Some(&existing), true),
            Err(WindowStateError::Locked(LockReason::Cutoff))
        );
        for after_cutoff in [false, true] {
            assert_eq!(
                check_cancel(WindowState::Closed, Some(&existing), after_cutoff),
                Err(WindowStateError::Locked(LockReason::WindowClosed))
            );
        }
    }
}

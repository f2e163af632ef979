use chrono::NaiveDate;
use tracing::info;

use crate::{
    db::CanteenStore,
    error::AppError,
    models::admin_state::{DailyAdminState, SaveAdminStateRequest, WindowState},
    services::window::{self, AdminDraft},
};

pub struct AdminStateService;

impl AdminStateService {
    /// The day's row, created with everything off if nobody has touched the date yet.
    pub async fn get_or_create<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
    ) -> anyhow::Result<DailyAdminState> {
        store.ensure_admin_state(date).await
    }

    /// Commits a whole draft as one upsert. No concurrency token: the last save wins,
    /// but the window still has to move along a legal transition from the stored state.
    pub async fn save<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
        req: &SaveAdminStateRequest,
    ) -> Result<DailyAdminState, AppError> {
        let current = store.ensure_admin_state(date).await?;
        let catalog = store.settings().await?.catalog();
        let mut draft = AdminDraft {
            canteen_open: req.canteen_open,
            menu_items: Vec::new(),
            window: req.window(),
        };
        draft.set_menu(&req.menu_items, &catalog)?;

        let next = draft.into_state(date);
        window::transition(current.special_window, next.special_window)?;

        let saved = store.save_admin_state(&next).await?;
        info!(
            "Admin state saved: date={} canteen_open={} window={} menu={:?}",
            saved.date, saved.canteen_open, saved.special_window, saved.menu_items
        );
        Ok(saved)
    }

    pub async fn toggle_canteen<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
    ) -> Result<DailyAdminState, AppError> {
        Self::apply(store, date, |draft, _| {
            draft.toggle_canteen();
            Ok(())
        })
        .await
    }

    /// Idempotent close used by the end-of-day job. Orders are left in place.
    pub async fn close_canteen<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
    ) -> Result<DailyAdminState, AppError> {
        Self::apply(store, date, |draft, _| {
            if draft.canteen_open {
                draft.toggle_canteen();
            }
            Ok(())
        })
        .await
    }

    pub async fn toggle_special_active<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
    ) -> Result<DailyAdminState, AppError> {
        Self::apply(store, date, |draft, _| {
            draft.toggle_special_active();
            Ok(())
        })
        .await
    }

    pub async fn toggle_special_ending<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
    ) -> Result<DailyAdminState, AppError> {
        Self::apply(store, date, |draft, _| {
            draft.toggle_special_ending();
            Ok(())
        })
        .await
    }

    pub async fn close_to_new_orders<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
    ) -> Result<DailyAdminState, AppError> {
        Self::apply(store, date, |draft, _| Ok(draft.close_to_new_orders()?)).await
    }

    pub async fn set_window<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
        to: WindowState,
    ) -> Result<DailyAdminState, AppError> {
        Self::apply(store, date, |draft, _| Ok(draft.set_window(to)?)).await
    }

    pub async fn toggle_menu_item<S: CanteenStore>(
        store: &S,
        date: NaiveDate,
        item: &str,
    ) -> Result<DailyAdminState, AppError> {
        Self::apply(store, date, |draft, catalog| draft.toggle_menu_item(item, catalog)).await
    }

    /// Load, edit, save in one call for clients that do not keep a draft.
    async fn apply<S, F>(store: &S, date: NaiveDate, edit: F) -> Result<DailyAdminState, AppError>
    where
        S: CanteenStore,
        F: FnOnce(&mut AdminDraft, &[String]) -> Result<(), AppError>,
    {
        let current = store.ensure_admin_state(date).await?;
        let catalog = store.settings().await?.catalog();

        let mut draft = AdminDraft::from(&current);
        edit(&mut draft, &catalog)?;

        let next = draft.into_state(date);
        if next.canteen_open == current.canteen_open
            && next.menu_items == current.menu_items
            && next.special_window == current.special_window
        {
            return Ok(current);
        }

        let saved = store.save_admin_state(&next).await?;
        info!(
            "Admin state changed: date={} canteen_open={} window={} -> {}",
            date, saved.canteen_open, current.special_window, saved.special_window
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memory::MemoryStore, error::WindowStateError};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 5).unwrap()
    }

    fn open_request(window: WindowState) -> SaveAdminStateRequest {
        SaveAdminStateRequest {
            canteen_open: true,
            menu_items: vec!["Dal".into(), "Rice".into()],
            special_window: Some(window),
            special_active: false,
            special_ending: false,
            special_closed_to_new: false,
        }
    }

    #[tokio::test]
    async fn first_read_creates_closed_day() {
        let store = MemoryStore::new();
        let state = AdminStateService::get_or_create(&store, day()).await.unwrap();
        assert_eq!(state, DailyAdminState::fresh(day()));
        assert!(store.admin_state(day()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_persists_whole_draft() {
        let store = MemoryStore::new();
        AdminStateService::save(&store, day(), &open_request(WindowState::Active))
            .await
            .unwrap();
        let saved = AdminStateService::save(&store, day(), &open_request(WindowState::Ending))
            .await
            .unwrap();
        assert!(saved.canteen_open);
        assert_eq!(saved.special_window, WindowState::Ending);
        assert_eq!(saved.menu_items, vec!["Dal".to_string(), "Rice".to_string()]);
    }

    #[tokio::test]
    async fn save_normalises_closed_canteen() {
        let store = MemoryStore::new();
        let mut req = open_request(WindowState::Active);
        req.canteen_open = false;
        let saved = AdminStateService::save(&store, day(), &req).await.unwrap();
        assert_eq!(saved.special_window, WindowState::Inactive);
        assert!(saved.menu_items.is_empty());
    }

    #[tokio::test]
    async fn last_save_wins() {
        let store = MemoryStore::new();
        AdminStateService::save(&store, day(), &open_request(WindowState::Active))
            .await
            .unwrap();
        AdminStateService::save(&store, day(), &open_request(WindowState::Closed))
            .await
            .unwrap();
        let state = store.admin_state(day()).await.unwrap().unwrap();
        assert_eq!(state.special_window, WindowState::Closed);
    }

    #[tokio::test]
    async fn save_cannot_reopen_closed_window() {
        let store = MemoryStore::new();
        AdminStateService::save(&store, day(), &open_request(WindowState::Active))
            .await
            .unwrap();
        AdminStateService::save(&store, day(), &open_request(WindowState::Closed))
            .await
            .unwrap();

        let err = AdminStateService::save(&store, day(), &open_request(WindowState::Active))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Window(WindowStateError::InvalidTransition {
                from: WindowState::Closed,
                to: WindowState::Active,
            })
        ));
        let state = store.admin_state(day()).await.unwrap().unwrap();
        assert_eq!(state.special_window, WindowState::Closed);
    }

    #[tokio::test]
    async fn save_cannot_close_a_window_that_never_opened() {
        let store = MemoryStore::new();
        let err = AdminStateService::save(&store, day(), &open_request(WindowState::Closed))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Window(WindowStateError::InvalidTransition {
                from: WindowState::Inactive,
                to: WindowState::Closed,
            })
        ));
    }

    #[tokio::test]
    async fn save_may_always_reset_to_inactive() {
        let store = MemoryStore::new();
        AdminStateService::save(&store, day(), &open_request(WindowState::Active))
            .await
            .unwrap();
        AdminStateService::save(&store, day(), &open_request(WindowState::Closed))
            .await
            .unwrap();
        let saved = AdminStateService::save(&store, day(), &open_request(WindowState::Inactive))
            .await
            .unwrap();
        assert_eq!(saved.special_window, WindowState::Inactive);
    }

    #[tokio::test]
    async fn toggling_canteen_closed_resets_everything() {
        let store = MemoryStore::new();
        AdminStateService::save(&store, day(), &open_request(WindowState::Active))
            .await
            .unwrap();
        AdminStateService::save(&store, day(), &open_request(WindowState::Ending))
            .await
            .unwrap();

        let state = AdminStateService::toggle_canteen(&store, day()).await.unwrap();
        assert!(!state.canteen_open);
        assert_eq!(state.special_window, WindowState::Inactive);
        assert!(state.menu_items.is_empty());
    }

    #[tokio::test]
    async fn window_walks_through_its_states() {
        let store = MemoryStore::new();
        AdminStateService::toggle_canteen(&store, day()).await.unwrap();

        let s = AdminStateService::toggle_special_active(&store, day()).await.unwrap();
        assert_eq!(s.special_window, WindowState::Active);
        let s = AdminStateService::toggle_special_ending(&store, day()).await.unwrap();
        assert_eq!(s.special_window, WindowState::Ending);
        let s = AdminStateService::close_to_new_orders(&store, day()).await.unwrap();
        assert_eq!(s.special_window, WindowState::Closed);

        let err = AdminStateService::set_window(&store, day(), WindowState::Active)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Window(WindowStateError::InvalidTransition { .. })
        ));

        let s = AdminStateService::set_window(&store, day(), WindowState::Inactive)
            .await
            .unwrap();
        assert_eq!(s.special_window, WindowState::Inactive);
    }

    #[tokio::test]
    async fn menu_toggle_uses_catalog() {
        let store = MemoryStore::new();
        AdminStateService::toggle_canteen(&store, day()).await.unwrap();

        let s = AdminStateService::toggle_menu_item(&store, day(), "Egg").await.unwrap();
        assert_eq!(s.menu_items, vec!["Egg".to_string()]);

        let err = AdminStateService::toggle_menu_item(&store, day(), "Sushi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let s = AdminStateService::toggle_menu_item(&store, day(), "Egg").await.unwrap();
        assert!(s.menu_items.is_empty());
    }

    #[tokio::test]
    async fn close_canteen_is_idempotent() {
        let store = MemoryStore::new();
        AdminStateService::save(&store, day(), &open_request(WindowState::Active))
            .await
            .unwrap();

        let first = AdminStateService::close_canteen(&store, day()).await.unwrap();
        assert!(!first.canteen_open);
        assert_eq!(first.special_window, WindowState::Inactive);
        let second = AdminStateService::close_canteen(&store, day()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ending_toggle_on_inactive_window_changes_nothing() {
        let store = MemoryStore::new();
        let before = AdminStateService::get_or_create(&store, day()).await.unwrap();
        let after = AdminStateService::toggle_special_ending(&store, day()).await.unwrap();
        assert_eq!(before, after);
    }
}

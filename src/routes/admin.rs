use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::json::ApiJson,
    models::{
        admin_state::{AdminStateView, MenuToggleRequest, SaveAdminStateRequest, WindowTransitionRequest},
        auth::AdminUser,
        order::{Order, SetCompletedRequest},
        realtime::ChangeEvent,
    },
    routes::server_clock,
    services::{
        admin_state::AdminStateService,
        consoles::{AdminView, ConsoleService},
        orders::OrderService,
        realtime::RealtimeService,
    },
    AppState,
};

pub async fn get_today(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminView>, AppError> {
    let (date, _) = server_clock();
    let view = ConsoleService::admin_view(&state.store, state.policy, date).await?;
    Ok(Json(view))
}

/// PUT /admin/state: commit a full draft of today's state.
pub async fn save_state(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<SaveAdminStateRequest>,
) -> Result<Json<AdminStateView>, AppError> {
    let (date, _) = server_clock();
    let saved = AdminStateService::save(&state.store, date, &body).await?;
    tracing::info!("Admin {} saved state for {}", admin.user_id, date);
    announce(&state, date).await;
    Ok(Json(AdminStateView::from(&saved)))
}

pub async fn toggle_canteen(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminStateView>, AppError> {
    let (date, _) = server_clock();
    let saved = AdminStateService::toggle_canteen(&state.store, date).await?;
    announce(&state, date).await;
    Ok(Json(AdminStateView::from(&saved)))
}

pub async fn toggle_special(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminStateView>, AppError> {
    let (date, _) = server_clock();
    let saved = AdminStateService::toggle_special_active(&state.store, date).await?;
    announce(&state, date).await;
    Ok(Json(AdminStateView::from(&saved)))
}

pub async fn toggle_ending(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminStateView>, AppError> {
    let (date, _) = server_clock();
    let saved = AdminStateService::toggle_special_ending(&state.store, date).await?;
    announce(&state, date).await;
    Ok(Json(AdminStateView::from(&saved)))
}

pub async fn close_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminStateView>, AppError> {
    let (date, _) = server_clock();
    let saved = AdminStateService::close_to_new_orders(&state.store, date).await?;
    announce(&state, date).await;
    Ok(Json(AdminStateView::from(&saved)))
}

pub async fn set_window(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<WindowTransitionRequest>,
) -> Result<Json<AdminStateView>, AppError> {
    let (date, _) = server_clock();
    let saved = AdminStateService::set_window(&state.store, date, body.state).await?;
    announce(&state, date).await;
    Ok(Json(AdminStateView::from(&saved)))
}

pub async fn toggle_menu_item(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<MenuToggleRequest>,
) -> Result<Json<AdminStateView>, AppError> {
    let (date, _) = server_clock();
    let saved = AdminStateService::toggle_menu_item(&state.store, date, &body.item).await?;
    announce(&state, date).await;
    Ok(Json(AdminStateView::from(&saved)))
}

/// PUT /admin/orders/{id}/completed
pub async fn set_order_completed(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<SetCompletedRequest>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::set_completed(&state.store, id, body.completed).await?;
    let mut redis = state.redis.clone();
    RealtimeService::publish(
        &mut redis,
        &ChangeEvent::Order {
            date: order.date,
            user_id: order.user_id,
        },
    )
    .await;
    Ok(Json(order))
}

async fn announce(state: &AppState, date: chrono::NaiveDate) {
    let mut redis = state.redis.clone();
    RealtimeService::publish(&mut redis, &ChangeEvent::AdminState { date }).await;
}

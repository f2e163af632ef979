use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppError,
    middleware::json::ApiJson,
    models::{
        auth::AuthenticatedUser,
        order::{Order, PlaceOrderRequest},
        realtime::ChangeEvent,
    },
    routes::server_clock,
    services::{
        consoles::{ConsoleService, UserView},
        orders::OrderService,
        realtime::RealtimeService,
    },
    AppState,
};

pub async fn get_today(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserView>, AppError> {
    let (date, now) = server_clock();
    let view = ConsoleService::user_view(&state.store, state.policy, user.user_id, date, now).await?;
    Ok(Json(view))
}

pub async fn place_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let (date, now) = server_clock();
    let order =
        OrderService::place(&state.store, state.policy, user.user_id, date, now, body.quantity)
            .await?;

    let mut redis = state.redis.clone();
    RealtimeService::publish(&mut redis, &ChangeEvent::Order { date, user_id: user.user_id }).await;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Order>, AppError> {
    let (date, now) = server_clock();
    let order = OrderService::cancel(&state.store, state.policy, user.user_id, date, now).await?;

    let mut redis = state.redis.clone();
    RealtimeService::publish(&mut redis, &ChangeEvent::Order { date, user_id: user.user_id }).await;
    Ok(Json(order))
}

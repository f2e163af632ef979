use axum::{extract::State, Json};

use crate::{
    db::CanteenStore,
    error::AppError,
    middleware::json::ApiJson,
    models::{
        auth::{AdminUser, AuthenticatedUser},
        realtime::ChangeEvent,
        settings::{Settings, UpdateSettingsRequest},
    },
    services::realtime::RealtimeService,
    AppState,
};

/// GET /settings: any authenticated user
pub async fn get_settings(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Settings>, AppError> {
    Ok(Json(state.store.settings().await?))
}

/// PUT /admin/settings: admin only
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(mut body): ApiJson<UpdateSettingsRequest>,
) -> Result<Json<Settings>, AppError> {
    clean_settings(&mut body)?;
    let settings = state.store.update_settings(&body).await?;
    tracing::info!("Settings updated by {}", admin.user_id);

    let mut redis = state.redis.clone();
    RealtimeService::publish(&mut redis, &ChangeEvent::Settings).await;
    Ok(Json(settings))
}

fn clean_settings(req: &mut UpdateSettingsRequest) -> Result<(), AppError> {
    if matches!(req.extra_plates_available, Some(n) if n < 0) {
        return Err(AppError::validation("Extra plates cannot be negative"));
    }
    if let Some(options) = req.menu_options.as_mut() {
        let mut cleaned: Vec<String> = Vec::with_capacity(options.len());
        for item in options.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !cleaned.iter().any(|c| c == item) {
                cleaned.push(item.to_string());
            }
        }
        *options = cleaned;
    }
    if let Some(images) = req.menu_images.as_mut() {
        images.retain(|item, url| !item.trim().is_empty() && !url.trim().is_empty());
    }
    Ok(())
}

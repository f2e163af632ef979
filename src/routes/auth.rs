use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::{json::ApiJson, rate_limit::check_rate_limit},
    models::{
        auth::AuthenticatedUser,
        user::{
            ChangePasswordRequest, ConfirmEmailRequest, ForgotPasswordRequest, LoginRequest,
            LoginResponse, RefreshTokenRequest, ResetPasswordRequest, SessionUser, SignUpRequest,
            SignUpResponse,
        },
    },
    services::auth::{normalize_email, AuthService},
    AppState,
};

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), AppError> {
    // Rate limit: 5 sign-ups per hour per address
    let rate_key = format!("rate:signup:{}", normalize_email(&body.email));
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key, 5, 3600).await?;

    let res = AuthService::sign_up(
        &state.db,
        state.email.as_deref(),
        &body,
        &state.config.app_base_url,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ConfirmEmailRequest>,
) -> Result<Json<Value>, AppError> {
    AuthService::confirm_email(&state.db, &body.token).await?;
    Ok(Json(json!({ "message": "Email confirmed. You can now log in." })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // Rate limit: 5 attempts per 15 min per email
    let rate_key = format!("rate:login:{}", normalize_email(&body.email));
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key, 5, 900).await?;

    let res = AuthService::login(&state.db, &body.email, &body.password, &state.token_settings())
        .await?;
    Ok(Json(res))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshTokenRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let res = AuthService::refresh(&state.db, &body.refresh_token, &state.token_settings()).await?;
    Ok(Json(res))
}

pub async fn logout(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshTokenRequest>,
) -> Result<Json<Value>, AppError> {
    AuthService::logout(&state.db, &body.refresh_token, &state.config.jwt_refresh_secret).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SessionUser>, AppError> {
    Ok(Json(AuthService::me(&state.db, user.user_id).await?))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    // Rate limit: 3 requests per 30 min per email
    let rate_key = format!("rate:forgot:{}", normalize_email(&body.email));
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key, 3, 1800).await?;

    // Always 200 so the endpoint cannot be used to discover which accounts exist
    if let Err(e) = AuthService::request_password_reset(
        &state.db,
        state.email.as_deref(),
        &body.email,
        &state.config.app_base_url,
    )
    .await
    {
        tracing::warn!("Password reset request failed: {}", e);
    }
    Ok(Json(json!({
        "message": "If that email is registered, a reset link is on its way."
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    AuthService::reset_password(
        &state.db,
        &body.token,
        &body.new_password,
        body.confirm_password.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "message": "Password updated. Please log in." })))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    AuthService::change_password(
        &state.db,
        user.user_id,
        &body.current_password,
        &body.new_password,
        body.confirm_password.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "message": "Password changed" })))
}

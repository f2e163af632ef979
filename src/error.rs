use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::models::admin_state::WindowState;

/// Why a cancellation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    Cutoff,
    WindowClosed,
}

fn lock_message(reason: &LockReason) -> &'static str {
    match reason {
        LockReason::Cutoff => "Cancellation time is over for today",
        LockReason::WindowClosed => "Orders are locked by the canteen",
    }
}

/// Refusals produced by the order window and ledger rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowStateError {
    #[error("You have already placed an order today")]
    AlreadyOrdered,

    #[error("Ordering is closed right now")]
    WindowClosed,

    #[error("Order time is over for today")]
    PastCutoff,

    #[error("{}", lock_message(.0))]
    Locked(LockReason),

    #[error("You have no order to cancel")]
    NothingToCancel,

    #[error("Cannot move the order window from {from} to {to}")]
    InvalidTransition { from: WindowState, to: WindowState },

    #[error("User profile not found")]
    ProfileMissing,
}

impl WindowStateError {
    pub fn code(&self) -> &'static str {
        match self {
            WindowStateError::AlreadyOrdered => "already_ordered",
            WindowStateError::WindowClosed => "window_closed",
            WindowStateError::PastCutoff => "past_cutoff",
            WindowStateError::Locked(_) => "locked",
            WindowStateError::NothingToCancel => "nothing_to_cancel",
            WindowStateError::InvalidTransition { .. } => "invalid_transition",
            WindowStateError::ProfileMissing => "profile_missing",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    /// Credential failures; the code lets the client pick its message.
    #[error("{message}")]
    Auth { code: &'static str, message: String },

    #[error("{0}")]
    Authorization(String),

    #[error(transparent)]
    Window(#[from] WindowStateError),

    #[error("Not found")]
    NotFound,

    #[error("Too many attempts. Please try again in a few minutes.")]
    RateLimited,

    #[error("{0}")]
    Backend(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn auth(code: &'static str, msg: impl Into<String>) -> Self {
        AppError::Auth {
            code,
            message: msg.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Auth { code, .. } => *code,
            AppError::Authorization(_) => "forbidden",
            AppError::Window(e) => e.code(),
            AppError::NotFound => "not_found",
            AppError::RateLimited => "rate_limited",
            AppError::Backend(_) => "backend",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth { .. } => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Window(WindowStateError::ProfileMissing) => StatusCode::FORBIDDEN,
            AppError::Window(_) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Backend(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:#}", self);
        }

        let mut body = json!({ "error": self.to_string(), "code": self.code() });
        if let AppError::Window(WindowStateError::Locked(reason)) = &self {
            body["reason"] = json!(reason);
        }

        (status, Json(body)).into_response()
    }
}

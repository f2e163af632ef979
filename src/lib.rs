// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use config::Config;
use db::PgStore;
use services::{auth::TokenSettings, email::EmailService, window::CutoffPolicy};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: PgStore,
    pub redis: redis::aio::MultiplexedConnection,
    pub redis_client: RedisClient,
    pub config: Arc<Config>,
    pub email: Option<Arc<EmailService>>,
    pub policy: CutoffPolicy,
}

impl AppState {
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            jwt_secret: self.config.jwt_secret.clone(),
            refresh_secret: self.config.jwt_refresh_secret.clone(),
            access_ttl: self.config.jwt_expiry_seconds,
            refresh_ttl_days: self.config.jwt_refresh_expiry_days,
        }
    }
}

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use redis::Client as RedisClient;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canteen_api::{
    config::Config,
    db::{self, PgStore},
    middleware::auth::JwtSecret,
    routes,
    services::{auth::AuthService, day_rollover, email::EmailService, window::CutoffPolicy},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        AuthService::ensure_admin(&pool, email, password).await?;
    }

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured, sign-ups are confirmed without email");
    }

    let store = PgStore::new(pool.clone());
    let policy = CutoffPolicy::new(config.order_cutoff);
    info!(
        "Order cutoff {} local time, canteen closes at {}",
        config.order_cutoff.format("%H:%M"),
        config.day_close_time.format("%H:%M")
    );

    day_rollover::start(store.clone(), redis_conn.clone(), config.day_close_time);

    let state = AppState {
        db: pool,
        store,
        redis: redis_conn,
        redis_client,
        config: config.clone(),
        email,
        policy,
    };

    // Allow the configured front-end origin; localhost is always allowed for development.
    let base_url = config.app_base_url.trim_end_matches('/').to_string();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base_url
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Auth
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/confirm-email", post(routes::auth::confirm_email))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/forgot-password", post(routes::auth::forgot_password))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        .route("/auth/change-password", post(routes::auth::change_password))
        // User console
        .route("/settings", get(routes::settings::get_settings))
        .route("/today", get(routes::today::get_today))
        .route("/orders", post(routes::today::place_order))
        .route("/orders/mine", delete(routes::today::cancel_order))
        // Admin console
        .route("/admin/today", get(routes::admin::get_today))
        .route("/admin/state", put(routes::admin::save_state))
        .route("/admin/state/toggle-canteen", post(routes::admin::toggle_canteen))
        .route("/admin/state/toggle-special", post(routes::admin::toggle_special))
        .route("/admin/state/toggle-ending", post(routes::admin::toggle_ending))
        .route("/admin/state/close-orders", post(routes::admin::close_orders))
        .route("/admin/state/window", post(routes::admin::set_window))
        .route("/admin/state/menu/toggle", post(routes::admin::toggle_menu_item))
        .route("/admin/orders/{id}/completed", put(routes::admin::set_order_completed))
        .route("/admin/settings", put(routes::settings::update_settings))
        // WebSocket
        .route("/ws", get(routes::websocket::ws_handler))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Canteen API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

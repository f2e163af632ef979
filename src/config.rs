use std::env;

use chrono::NaiveTime;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expiry_seconds: u64,
    pub jwt_refresh_expiry_days: u64,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    /// Daily time after which the special item can no longer be ordered or cancelled.
    pub order_cutoff: NaiveTime,
    /// Daily time at which the canteen is closed automatically.
    pub day_close_time: NaiveTime,
    pub reconcile_interval_secs: u64,
    // Admin bootstrap (optional)
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_refresh_secret: required("JWT_REFRESH_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "900".into())
                .parse()?,
            jwt_refresh_expiry_days: env::var("JWT_REFRESH_EXPIRY_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            order_cutoff: parse_time_of_day(
                &env::var("ORDER_CUTOFF").unwrap_or_else(|_| "13:44".into()),
            )?,
            day_close_time: parse_time_of_day(
                &env::var("DAY_CLOSE_TIME").unwrap_or_else(|_| "23:59".into()),
            )?,
            reconcile_interval_secs: env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "3".into())
                .parse()?,
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

/// Parses `HH:MM` (or `HH:MM:SS`) into a time of day.
pub fn parse_time_of_day(raw: &str) -> anyhow::Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| anyhow::anyhow!("Invalid time of day '{raw}', expected HH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hour_minute() {
        let t = parse_time_of_day("13:44").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(13, 44, 0).unwrap());
    }

    #[test]
    fn parses_with_seconds_and_whitespace() {
        let t = parse_time_of_day(" 07:05:30 ").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(7, 5, 30).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_time_of_day("noon").is_err());
        assert!(parse_time_of_day("25:00").is_err());
    }
}

use chrono::{Local, NaiveTime, Timelike};
use tracing::{info, warn};

use crate::{
    db::PgStore,
    models::realtime::ChangeEvent,
    services::{admin_state::AdminStateService, realtime::RealtimeService},
};

/// True during the minute the canteen is due to close.
pub fn is_close_minute(now: NaiveTime, close_at: NaiveTime) -> bool {
    now.hour() == close_at.hour() && now.minute() == close_at.minute()
}

/// Spawn a background task that wakes up every minute and, at `close_at`,
/// closes today's canteen so the next day starts from a clean slate.
/// Existing orders are kept; the new date simply has no row yet.
pub fn start(store: PgStore, redis: redis::aio::MultiplexedConnection, close_at: NaiveTime) {
    tokio::spawn(async move {
        let mut redis = redis;
        loop {
            // Sleep until the next minute boundary
            let secs_past = Local::now().second() as u64;
            let sleep_secs = if secs_past == 0 { 60 } else { 60 - secs_past };
            tokio::time::sleep(tokio::time::Duration::from_secs(sleep_secs)).await;

            let now = Local::now();
            if !is_close_minute(now.time(), close_at) {
                continue;
            }

            let today = now.date_naive();
            match AdminStateService::close_canteen(&store, today).await {
                Ok(_) => {
                    info!("Day rollover: canteen closed for {}", today);
                    RealtimeService::publish(&mut redis, &ChangeEvent::AdminState { date: today })
                        .await;
                }
                Err(e) => warn!("Day rollover failed for {}: {}", today, e),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_the_close_minute() {
        let close = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        assert!(is_close_minute(NaiveTime::from_hms_opt(23, 59, 0).unwrap(), close));
        assert!(is_close_minute(NaiveTime::from_hms_opt(23, 59, 42).unwrap(), close));
        assert!(!is_close_minute(NaiveTime::from_hms_opt(23, 58, 59).unwrap(), close));
        assert!(!is_close_minute(NaiveTime::from_hms_opt(0, 0, 0).unwrap(), close));
    }
}

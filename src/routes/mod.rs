pub mod admin;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod settings;
pub mod today;
pub mod websocket;

use chrono::{Local, NaiveDate, NaiveTime};

/// Today's date and time of day on the server clock. Cutoff and day boundaries use this, never the client's.
pub fn server_clock() -> (NaiveDate, NaiveTime) {
    let now = Local::now();
    (now.date_naive(), now.time())
}

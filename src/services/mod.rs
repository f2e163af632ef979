pub mod admin_state;
pub mod auth;
pub mod consoles;
pub mod day_rollover;
pub mod email;
pub mod metrics;
pub mod orders;
pub mod realtime;
pub mod window;

pub mod admin_state;
pub mod auth;
pub mod order;
pub mod realtime;
pub mod settings;
pub mod user;

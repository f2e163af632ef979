use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec};

use crate::error::WindowStateError;

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref ORDERS_PLACED: Counter = register_counter!(
        "canteen_orders_placed_total",
        "Special-item orders placed"
    ).unwrap();

    pub static ref ORDERS_CANCELLED: Counter = register_counter!(
        "canteen_orders_cancelled_total",
        "Special-item orders cancelled by their owner"
    ).unwrap();

    pub static ref ORDER_REJECTIONS: CounterVec = register_counter_vec!(
        "canteen_order_rejections_total",
        "Place/cancel attempts refused by the order window, by reason",
        &["reason"]
    ).unwrap();

    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "canteen_logins_total",
        "Login attempts by status",
        &["status"]
    ).unwrap();
}

pub fn record_rejection(err: &WindowStateError) {
    ORDER_REJECTIONS.with_label_values(&[err.code()]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_labelled_by_code() {
        let before = ORDER_REJECTIONS.with_label_values(&["past_cutoff"]).get();
        record_rejection(&WindowStateError::PastCutoff);
        let after = ORDER_REJECTIONS.with_label_values(&["past_cutoff"]).get();
        assert!(after >= before + 1.0);
    }
}

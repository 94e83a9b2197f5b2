//! Prometheus metrics for the liquidation daemon and admin tooling.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug and only surfaces during
//! static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Daemon cycles by outcome (completed/closing_disabled/systemic_failure).
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "perpliq_cycles_total",
        "Daemon cycles by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Positions returned by scans.
pub static POSITIONS_SCANNED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "perpliq_positions_scanned_total",
        "Positions returned by scans"
    )
    .unwrap()
});

/// Liquidation attempts by result (closed/already_closed/failed).
pub static LIQUIDATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "perpliq_liquidations_total",
        "Liquidation attempts by result",
        &["result"]
    )
    .unwrap()
});

/// Positions skipped during evaluation by reason.
pub static POSITIONS_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "perpliq_positions_skipped_total",
        "Positions skipped during evaluation",
        &["reason"]
    )
    .unwrap()
});

/// Backoff sleeps by reason.
pub static BACKOFF_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "perpliq_backoff_total",
        "Daemon backoff sleeps by reason",
        &["reason"]
    )
    .unwrap()
});

/// Admin quorum submissions by action.
pub static QUORUM_SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "perpliq_quorum_submissions_total",
        "Admin quorum submissions by action",
        &["action"]
    )
    .unwrap()
});

/// Wall time of one daemon cycle in seconds.
pub static CYCLE_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "perpliq_cycle_duration_seconds",
        "Daemon cycle duration in seconds",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn cycle(outcome: &str, duration_secs: f64) {
        CYCLES_TOTAL.with_label_values(&[outcome]).inc();
        CYCLE_DURATION_SECONDS.observe(duration_secs);
    }

    pub fn positions_scanned(count: usize) {
        POSITIONS_SCANNED_TOTAL.inc_by(count as u64);
    }

    pub fn liquidation(result: &str) {
        LIQUIDATIONS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn position_skipped(reason: &str) {
        POSITIONS_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn backoff(reason: &str) {
        BACKOFF_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn quorum_submission(action: &str) {
        QUORUM_SUBMISSIONS_TOTAL.with_label_values(&[action]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = LIQUIDATIONS_TOTAL.with_label_values(&["closed"]).get();
        Metrics::liquidation("closed");
        Metrics::liquidation("closed");
        assert_eq!(
            LIQUIDATIONS_TOTAL.with_label_values(&["closed"]).get(),
            before + 2
        );
    }

    #[test]
    fn test_cycle_records_outcome_and_duration() {
        let cycles = CYCLES_TOTAL.with_label_values(&["systemic_failure"]).get();
        let samples = CYCLE_DURATION_SECONDS.get_sample_count();
        Metrics::cycle("systemic_failure", 0.3);
        assert_eq!(
            CYCLES_TOTAL.with_label_values(&["systemic_failure"]).get(),
            cycles + 1
        );
        assert!(CYCLE_DURATION_SECONDS.get_sample_count() > samples);
    }
}

//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Action queue (items by status)
//! - SMM submissions (per set, cost)
//! - Expiry sweeps (exclusions, failures)
//! - Campaign writes (compare-and-swap conflicts)
//! - External panel calls

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Action Queue Metrics
// =============================================================================

/// Items in the most recently built queue, by status.
pub static QUEUE_ITEMS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("spotlight_queue_items", "Action items in the last built queue"),
        &["status"], // "overdue", "needed", "completed"
    )
    .unwrap()
});

/// Queue builds total.
pub static QUEUE_BUILDS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("spotlight_queue_builds_total", "Total action queue builds").unwrap()
});

// =============================================================================
// Submission Metrics
// =============================================================================

/// Order set submissions by result.
pub static SET_SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "spotlight_order_set_submissions_total",
            "Total order set submissions to the SMM panel",
        ),
        &["result"], // "success", "failed", "already_submitted", "unsettled", "unrecorded"
    )
    .unwrap()
});

/// Direct-stream submissions by outcome.
pub static CAMPAIGN_SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "spotlight_campaign_submissions_total",
            "Total direct-stream submissions per campaign",
        ),
        &["outcome"], // "confirmed", "partial"
    )
    .unwrap()
});

/// Informational cost of successful submissions.
pub static SUBMISSION_COST: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "spotlight_submission_cost",
            "Computed cost of successful order set submissions",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Sweep Metrics
// =============================================================================

/// Exclusion flags set by the sweeper.
pub static SWEEP_EXCLUSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "spotlight_sweep_exclusions_total",
            "Exclusion flags set by the expiry sweeper",
        ),
        &["kind"], // "initial", "removal", "hidden_cleared"
    )
    .unwrap()
});

/// Campaigns the sweeper failed to update.
pub static SWEEP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "spotlight_sweep_failures_total",
        "Campaign updates that failed during a sweep",
    )
    .unwrap()
});

// =============================================================================
// Storage Metrics
// =============================================================================

/// Lost compare-and-swap races on campaign rows.
pub static CAS_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "spotlight_campaign_cas_conflicts_total",
        "Campaign updates retried after a concurrent write",
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "spotlight_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "spotlight_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Queue
        Box::new(QUEUE_ITEMS.clone()),
        Box::new(QUEUE_BUILDS.clone()),
        // Submissions
        Box::new(SET_SUBMISSIONS.clone()),
        Box::new(CAMPAIGN_SUBMISSIONS.clone()),
        Box::new(SUBMISSION_COST.clone()),
        // Sweeps
        Box::new(SWEEP_EXCLUSIONS.clone()),
        Box::new(SWEEP_FAILURES.clone()),
        // Storage
        Box::new(CAS_CONFLICTS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}

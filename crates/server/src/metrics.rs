//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the spotlight server:
//! - HTTP request metrics (latency, counts, errors)
//! - Authentication failures
//! - Campaigns by lifecycle stage (collected dynamically)
//! - Core engine metrics (queue, submissions, sweeps, panel calls)

use chrono::Utc;
use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use spotlight_core::{CampaignFilter, CampaignStage};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "spotlight_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("spotlight_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "spotlight_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "spotlight_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Campaign Metrics
// =============================================================================

/// Campaigns by projected stage (collected dynamically).
pub static CAMPAIGNS_BY_STAGE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("spotlight_campaigns_by_stage", "Current campaign count by stage"),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Campaigns
    registry
        .register(Box::new(CAMPAIGNS_BY_STAGE.clone()))
        .unwrap();

    // Core metrics (queue, submissions, sweeps, panel calls)
    for metric in spotlight_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges that are derived from stored state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let now = Utc::now();
    let filter = CampaignFilter::new().with_excluded().unbounded();
    let Ok(campaigns) = state.engine().list_campaigns(&filter, now) else {
        return;
    };

    for stage in [
        CampaignStage::AwaitingInitialActions,
        CampaignStage::InitialActionsComplete,
        CampaignStage::AwaitingRemoval,
        CampaignStage::Removed,
        CampaignStage::Excluded,
    ] {
        let count = campaigns.iter().filter(|c| c.stage == stage).count();
        CAMPAIGNS_BY_STAGE
            .with_label_values(&[stage.as_str()])
            .set(count as i64);
    }
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Path segments after these prefixes are free-form ids.
const ID_PREFIXES: [&str; 2] = ["/api/v1/orders/", "/api/v1/smm/orders/"];

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    for prefix in ID_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            if let Some((id, tail)) = rest.split_once('/') {
                if !id.is_empty() && id != "status" {
                    return format!("{}{{id}}/{}", prefix, tail);
                }
            }
        }
    }

    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}

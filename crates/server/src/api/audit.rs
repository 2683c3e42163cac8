use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use spotlight_core::{AuditEventKind, AuditFilter, AuditRecord};

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Maximum allowed limit for audit queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    /// Filter by campaign ID
    pub campaign_id: Option<String>,
    /// Filter by order; covers the import and its campaigns' actions
    pub order_id: Option<String>,
    /// Comma-separated event types, any of which match
    pub event_type: Option<String>,
    /// Filter by acting admin
    pub actor: Option<String>,
    /// Filter events after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter events before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for audit query endpoint
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query the admin action trail
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<AuditQueryResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    // Shared between query and count
    let mut base_filter = AuditFilter::new();

    if let Some(ref campaign_id) = params.campaign_id {
        base_filter = base_filter.with_campaign_id(campaign_id);
    }

    if let Some(ref order_id) = params.order_id {
        base_filter = base_filter.with_order_id(order_id);
    }

    if let Some(ref event_type) = params.event_type {
        base_filter = base_filter.with_kinds(parse_kinds(event_type)?);
    }

    if let Some(ref actor) = params.actor {
        base_filter = base_filter.with_actor(actor);
    }

    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = base_filter.clone().with_limit(limit).with_offset(offset);

    let events = state.audit_store().query(&query_filter)?;
    let total = state.audit_store().count(&base_filter)?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}

fn parse_kinds(value: &str) -> Result<Vec<AuditEventKind>, ApiError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<AuditEventKind>().map_err(ApiError::bad_request))
        .collect()
}

//! Campaign handlers: listing, slot edits and lifecycle confirmations.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use spotlight_core::{
    CampaignFilter, CampaignView, DirectStreamsReport, PurchaseLogEntry, SlotValue,
};

use super::error::{ApiError, ApiResult};
use super::middleware::AuthUser;
use crate::state::AppState;

/// Maximum allowed limit for campaign queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for campaign queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsParams {
    /// Only campaigns of this order
    pub order_id: Option<String>,
    /// Include fully excluded campaigns
    #[serde(default)]
    pub include_excluded: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListCampaignsResponse {
    pub campaigns: Vec<CampaignView>,
    pub limit: i64,
    pub offset: i64,
}

/// Body for setting one slot
#[derive(Debug, Deserialize)]
pub struct SetSlotBody {
    /// Playlist id, "empty" or "removed"
    pub value: String,
}

/// Body for hiding a campaign
#[derive(Debug, Deserialize)]
pub struct HideBody {
    pub until: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseLogsResponse {
    pub campaign_id: String,
    pub entries: Vec<PurchaseLogEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List campaigns with derived stage and progress
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCampaignsParams>,
) -> ApiResult<ListCampaignsResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = CampaignFilter::new().with_limit(limit).with_offset(offset);
    if let Some(order_id) = params.order_id {
        filter = filter.with_order_ids(vec![order_id]);
    }
    if params.include_excluded {
        filter = filter.with_excluded();
    }

    let campaigns = state.engine().list_campaigns(&filter, Utc::now())?;
    Ok(Json(ListCampaignsResponse {
        campaigns,
        limit,
        offset,
    }))
}

/// Get one campaign
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<CampaignView> {
    Ok(Json(state.engine().get_campaign(&id, Utc::now())?))
}

/// Assign, clear or retire one playlist slot
pub async fn set_slot(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Path((id, index)): Path<(String, usize)>,
    Json(body): Json<SetSlotBody>,
) -> ApiResult<CampaignView> {
    let value = SlotValue::parse(&body.value)
        .ok_or_else(|| ApiError::bad_request("slot value must not be empty"))?;
    Ok(Json(state.engine().set_slot(
        &id,
        index,
        &value,
        &admin,
        Utc::now(),
    )?))
}

/// Submit direct-stream orders to the SMM panel
pub async fn submit_direct_streams(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<DirectStreamsReport> {
    Ok(Json(
        state
            .engine()
            .submit_direct_streams(&id, &admin, Utc::now())
            .await?,
    ))
}

/// Confirm that the song was added to its playlists
pub async fn confirm_playlists_added(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<CampaignView> {
    Ok(Json(
        state
            .engine()
            .confirm_playlists_added(&id, &admin, Utc::now())?,
    ))
}

/// Confirm that the song was taken off its playlists
pub async fn confirm_removal(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<CampaignView> {
    Ok(Json(state.engine().confirm_removal(&id, &admin, Utc::now())?))
}

/// Snooze a campaign's action items
pub async fn hide_campaign(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<HideBody>,
) -> ApiResult<CampaignView> {
    Ok(Json(
        state
            .engine()
            .hide(&id, body.until, &admin, Utc::now())?,
    ))
}

/// Purchase history of a campaign
pub async fn list_purchase_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PurchaseLogsResponse> {
    let entries = state.engine().purchase_logs(&id)?;
    Ok(Json(PurchaseLogsResponse {
        campaign_id: id,
        entries,
    }))
}

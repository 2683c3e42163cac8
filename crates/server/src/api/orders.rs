//! Order handlers: import and deadline.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use spotlight_core::{DeadlineStatus, ImportReport};

use super::error::{ApiError, ApiResult};
use super::middleware::AuthUser;
use crate::state::AppState;

/// Create campaigns for an order's line items.
///
/// 201 when at least one campaign was created, 200 when everything
/// already existed.
pub async fn import_order(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<ImportReport>), ApiError> {
    let report = state
        .engine()
        .import_order(&order_id, &admin, Utc::now())?;
    let status = if report.created.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(report)))
}

/// Start deadline and escalation band of an order
pub async fn get_deadline(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> ApiResult<DeadlineStatus> {
    Ok(Json(state.engine().order_deadline(&order_id, Utc::now())?))
}

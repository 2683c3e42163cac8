//! SMM panel passthroughs.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use spotlight_core::smm::{Balance, OrderStatusInfo, ServiceInfo};

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Maximum order ids per status poll
const MAX_STATUS_IDS: usize = 100;

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceInfo>,
}

#[derive(Debug, Deserialize)]
pub struct StatusesBody {
    pub order_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusesResponse {
    pub statuses: HashMap<String, OrderStatusInfo>,
}

pub async fn get_balance(State(state): State<Arc<AppState>>) -> ApiResult<Balance> {
    let panel = state.engine().panel()?;
    Ok(Json(panel.balance().await?))
}

pub async fn list_services(State(state): State<Arc<AppState>>) -> ApiResult<ServicesResponse> {
    let panel = state.engine().panel()?;
    Ok(Json(ServicesResponse {
        services: panel.services().await?,
    }))
}

pub async fn get_order_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> ApiResult<OrderStatusInfo> {
    let panel = state.engine().panel()?;
    Ok(Json(panel.order_status(&order_id).await?))
}

pub async fn get_order_statuses(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusesBody>,
) -> ApiResult<StatusesResponse> {
    if body.order_ids.is_empty() {
        return Err(ApiError::bad_request("order_ids must not be empty"));
    }
    if body.order_ids.len() > MAX_STATUS_IDS {
        return Err(ApiError::bad_request(format!(
            "at most {} order ids per request",
            MAX_STATUS_IDS
        )));
    }

    let panel = state.engine().panel()?;
    Ok(Json(StatusesResponse {
        statuses: panel.order_statuses(&body.order_ids).await?,
    }))
}

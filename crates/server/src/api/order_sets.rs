//! Order set template management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use spotlight_core::{OrderSet, OrderSetInput};

use super::error::{ApiError, ApiResult};
use super::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListOrderSetsParams {
    /// Only sets of this package (aliases accepted)
    pub package: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListOrderSetsResponse {
    pub order_sets: Vec<OrderSet>,
}

pub async fn list_order_sets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListOrderSetsParams>,
) -> ApiResult<ListOrderSetsResponse> {
    let order_sets = state
        .engine()
        .list_order_sets(params.package.as_deref())?;
    Ok(Json(ListOrderSetsResponse { order_sets }))
}

pub async fn create_order_set(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Json(body): Json<OrderSetInput>,
) -> Result<(StatusCode, Json<OrderSet>), ApiError> {
    let set = state.engine().create_order_set(&body, &admin)?;
    Ok((StatusCode::CREATED, Json(set)))
}

pub async fn update_order_set(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<OrderSetInput>,
) -> ApiResult<OrderSet> {
    Ok(Json(state.engine().update_order_set(id, &body, &admin)?))
}

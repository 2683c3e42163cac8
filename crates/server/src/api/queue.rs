//! Action queue and maintenance handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use spotlight_core::{
    queue::count_by_status, sweeper::SweepReport, ActionItem, ActionStatus, QueueOptions,
};

use super::error::ApiResult;
use super::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    /// Include snoozed items (flagged `is_hidden`)
    #[serde(default)]
    pub include_hidden: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueCounts {
    pub overdue: usize,
    pub needed: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub items: Vec<ActionItem>,
    pub counts: QueueCounts,
    pub generated_at: String,
}

/// Build the action queue
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueueParams>,
) -> ApiResult<QueueResponse> {
    let now = Utc::now();
    let items = state.engine().build_queue(
        now,
        QueueOptions {
            include_hidden: params.include_hidden,
        },
    )?;

    let by_status = count_by_status(&items);
    let count = |status: ActionStatus| by_status.get(&status).copied().unwrap_or(0);
    let counts = QueueCounts {
        overdue: count(ActionStatus::Overdue),
        needed: count(ActionStatus::Needed),
        completed: count(ActionStatus::Completed),
    };

    Ok(Json(QueueResponse {
        items,
        counts,
        generated_at: now.to_rfc3339(),
    }))
}

/// Run the expiry sweeper now
pub async fn sweep_now(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
) -> ApiResult<SweepReport> {
    Ok(Json(state.engine().sweep(&admin, Utc::now())?))
}

//! Direct-stream submission: place every order set of a package on the panel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use super::{
    order_cost, AddOrder, OrderSet, OrderSetError, OrderSetStore, PurchaseLogEntry,
    PurchaseLogError, PurchaseLogStore, PurchaseStatus, SmmPanel,
};
use crate::campaign::Campaign;
use crate::metrics;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("SMM panel not configured: {0}")]
    NotConfigured(String),

    #[error("No active order sets for package {0}")]
    NoOrderSets(String),

    #[error(transparent)]
    OrderSets(#[from] OrderSetError),

    #[error(transparent)]
    PurchaseLog(#[from] PurchaseLogError),
}

/// Result for one order set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetResult {
    pub order_set_id: i64,
    pub service_id: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drip_runs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    pub success: bool,
    /// Succeeded on an earlier attempt; not resubmitted.
    pub already_submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// Aggregate of a submission run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub all_succeeded: bool,
    pub results: Vec<SetResult>,
}

impl SubmissionOutcome {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Submits a campaign's order sets and records every attempt.
pub struct SubmissionService {
    panel: Option<Arc<dyn SmmPanel>>,
    order_sets: Arc<dyn OrderSetStore>,
    logs: Arc<dyn PurchaseLogStore>,
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SubmissionService {
    pub fn new(
        panel: Option<Arc<dyn SmmPanel>>,
        order_sets: Arc<dyn OrderSetStore>,
        logs: Arc<dyn PurchaseLogStore>,
    ) -> Self {
        Self {
            panel,
            order_sets,
            logs,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn panel(&self) -> Result<&Arc<dyn SmmPanel>, SubmissionError> {
        self.panel.as_ref().ok_or_else(|| {
            SubmissionError::NotConfigured("no [smm_panel] API key configured".to_string())
        })
    }

    pub fn order_sets(&self) -> &Arc<dyn OrderSetStore> {
        &self.order_sets
    }

    pub fn logs(&self) -> &Arc<dyn PurchaseLogStore> {
        &self.logs
    }

    /// Submit every active order set of the campaign's package.
    ///
    /// Sets with a successful log entry for this campaign are skipped and
    /// reported as `already_submitted`. Sets with an unsettled attempt are
    /// reported failed and not resubmitted, since the panel may hold the
    /// order. All remaining sets are attempted even if some fail. Submissions
    /// for one campaign run one at a time.
    pub async fn submit(
        &self,
        campaign: &Campaign,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let sets = self.order_sets.active_for_package(&campaign.package_name)?;
        if sets.is_empty() {
            return Err(SubmissionError::NoOrderSets(campaign.package_name.clone()));
        }
        let panel = self.panel()?;

        let lock = self.campaign_lock(&campaign.id);
        let _guard = lock.lock().await;

        let done: HashSet<i64> = self
            .logs
            .succeeded_sets(&campaign.id)?
            .into_iter()
            .collect();
        let unsettled: HashSet<i64> = self
            .logs
            .unsettled_sets(&campaign.id)?
            .into_iter()
            .filter(|id| !done.contains(id))
            .collect();

        let mut results: HashMap<i64, SetResult> = HashMap::new();
        let mut pending = Vec::new();
        for set in &sets {
            if done.contains(&set.id) {
                metrics::SET_SUBMISSIONS
                    .with_label_values(&["already_submitted"])
                    .inc();
                results.insert(
                    set.id,
                    SetResult {
                        success: true,
                        already_submitted: true,
                        ..set_result(set, None)
                    },
                );
            } else if unsettled.contains(&set.id) {
                warn!(
                    campaign_id = %campaign.id,
                    order_set_id = set.id,
                    "Earlier attempt has no recorded outcome, not resubmitting"
                );
                metrics::SET_SUBMISSIONS.with_label_values(&["unsettled"]).inc();
                results.insert(
                    set.id,
                    SetResult {
                        error: Some(
                            "An earlier attempt has no recorded outcome; check the panel before resubmitting"
                                .to_string(),
                        ),
                        ..set_result(set, None)
                    },
                );
            } else {
                pending.push(set);
            }
        }

        let rates = if pending.is_empty() {
            HashMap::new()
        } else {
            match panel.services().await {
                Ok(services) => services
                    .into_iter()
                    .map(|s| (s.service_id, s.rate))
                    .collect(),
                Err(e) => {
                    warn!(campaign_id = %campaign.id, error = %e, "Service catalog unavailable, cost not computed");
                    HashMap::new()
                }
            }
        };

        let attempts = join_all(pending.iter().map(|set| {
            let cost = rates
                .get(&set.service_id)
                .map(|rate| order_cost(set.quantity, set.drip_feed(), *rate));
            self.submit_set(panel, campaign, set, cost, submitted_by, now)
        }))
        .await;
        for (set, result) in pending.into_iter().zip(attempts) {
            results.insert(set.id, result);
        }

        // Report in display order.
        let results: Vec<SetResult> = sets
            .iter()
            .filter_map(|set| results.remove(&set.id))
            .collect();
        let all_succeeded = results.iter().all(|r| r.success);

        Ok(SubmissionOutcome {
            all_succeeded,
            results,
        })
    }

    /// Place one order set, recording the attempt before the panel call and
    /// settling it after.
    async fn submit_set(
        &self,
        panel: &Arc<dyn SmmPanel>,
        campaign: &Campaign,
        set: &OrderSet,
        cost: Option<f64>,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> SetResult {
        let attempt = log_entry(campaign, set, submitted_by, cost, now);
        let row_id = match self.logs.append(&attempt) {
            Ok(row_id) => row_id,
            Err(e) => {
                warn!(campaign_id = %campaign.id, order_set_id = set.id, error = %e, "Purchase log unavailable, order set not submitted");
                metrics::SET_SUBMISSIONS.with_label_values(&["failed"]).inc();
                return SetResult {
                    error: Some(format!("Purchase log unavailable, order not placed: {}", e)),
                    ..set_result(set, cost)
                };
            }
        };

        let request = AddOrder {
            service_id: set.service_id.clone(),
            link: campaign.song_link.clone(),
            quantity: set.quantity,
            drip_feed: set.drip_feed(),
        };

        match panel.add_order(&request).await {
            Ok(accepted) => {
                let settled = PurchaseLogEntry {
                    followiz_order_id: Some(accepted.order_id.clone()),
                    status: PurchaseStatus::Success,
                    raw_response: Some(accepted.raw),
                    ..attempt
                };
                if let Err(e) = self.logs.settle(row_id, &settled) {
                    error!(
                        campaign_id = %campaign.id,
                        order_set_id = set.id,
                        panel_order_id = %accepted.order_id,
                        error = %e,
                        "Order placed but purchase log not settled"
                    );
                    metrics::SET_SUBMISSIONS.with_label_values(&["unrecorded"]).inc();
                    return SetResult {
                        error: Some(format!(
                            "Order {} placed but not recorded: {}",
                            accepted.order_id, e
                        )),
                        order_id: Some(accepted.order_id),
                        ..set_result(set, cost)
                    };
                }

                info!(
                    campaign_id = %campaign.id,
                    order_set_id = set.id,
                    service_id = %set.service_id,
                    panel_order_id = %accepted.order_id,
                    "Order set submitted"
                );
                metrics::SET_SUBMISSIONS.with_label_values(&["success"]).inc();
                if let Some(cost) = cost {
                    metrics::SUBMISSION_COST.with_label_values(&[]).observe(cost);
                }
                SetResult {
                    success: true,
                    order_id: Some(accepted.order_id),
                    ..set_result(set, cost)
                }
            }
            Err(e) => {
                warn!(
                    campaign_id = %campaign.id,
                    order_set_id = set.id,
                    service_id = %set.service_id,
                    error = %e,
                    "Order set submission failed"
                );
                metrics::SET_SUBMISSIONS.with_label_values(&["failed"]).inc();
                let settled = PurchaseLogEntry {
                    status: PurchaseStatus::Failed,
                    error_message: Some(e.to_string()),
                    raw_response: e.raw_response().map(str::to_string),
                    ..attempt
                };
                // Left pending on failure, which blocks resubmission.
                if let Err(log_err) = self.logs.settle(row_id, &settled) {
                    warn!(campaign_id = %campaign.id, order_set_id = set.id, error = %log_err, "Failed to settle purchase log");
                }
                SetResult {
                    error: Some(e.to_string()),
                    ..set_result(set, cost)
                }
            }
        }
    }

    fn campaign_lock(&self, campaign_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.in_flight.lock().unwrap();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(campaign_id.to_string()).or_default().clone()
    }
}

fn set_result(set: &OrderSet, cost: Option<f64>) -> SetResult {
    SetResult {
        order_set_id: set.id,
        service_id: set.service_id.clone(),
        quantity: set.quantity,
        drip_runs: set.drip_runs,
        interval_minutes: set.interval_minutes,
        success: false,
        already_submitted: false,
        order_id: None,
        error: None,
        cost,
    }
}

fn log_entry(
    campaign: &Campaign,
    set: &OrderSet,
    submitted_by: &str,
    cost: Option<f64>,
    now: DateTime<Utc>,
) -> PurchaseLogEntry {
    PurchaseLogEntry {
        campaign_id: campaign.id.clone(),
        order_set_id: set.id,
        service_id: set.service_id.clone(),
        quantity: set.quantity,
        followiz_order_id: None,
        status: PurchaseStatus::Pending,
        error_message: None,
        raw_response: None,
        submitted_by: submitted_by.to_string(),
        cost,
        created_at: now,
    }
}

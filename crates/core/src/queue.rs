//! Action queue.
//!
//! The queue is derived from campaign state on every read and never stored.
//! Each in-flight campaign yields at most two items: the initial actions
//! (direct streams + playlist placement) and, once the playlist quota is
//! reached, the removal.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::Campaign;
use crate::config::EngineConfig;
use crate::deadline::{due_label, DeadlinePolicy};
use crate::order::OrderSummary;
use crate::progress::ProgressRamp;

/// Default hours a completed item stays visible.
pub const DEFAULT_GRACE_HOURS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Initial,
    Removal,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Initial => "initial",
            ActionType::Removal => "removal",
        }
    }
}

/// Variant order is the queue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Overdue,
    Needed,
    Completed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Overdue => "overdue",
            ActionStatus::Needed => "needed",
            ActionStatus::Completed => "completed",
        }
    }
}

/// One row of the admin action queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionItem {
    /// `<campaign id>:<action type>`
    pub id: String,
    pub campaign_id: String,
    pub action_type: ActionType,
    pub status: ActionStatus,
    pub due_by: DateTime<Utc>,
    pub due_label: String,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub order_id: String,
    pub order_number: String,
    pub customer_name: String,
    pub song_name: String,
    pub song_link: String,
    pub package_name: String,
    /// 1-based position within a multi-song order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_number: Option<u32>,
    pub estimated_streams: i64,
    pub playlist_streams_target: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOptions {
    /// Keep items whose campaign is snoozed.
    pub include_hidden: bool,
}

/// Builds the action queue from campaigns and their orders.
#[derive(Debug, Clone, Copy)]
pub struct QueueBuilder {
    deadline: DeadlinePolicy,
    ramp: ProgressRamp,
    grace: Duration,
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self {
            deadline: DeadlinePolicy::default(),
            ramp: ProgressRamp::default(),
            grace: Duration::hours(DEFAULT_GRACE_HOURS),
        }
    }
}

impl QueueBuilder {
    pub fn new(deadline: DeadlinePolicy, ramp: ProgressRamp, grace: Duration) -> Self {
        Self {
            deadline,
            ramp,
            grace,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            DeadlinePolicy::from_hours(config.deadline_hours),
            ProgressRamp::new(config.streams_per_playlist_per_day),
            Duration::hours(config.grace_hours),
        )
    }

    /// Build the sorted queue.
    ///
    /// `campaigns` should hold every campaign of the orders involved
    /// (excluded ones too) in creation order, so song numbers stay stable.
    /// Campaigns whose order is unknown or cancelled are skipped.
    pub fn build(
        &self,
        campaigns: &[Campaign],
        orders: &HashMap<String, OrderSummary>,
        now: DateTime<Utc>,
        options: QueueOptions,
    ) -> Vec<ActionItem> {
        let song_numbers = song_numbers(campaigns);
        let mut items = Vec::new();

        for campaign in campaigns {
            let Some(order) = orders.get(&campaign.order_id) else {
                continue;
            };
            if order.status.is_cancelled() || campaign.fully_excluded() {
                continue;
            }

            let is_hidden = campaign.is_hidden(now);
            if is_hidden && !options.include_hidden {
                continue;
            }

            let song_number = song_numbers.get(campaign.id.as_str()).copied();
            let estimated_streams = campaign.estimated_streams(&self.ramp, now);
            let item = |action_type: ActionType,
                        status: ActionStatus,
                        due_by: DateTime<Utc>,
                        due_label: String,
                        completed_at: Option<DateTime<Utc>>| ActionItem {
                id: format!("{}:{}", campaign.id, action_type.as_str()),
                campaign_id: campaign.id.clone(),
                action_type,
                status,
                due_by,
                due_label,
                is_hidden,
                completed_at,
                order_id: order.id.clone(),
                order_number: order.order_number.clone(),
                customer_name: order.customer_name.clone(),
                song_name: campaign.song_name.clone(),
                song_link: campaign.song_link.clone(),
                package_name: campaign.package_name.clone(),
                song_number,
                estimated_streams,
                playlist_streams_target: campaign.playlist_streams_target,
            };

            if !campaign.initial_actions_excluded {
                let due_by = self.deadline.deadline(order.created_at);
                let label = due_label(due_by, now);
                let (status, completed_at) = if campaign.initial_actions_complete() {
                    (ActionStatus::Completed, Some(campaign.updated_at))
                } else if now > due_by {
                    (ActionStatus::Overdue, None)
                } else {
                    (ActionStatus::Needed, None)
                };
                items.push(item(ActionType::Initial, status, due_by, label, completed_at));
            }

            if !campaign.removal_actions_excluded
                && campaign.initial_actions_complete()
                && estimated_streams >= campaign.playlist_streams_target
            {
                let (status, completed_at) = if campaign.removed_from_playlists {
                    (ActionStatus::Completed, Some(campaign.updated_at))
                } else {
                    (ActionStatus::Needed, None)
                };
                items.push(item(
                    ActionType::Removal,
                    status,
                    now,
                    "Due now".to_string(),
                    completed_at,
                ));
            }
        }

        items.retain(|item| match item.completed_at {
            Some(completed_at) if item.status == ActionStatus::Completed => {
                completed_at + self.grace >= now
            }
            _ => true,
        });
        items.sort_by_key(|item| (item.status, item.due_by));
        items
    }
}

/// Song numbers for orders with more than one campaign.
fn song_numbers(campaigns: &[Campaign]) -> HashMap<&str, u32> {
    let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
    for campaign in campaigns {
        groups
            .entry(campaign.order_id.as_str())
            .or_default()
            .push(campaign.id.as_str());
    }

    groups
        .into_values()
        .filter(|ids| ids.len() > 1)
        .flat_map(|ids| {
            ids.into_iter()
                .enumerate()
                .map(|(i, id)| (id, i as u32 + 1))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Count of items per status.
pub fn count_by_status(items: &[ActionItem]) -> HashMap<ActionStatus, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(item.status).or_insert(0) += 1;
    }
    counts
}

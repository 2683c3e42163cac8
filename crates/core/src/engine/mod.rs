//! Campaign engine: the operations exposed to the admin console.
//!
//! Wires the stores, the slot manager, the queue builder and the SMM
//! submission service together. Every campaign write goes through
//! [`update_with_retry`], so concurrent edits surface as `Conflict`
//! instead of silently overwriting each other.

mod error;

pub use error::EngineError;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::campaign::{
    extract_track_id, update_with_retry, Campaign, CampaignFilter, CampaignStage, CampaignStore,
    NewCampaign, PlaylistSlotManager, SlotValue,
};
use crate::config::EngineConfig;
use crate::deadline::{DeadlinePolicy, DeadlineStatus};
use crate::metrics;
use crate::order::{OrderStore, OrderSummary};
use crate::package::PackageCatalog;
use crate::playlist::PlaylistDirectory;
use crate::progress::ProgressRamp;
use crate::queue::{count_by_status, ActionItem, ActionStatus, QueueBuilder, QueueOptions};
use crate::smm::{
    OrderSet, OrderSetInput, PurchaseLogEntry, SmmPanel, SubmissionOutcome, SubmissionService,
};
use crate::sweeper::{run_sweep, SweepReport};

/// Campaign with its derived, never-stored fields.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub stage: CampaignStage,
    pub estimated_streams: i64,
    pub is_hidden: bool,
}

/// Result of importing an order.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub order_id: String,
    pub created: Vec<Campaign>,
    /// Ids of existing campaigns the import left alone.
    pub skipped: Vec<String>,
}

/// Result of a direct-streams submission.
#[derive(Debug, Clone, Serialize)]
pub struct DirectStreamsReport {
    pub campaign: CampaignView,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}

pub struct CampaignEngine {
    config: EngineConfig,
    campaigns: Arc<dyn CampaignStore>,
    orders: Arc<dyn OrderStore>,
    packages: PackageCatalog,
    slots: PlaylistSlotManager,
    submissions: SubmissionService,
    queue: QueueBuilder,
    ramp: ProgressRamp,
    deadline: DeadlinePolicy,
    audit: Option<AuditHandle>,
}

impl CampaignEngine {
    pub fn new(
        config: EngineConfig,
        campaigns: Arc<dyn CampaignStore>,
        orders: Arc<dyn OrderStore>,
        playlists: Arc<dyn PlaylistDirectory>,
        packages: PackageCatalog,
        submissions: SubmissionService,
    ) -> Self {
        Self {
            queue: QueueBuilder::from_config(&config),
            ramp: ProgressRamp::new(config.streams_per_playlist_per_day),
            deadline: DeadlinePolicy::from_hours(config.deadline_hours),
            slots: PlaylistSlotManager::new(packages.clone(), playlists),
            config,
            campaigns,
            orders,
            packages,
            submissions,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn panel(&self) -> Result<&Arc<dyn SmmPanel>, EngineError> {
        Ok(self.submissions.panel()?)
    }

    fn grace(&self) -> Duration {
        Duration::hours(self.config.grace_hours)
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }

    fn view(&self, campaign: Campaign, now: DateTime<Utc>) -> CampaignView {
        CampaignView {
            stage: CampaignStage::project(&campaign, &self.ramp, now),
            estimated_streams: campaign.estimated_streams(&self.ramp, now),
            is_hidden: campaign.is_hidden(now),
            campaign,
        }
    }

    /// Read-modify-write with CAS retries; refreshes the status label.
    fn mutate<T, F>(
        &self,
        id: &str,
        now: DateTime<Utc>,
        mut f: F,
    ) -> Result<(Campaign, T), EngineError>
    where
        F: FnMut(&mut Campaign) -> Result<T, EngineError>,
    {
        let ramp = self.ramp;
        update_with_retry(
            self.campaigns.as_ref(),
            id,
            self.config.max_update_retries,
            |campaign| {
                let value = f(campaign)?;
                campaign.campaign_status = CampaignStage::project(campaign, &ramp, now)
                    .as_str()
                    .to_string();
                Ok(value)
            },
        )
    }

    // ---- Orders ----

    /// Create one campaign per distinct track of an order.
    ///
    /// Tracks that already have a campaign in this order are skipped, so a
    /// repeated import is harmless. Every package is resolved before any
    /// campaign is written.
    pub fn import_order(
        &self,
        order_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ImportReport, EngineError> {
        let order = self
            .orders
            .get(order_id)?
            .ok_or_else(|| EngineError::NotFound(format!("Order not found: {}", order_id)))?;

        if order.summary.status.is_cancelled() {
            return Err(EngineError::Validation(format!(
                "Order {} is cancelled",
                order.summary.order_number
            )));
        }

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        let mut skipped = Vec::new();

        for item in &order.items {
            let track_id = extract_track_id(&item.song_link);
            if track_id.is_empty() || !seen.insert(track_id.clone()) {
                continue;
            }
            if let Some(existing) = self.campaigns.find_by_track(order_id, &track_id)? {
                skipped.push(existing.id);
                continue;
            }

            let package = self.packages.resolve(&item.package_name)?;
            pending.push(NewCampaign {
                order_id: order.summary.id.clone(),
                order_number: order.summary.order_number.clone(),
                song_name: item.song_name.clone(),
                song_link: item.song_link.clone(),
                track_id,
                package_name: package.package_name,
                package_id: item.package_id.clone(),
                direct_streams_target: package.direct_streams_target,
                playlist_streams_target: package.playlist_streams_target,
                time_on_playlists: package.time_on_playlists,
                playlist_assignments_needed: package.playlist_assignments_needed,
            });
        }

        let mut created = Vec::with_capacity(pending.len());
        for new in &pending {
            let campaign = self.campaigns.create(new, now)?;
            debug!(
                campaign_id = %campaign.id,
                track_id = %campaign.track_id,
                package = %campaign.package_name,
                "Created campaign"
            );
            created.push(campaign);
        }

        info!(
            order_id = %order_id,
            created = created.len(),
            skipped = skipped.len(),
            "Imported order"
        );
        self.emit(AuditEvent::OrderImported {
            order_id: order_id.to_string(),
            actor: actor.to_string(),
            created: created.iter().map(|c| c.id.clone()).collect(),
            skipped: skipped.len() as u32,
        });

        Ok(ImportReport {
            order_id: order_id.to_string(),
            created,
            skipped,
        })
    }

    /// Start deadline of an order.
    pub fn order_deadline(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DeadlineStatus, EngineError> {
        let summary = self
            .orders
            .summaries(&[order_id.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NotFound(format!("Order not found: {}", order_id)))?;
        Ok(self
            .deadline
            .classify(summary.created_at, &summary.status, now))
    }

    // ---- Queue ----

    /// Build the actionable queue.
    pub fn build_queue(
        &self,
        now: DateTime<Utc>,
        options: QueueOptions,
    ) -> Result<Vec<ActionItem>, EngineError> {
        let active = self.campaigns.list(&CampaignFilter::new().unbounded())?;

        let mut order_ids: Vec<String> = Vec::new();
        for campaign in &active {
            if !order_ids.contains(&campaign.order_id) {
                order_ids.push(campaign.order_id.clone());
            }
        }
        if order_ids.is_empty() {
            set_queue_gauges(&[]);
            return Ok(Vec::new());
        }

        // Siblings of the orders involved, excluded ones too, keep song
        // numbering stable as campaigns drop out of the queue.
        let campaigns = self.campaigns.list(
            &CampaignFilter::new()
                .with_order_ids(order_ids.clone())
                .with_excluded()
                .unbounded(),
        )?;
        let orders: HashMap<String, OrderSummary> = self
            .orders
            .summaries(&order_ids)?
            .into_iter()
            .map(|summary| (summary.id.clone(), summary))
            .collect();

        let items = self.queue.build(&campaigns, &orders, now, options);
        set_queue_gauges(&items);
        debug!(items = items.len(), campaigns = campaigns.len(), "Built action queue");
        Ok(items)
    }

    // ---- Campaigns ----

    pub fn get_campaign(&self, id: &str, now: DateTime<Utc>) -> Result<CampaignView, EngineError> {
        let campaign = self
            .campaigns
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(format!("Campaign not found: {}", id)))?;
        Ok(self.view(campaign, now))
    }

    pub fn list_campaigns(
        &self,
        filter: &CampaignFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<CampaignView>, EngineError> {
        Ok(self
            .campaigns
            .list(filter)?
            .into_iter()
            .map(|c| self.view(c, now))
            .collect())
    }

    /// Assign, clear or retire one playlist slot.
    pub fn set_slot(
        &self,
        id: &str,
        index: usize,
        value: &SlotValue,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<CampaignView, EngineError> {
        let (campaign, ()) = self.mutate(id, now, |campaign| {
            Ok(self.slots.set_slot(campaign, index, value, now)?)
        })?;

        self.emit(AuditEvent::SlotAssigned {
            campaign_id: id.to_string(),
            order_id: campaign.order_id.clone(),
            actor: actor.to_string(),
            index,
            value: match value {
                SlotValue::Playlist(playlist_id) => playlist_id.clone(),
                SlotValue::Empty => "empty".to_string(),
                SlotValue::Removed => "removed".to_string(),
            },
        });
        Ok(self.view(campaign, now))
    }

    pub fn confirm_playlists_added(
        &self,
        id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<CampaignView, EngineError> {
        let (campaign, ()) =
            self.mutate(id, now, |campaign| Ok(campaign.confirm_playlists_added(now)?))?;

        info!(campaign_id = %id, slots = campaign.playlist_assignments.len(), "Playlists confirmed");
        self.emit(AuditEvent::PlaylistsConfirmed {
            campaign_id: id.to_string(),
            order_id: campaign.order_id.clone(),
            actor: actor.to_string(),
            slot_count: campaign.playlist_assignments.len() as u32,
        });
        Ok(self.view(campaign, now))
    }

    pub fn confirm_removal(
        &self,
        id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<CampaignView, EngineError> {
        let (campaign, ()) = self.mutate(id, now, |campaign| Ok(campaign.confirm_removal(now)?))?;

        info!(campaign_id = %id, "Removal confirmed");
        self.emit(AuditEvent::RemovalConfirmed {
            campaign_id: id.to_string(),
            order_id: campaign.order_id.clone(),
            actor: actor.to_string(),
        });
        Ok(self.view(campaign, now))
    }

    /// Snooze a campaign's action items until `until`.
    pub fn hide(
        &self,
        id: &str,
        until: DateTime<Utc>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<CampaignView, EngineError> {
        let (campaign, ()) = self.mutate(id, now, |campaign| Ok(campaign.hide(until, now)?))?;

        self.emit(AuditEvent::CampaignHidden {
            campaign_id: id.to_string(),
            order_id: campaign.order_id.clone(),
            actor: actor.to_string(),
            until,
        });
        Ok(self.view(campaign, now))
    }

    /// Place the campaign's direct-stream orders on the SMM panel.
    ///
    /// Direct streams are marked confirmed only when every order set has
    /// succeeded (now or on an earlier attempt). A partial run leaves the
    /// flag alone; retrying resubmits only sets the panel rejected.
    pub async fn submit_direct_streams(
        &self,
        id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<DirectStreamsReport, EngineError> {
        let campaign = self
            .campaigns
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(format!("Campaign not found: {}", id)))?;

        let outcome = self.submissions.submit(&campaign, actor, now).await?;

        let campaign = if outcome.all_succeeded && !campaign.direct_streams_confirmed {
            let (campaign, ()) = self.mutate(id, now, |campaign| {
                // A concurrent submission may have confirmed it already.
                if !campaign.direct_streams_confirmed {
                    campaign.confirm_direct_streams(now);
                }
                Ok(())
            })?;
            campaign
        } else {
            campaign
        };

        let already = outcome
            .results
            .iter()
            .filter(|r| r.already_submitted)
            .count();
        let failed = outcome.failed_count();
        let submitted = outcome.results.len() - already - failed;
        let costs: Vec<f64> = outcome
            .results
            .iter()
            .filter(|r| r.success && !r.already_submitted)
            .filter_map(|r| r.cost)
            .collect();
        let total_cost = (!costs.is_empty()).then(|| costs.iter().sum::<f64>());

        let label = if outcome.all_succeeded {
            "confirmed"
        } else {
            "partial"
        };
        metrics::CAMPAIGN_SUBMISSIONS.with_label_values(&[label]).inc();
        if outcome.all_succeeded {
            info!(campaign_id = %id, submitted, already, "Direct streams submitted");
        } else {
            warn!(campaign_id = %id, submitted, failed, "Direct streams partially submitted");
        }

        self.emit(AuditEvent::DirectStreamsSubmitted {
            campaign_id: id.to_string(),
            order_id: campaign.order_id.clone(),
            actor: actor.to_string(),
            all_succeeded: outcome.all_succeeded,
            submitted: submitted as u32,
            failed: failed as u32,
            already_submitted: already as u32,
            total_cost,
        });

        Ok(DirectStreamsReport {
            campaign: self.view(campaign, now),
            outcome,
        })
    }

    /// Purchase history of a campaign, newest first.
    pub fn purchase_logs(&self, id: &str) -> Result<Vec<PurchaseLogEntry>, EngineError> {
        if self.campaigns.get(id)?.is_none() {
            return Err(EngineError::NotFound(format!("Campaign not found: {}", id)));
        }
        Ok(self.submissions.logs().for_campaign(id)?)
    }

    // ---- Maintenance ----

    /// Expire snoozes and retire completed work past its grace window.
    pub fn sweep(&self, actor: &str, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let report = run_sweep(
            self.campaigns.as_ref(),
            now,
            self.grace(),
            self.config.max_update_retries,
        )?;

        self.emit(AuditEvent::SweepCompleted {
            actor: actor.to_string(),
            examined: report.examined as u32,
            updated: report.updated as u32,
            hidden_cleared: report.hidden_cleared as u32,
            initial_excluded: report.initial_excluded as u32,
            removal_excluded: report.removal_excluded as u32,
            failed: report.failed as u32,
        });
        Ok(report)
    }

    // ---- Order sets ----

    pub fn list_order_sets(&self, package: Option<&str>) -> Result<Vec<OrderSet>, EngineError> {
        Ok(self.submissions.order_sets().list(package)?)
    }

    pub fn create_order_set(
        &self,
        input: &OrderSetInput,
        actor: &str,
    ) -> Result<OrderSet, EngineError> {
        let set = self.submissions.order_sets().create(input)?;
        info!(order_set_id = set.id, package = %set.package_name, "Created order set");
        self.emit(AuditEvent::OrderSetSaved {
            order_set_id: set.id,
            actor: actor.to_string(),
            package_name: set.package_name.clone(),
            created: true,
        });
        Ok(set)
    }

    pub fn update_order_set(
        &self,
        id: i64,
        input: &OrderSetInput,
        actor: &str,
    ) -> Result<OrderSet, EngineError> {
        let set = self.submissions.order_sets().update(id, input)?;
        self.emit(AuditEvent::OrderSetSaved {
            order_set_id: set.id,
            actor: actor.to_string(),
            package_name: set.package_name.clone(),
            created: false,
        });
        Ok(set)
    }
}

fn set_queue_gauges(items: &[ActionItem]) {
    metrics::QUEUE_BUILDS.inc();
    let counts = count_by_status(items);
    for status in [
        ActionStatus::Overdue,
        ActionStatus::Needed,
        ActionStatus::Completed,
    ] {
        metrics::QUEUE_ITEMS
            .with_label_values(&[status.as_str()])
            .set(counts.get(&status).copied().unwrap_or(0) as i64);
    }
}

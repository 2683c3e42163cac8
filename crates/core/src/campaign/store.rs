//! Campaign storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{Campaign, NewCampaign};

/// Error type for campaign storage.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Campaign not found: {0}")]
    NotFound(String),

    /// Row changed since it was read.
    #[error("Campaign {campaign_id} was modified concurrently (expected version {expected_version})")]
    Conflict {
        campaign_id: String,
        expected_version: i64,
    },

    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for listing campaigns.
#[derive(Debug, Clone)]
pub struct CampaignFilter {
    /// Restrict to these orders.
    pub order_ids: Option<Vec<String>>,
    /// Include campaigns with both exclusion flags set.
    pub include_excluded: bool,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for CampaignFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignFilter {
    /// Active campaigns, first 100.
    pub fn new() -> Self {
        Self {
            order_ids: None,
            include_excluded: false,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_order_ids(mut self, order_ids: Vec<String>) -> Self {
        self.order_ids = Some(order_ids);
        self
    }

    pub fn with_excluded(mut self) -> Self {
        self.include_excluded = true;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// No row limit.
    pub fn unbounded(mut self) -> Self {
        self.limit = -1;
        self
    }
}

/// Persistence for campaigns.
///
/// Campaigns are never deleted; they are retired with exclusion flags.
pub trait CampaignStore: Send + Sync {
    fn create(&self, campaign: &NewCampaign, now: DateTime<Utc>)
        -> Result<Campaign, CampaignError>;

    fn get(&self, id: &str) -> Result<Option<Campaign>, CampaignError>;

    /// Campaign for a track within an order, if already imported.
    fn find_by_track(
        &self,
        order_id: &str,
        track_id: &str,
    ) -> Result<Option<Campaign>, CampaignError>;

    /// Campaigns ordered by creation (ties by insertion order).
    fn list(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, CampaignError>;

    /// Compare-and-swap write of the whole row.
    ///
    /// Succeeds only if the stored version still equals `campaign.version`;
    /// returns the stored campaign with the bumped version.
    fn update(&self, campaign: &Campaign) -> Result<Campaign, CampaignError>;
}

/// Read-modify-write of one campaign with compare-and-swap retries.
///
/// `mutate` runs against a fresh copy on every attempt; if it fails nothing
/// is written. Gives up with `Conflict` after `max_attempts` lost races.
pub fn update_with_retry<T, E, F>(
    store: &dyn CampaignStore,
    id: &str,
    max_attempts: u32,
    mut mutate: F,
) -> Result<(Campaign, T), E>
where
    E: From<CampaignError>,
    F: FnMut(&mut Campaign) -> Result<T, E>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut campaign = store
            .get(id)?
            .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
        let value = mutate(&mut campaign)?;

        match store.update(&campaign) {
            Ok(stored) => return Ok((stored, value)),
            Err(CampaignError::Conflict { .. }) if attempt < max_attempts.max(1) => {
                crate::metrics::CAS_CONFLICTS.inc();
                tracing::debug!(campaign_id = %id, attempt, "Campaign changed concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

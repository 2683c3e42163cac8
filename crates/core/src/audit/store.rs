use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{AuditEventKind, AuditRecord};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Selects part of the action trail. Empty fields match everything.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditFilter {
    pub campaign_id: Option<String>,
    /// Matches the import and every campaign action of one order.
    pub order_id: Option<String>,
    /// Any of these kinds.
    pub kinds: Vec<AuditEventKind>,
    pub actor: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditFilter {
    pub fn new() -> Self {
        Self {
            campaign_id: None,
            order_id: None,
            kinds: Vec::new(),
            actor: None,
            from: None,
            to: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Trail of one campaign.
    pub fn for_campaign(campaign_id: impl Into<String>) -> Self {
        Self::new().with_campaign_id(campaign_id)
    }

    /// Trail of one order, from import through every campaign it created.
    pub fn for_order(order_id: impl Into<String>) -> Self {
        Self::new().with_order_id(order_id)
    }

    pub fn with_campaign_id(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Add a kind; repeated calls widen the match.
    pub fn with_kind(mut self, kind: AuditEventKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    pub fn with_kinds(self, kinds: impl IntoIterator<Item = AuditEventKind>) -> Self {
        kinds.into_iter().fold(self, Self::with_kind)
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
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
}

/// Persistent action trail.
pub trait AuditStore: Send + Sync {
    /// Returns the assigned id.
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Newest first
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}

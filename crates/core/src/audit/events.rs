use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Campaign lifecycle
    OrderImported {
        order_id: String,
        actor: String,
        /// Ids of campaigns created by this import
        created: Vec<String>,
        /// Line items that already had a campaign
        skipped: u32,
    },
    SlotAssigned {
        campaign_id: String,
        order_id: String,
        actor: String,
        index: usize,
        /// Playlist id, "empty" or "removed"
        value: String,
    },
    PlaylistsConfirmed {
        campaign_id: String,
        order_id: String,
        actor: String,
        slot_count: u32,
    },
    RemovalConfirmed {
        campaign_id: String,
        order_id: String,
        actor: String,
    },
    CampaignHidden {
        campaign_id: String,
        order_id: String,
        actor: String,
        until: DateTime<Utc>,
    },
    DirectStreamsSubmitted {
        campaign_id: String,
        order_id: String,
        actor: String,
        all_succeeded: bool,
        submitted: u32,
        failed: u32,
        already_submitted: u32,
        /// Sum of known per-set costs
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost: Option<f64>,
    },

    // Maintenance
    SweepCompleted {
        actor: String,
        examined: u32,
        updated: u32,
        hidden_cleared: u32,
        initial_excluded: u32,
        removal_excluded: u32,
        failed: u32,
    },
    OrderSetSaved {
        order_set_id: i64,
        actor: String,
        package_name: String,
        created: bool,
    },
}

/// Discriminant of an [`AuditEvent`], used to filter the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    ServiceStarted,
    ServiceStopped,
    OrderImported,
    SlotAssigned,
    PlaylistsConfirmed,
    RemovalConfirmed,
    CampaignHidden,
    DirectStreamsSubmitted,
    SweepCompleted,
    OrderSetSaved,
}

impl AuditEventKind {
    pub const ALL: [AuditEventKind; 10] = [
        Self::ServiceStarted,
        Self::ServiceStopped,
        Self::OrderImported,
        Self::SlotAssigned,
        Self::PlaylistsConfirmed,
        Self::RemovalConfirmed,
        Self::CampaignHidden,
        Self::DirectStreamsSubmitted,
        Self::SweepCompleted,
        Self::OrderSetSaved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceStarted => "service_started",
            Self::ServiceStopped => "service_stopped",
            Self::OrderImported => "order_imported",
            Self::SlotAssigned => "slot_assigned",
            Self::PlaylistsConfirmed => "playlists_confirmed",
            Self::RemovalConfirmed => "removal_confirmed",
            Self::CampaignHidden => "campaign_hidden",
            Self::DirectStreamsSubmitted => "direct_streams_submitted",
            Self::SweepCompleted => "sweep_completed",
            Self::OrderSetSaved => "order_set_saved",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown audit event type: {}", s))
    }
}

impl AuditEvent {
    pub fn kind(&self) -> AuditEventKind {
        match self {
            Self::ServiceStarted { .. } => AuditEventKind::ServiceStarted,
            Self::ServiceStopped { .. } => AuditEventKind::ServiceStopped,
            Self::OrderImported { .. } => AuditEventKind::OrderImported,
            Self::SlotAssigned { .. } => AuditEventKind::SlotAssigned,
            Self::PlaylistsConfirmed { .. } => AuditEventKind::PlaylistsConfirmed,
            Self::RemovalConfirmed { .. } => AuditEventKind::RemovalConfirmed,
            Self::CampaignHidden { .. } => AuditEventKind::CampaignHidden,
            Self::DirectStreamsSubmitted { .. } => AuditEventKind::DirectStreamsSubmitted,
            Self::SweepCompleted { .. } => AuditEventKind::SweepCompleted,
            Self::OrderSetSaved { .. } => AuditEventKind::OrderSetSaved,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn campaign_id(&self) -> Option<&str> {
        match self {
            Self::SlotAssigned { campaign_id, .. }
            | Self::PlaylistsConfirmed { campaign_id, .. }
            | Self::RemovalConfirmed { campaign_id, .. }
            | Self::CampaignHidden { campaign_id, .. }
            | Self::DirectStreamsSubmitted { campaign_id, .. } => Some(campaign_id),
            _ => None,
        }
    }

    /// Order the event belongs to; set on imports and every campaign action.
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::OrderImported { order_id, .. }
            | Self::SlotAssigned { order_id, .. }
            | Self::PlaylistsConfirmed { order_id, .. }
            | Self::RemovalConfirmed { order_id, .. }
            | Self::CampaignHidden { order_id, .. }
            | Self::DirectStreamsSubmitted { order_id, .. } => Some(order_id),
            _ => None,
        }
    }

    pub fn actor(&self) -> Option<&str> {
        match self {
            Self::OrderImported { actor, .. }
            | Self::SlotAssigned { actor, .. }
            | Self::PlaylistsConfirmed { actor, .. }
            | Self::RemovalConfirmed { actor, .. }
            | Self::CampaignHidden { actor, .. }
            | Self::DirectStreamsSubmitted { actor, .. }
            | Self::SweepCompleted { actor, .. }
            | Self::OrderSetSaved { actor, .. } => Some(actor),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub campaign_id: Option<String>,
    pub order_id: Option<String>,
    pub actor: Option<String>,
    pub data: AuditEvent,
}

impl AuditRecord {
    /// Record for an event; `id` is assigned by the store.
    pub fn from_event(timestamp: DateTime<Utc>, event: AuditEvent) -> Self {
        Self {
            id: 0,
            timestamp,
            event_type: event.event_type().to_string(),
            campaign_id: event.campaign_id().map(String::from),
            order_id: event.order_id().map(String::from),
            actor: event.actor().map(String::from),
            data: event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_events_have_no_campaign_or_actor() {
        let event = AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        };
        assert_eq!(event.event_type(), "service_started");
        assert_eq!(event.campaign_id(), None);
        assert_eq!(event.actor(), None);
    }

    #[test]
    fn test_slot_assigned() {
        let event = AuditEvent::SlotAssigned {
            campaign_id: "c-1".to_string(),
            order_id: "o-1".to_string(),
            actor: "admin".to_string(),
            index: 2,
            value: "removed".to_string(),
        };
        assert_eq!(event.kind(), AuditEventKind::SlotAssigned);
        assert_eq!(event.event_type(), "slot_assigned");
        assert_eq!(event.campaign_id(), Some("c-1"));
        assert_eq!(event.order_id(), Some("o-1"));
        assert_eq!(event.actor(), Some("admin"));
    }

    #[test]
    fn test_sweep_has_actor_but_no_campaign() {
        let event = AuditEvent::SweepCompleted {
            actor: "scheduler".to_string(),
            examined: 10,
            updated: 2,
            hidden_cleared: 1,
            initial_excluded: 1,
            removal_excluded: 0,
            failed: 0,
        };
        assert_eq!(event.campaign_id(), None);
        assert_eq!(event.order_id(), None);
        assert_eq!(event.actor(), Some("scheduler"));
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let event = AuditEvent::DirectStreamsSubmitted {
            campaign_id: "c-1".to_string(),
            order_id: "o-1".to_string(),
            actor: "admin".to_string(),
            all_succeeded: false,
            submitted: 1,
            failed: 1,
            already_submitted: 0,
            total_cost: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"direct_streams_submitted\""));
        assert!(!json.contains("total_cost"));

        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.campaign_id(), Some("c-1"));
    }

    #[test]
    fn test_record_from_event() {
        let now = Utc::now();
        let record = AuditRecord::from_event(
            now,
            AuditEvent::RemovalConfirmed {
                campaign_id: "c-9".to_string(),
                order_id: "o-3".to_string(),
                actor: "admin".to_string(),
            },
        );
        assert_eq!(record.id, 0);
        assert_eq!(record.event_type, "removal_confirmed");
        assert_eq!(record.campaign_id.as_deref(), Some("c-9"));
        assert_eq!(record.order_id.as_deref(), Some("o-3"));
        assert_eq!(record.timestamp, now);
    }

    #[test]
    fn test_kind_names_match_serialized_tag() {
        for kind in AuditEventKind::ALL {
            assert_eq!(kind.as_str().parse::<AuditEventKind>(), Ok(kind));
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind)
            );
        }
        assert!("slot_cleared".parse::<AuditEventKind>().is_err());
    }
}

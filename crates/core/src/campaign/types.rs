use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::progress::ProgressRamp;

/// One playlist placement position of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Slot {
    /// Assigned to a concrete playlist.
    Real {
        id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        genre: Option<String>,
    },
    /// Not yet assigned.
    Empty,
    /// The song was taken off this slot's playlist.
    Removed { id: String, name: String },
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Slot::Real { .. })
    }

    /// Whether this slot has ever held a playlist. Only a `Real` slot can
    /// become `Removed`, so both count.
    pub fn was_assigned(&self) -> bool {
        !self.is_empty()
    }
}

/// Requested slot content, as sent by the admin console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue {
    Playlist(String),
    Empty,
    Removed,
}

impl SlotValue {
    /// `"empty"` and `"removed"` are sentinels; anything else is a playlist id.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value {
            "" => None,
            "empty" => Some(SlotValue::Empty),
            "removed" => Some(SlotValue::Removed),
            id => Some(SlotValue::Playlist(id.to_string())),
        }
    }
}

/// One song + package fulfillment unit within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub order_id: String,
    pub order_number: String,
    pub song_name: String,
    pub song_link: String,
    /// Dedup key extracted from the song URL.
    pub track_id: String,
    pub package_name: String,
    pub package_id: Option<String>,

    pub direct_streams_target: i64,
    pub playlist_streams_target: i64,
    /// Planning horizon in days.
    pub time_on_playlists: u32,
    pub playlist_assignments_needed: u32,

    pub direct_streams_confirmed: bool,
    pub playlists_added_confirmed: bool,
    pub playlists_added_at: Option<DateTime<Utc>>,
    pub removed_from_playlists: bool,

    /// Empty until the first slot assignment.
    pub playlist_assignments: Vec<Slot>,

    pub hidden_until: Option<DateTime<Utc>>,
    pub initial_actions_excluded: bool,
    pub removal_actions_excluded: bool,

    /// Free-form label, not authoritative.
    pub campaign_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,
}

impl Campaign {
    pub fn initial_actions_complete(&self) -> bool {
        self.direct_streams_confirmed && self.playlists_added_confirmed
    }

    pub fn fully_excluded(&self) -> bool {
        self.initial_actions_excluded && self.removal_actions_excluded
    }

    /// Slots that hold, or have held, a playlist.
    pub fn assigned_playlist_count(&self) -> u32 {
        self.playlist_assignments
            .iter()
            .filter(|s| s.was_assigned())
            .count() as u32
    }

    /// Slots not currently holding a playlist.
    pub fn unplaced_slot_count(&self) -> usize {
        self.playlist_assignments
            .iter()
            .filter(|s| !s.is_real())
            .count()
    }

    /// Streams delivered by playlist placement so far. Always recomputed.
    pub fn estimated_streams(&self, ramp: &ProgressRamp, now: DateTime<Utc>) -> i64 {
        ramp.estimate(
            self.playlists_added_at,
            self.assigned_playlist_count(),
            self.playlist_streams_target,
            now,
        )
    }

    pub fn removal_due(&self, ramp: &ProgressRamp, now: DateTime<Utc>) -> bool {
        self.initial_actions_complete()
            && self.estimated_streams(ramp, now) >= self.playlist_streams_target
    }

    pub fn is_hidden(&self, now: DateTime<Utc>) -> bool {
        self.hidden_until.is_some_and(|until| until > now)
    }

    /// Whether the completion grace window (counted from `updated_at`) is over.
    pub fn grace_expired(&self, grace: Duration, now: DateTime<Utc>) -> bool {
        self.updated_at + grace < now
    }
}

/// Fields for a new campaign row.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub order_id: String,
    pub order_number: String,
    pub song_name: String,
    pub song_link: String,
    pub track_id: String,
    pub package_name: String,
    pub package_id: Option<String>,
    pub direct_streams_target: i64,
    pub playlist_streams_target: i64,
    pub time_on_playlists: u32,
    pub playlist_assignments_needed: u32,
}

static SPOTIFY_TRACK_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:open\.spotify\.com/(?:intl-[a-z]+/)?track/|spotify:track:)([A-Za-z0-9]+)")
        .expect("valid regex")
});

/// Track id used to dedupe campaigns within an order.
///
/// Spotify URLs and URIs yield the bare track id; any other link is used
/// as-is (trimmed, without query string).
pub fn extract_track_id(song_link: &str) -> String {
    let link = song_link.trim();
    if let Some(id) = SPOTIFY_TRACK_URL
        .captures(link)
        .and_then(|caps| caps.get(1))
    {
        return id.as_str().to_string();
    }
    link.split(['?', '#']).next().unwrap_or(link).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_track_id_from_url() {
        assert_eq!(
            extract_track_id("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            "4uLU6hMCjMI75M1A2tKUQC"
        );
        assert_eq!(
            extract_track_id("https://open.spotify.com/intl-de/track/4uLU6hMCjMI75M1A2tKUQC"),
            "4uLU6hMCjMI75M1A2tKUQC"
        );
    }

    #[test]
    fn test_extract_track_id_from_uri() {
        assert_eq!(
            extract_track_id("spotify:track:4uLU6hMCjMI75M1A2tKUQC"),
            "4uLU6hMCjMI75M1A2tKUQC"
        );
    }

    #[test]
    fn test_extract_track_id_other_link() {
        assert_eq!(
            extract_track_id(" https://soundcloud.com/artist/song?ref=x "),
            "https://soundcloud.com/artist/song"
        );
    }

    #[test]
    fn test_slot_value_parse() {
        assert_eq!(SlotValue::parse("empty"), Some(SlotValue::Empty));
        assert_eq!(SlotValue::parse("removed"), Some(SlotValue::Removed));
        assert_eq!(
            SlotValue::parse("pl-1"),
            Some(SlotValue::Playlist("pl-1".to_string()))
        );
        assert_eq!(SlotValue::parse("  "), None);
    }

    #[test]
    fn test_slot_serialization_is_tagged() {
        let json = serde_json::to_string(&Slot::Empty).unwrap();
        assert_eq!(json, r#"{"type":"empty"}"#);

        let slot: Slot =
            serde_json::from_str(r#"{"type":"real","id":"p1","name":"Chill"}"#).unwrap();
        assert_eq!(
            slot,
            Slot::Real {
                id: "p1".to_string(),
                name: "Chill".to_string(),
                genre: None
            }
        );

        let removed = Slot::Removed {
            id: "p1".to_string(),
            name: "Chill".to_string(),
        };
        let json = serde_json::to_string(&removed).unwrap();
        assert_eq!(json, r#"{"type":"removed","id":"p1","name":"Chill"}"#);
    }

    #[test]
    fn test_assigned_count_ignores_empty_slots() {
        let mut campaign = crate::testing::fixtures::campaign("c1", "o1", "LEGENDARY");
        campaign.playlist_assignments = vec![
            Slot::Real {
                id: "p1".to_string(),
                name: "Chill".to_string(),
                genre: None,
            },
            Slot::Removed {
                id: "p2".to_string(),
                name: "Gym".to_string(),
            },
            Slot::Empty,
            Slot::Empty,
        ];
        assert_eq!(campaign.assigned_playlist_count(), 2);
        assert_eq!(campaign.unplaced_slot_count(), 3);
    }
}

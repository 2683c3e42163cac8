//! Testing utilities and mock implementations.
//!
//! Provides a scripted SMM panel and fixtures for campaigns and orders, so
//! engine and API tests run without a real panel.
//!
//! # Example
//!
//! ```rust,ignore
//! use spotlight_core::testing::{fixtures, MockSmmPanel};
//!
//! let panel = MockSmmPanel::new();
//! panel.fail_service("102", "Not enough funds on balance");
//!
//! let campaign = fixtures::campaign("c1", "o1", "LEGENDARY");
//! ```

mod mock_smm_panel;

pub use mock_smm_panel::MockSmmPanel;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::campaign::{extract_track_id, Campaign, NewCampaign};
    use crate::order::{Order, OrderItem, OrderStatus, OrderSummary};
    use crate::package::default_package;
    use crate::playlist::Playlist;

    /// Fixed reference time used across tests.
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Campaign fields for a package, targets from the built-in defaults.
    pub fn new_campaign(order_id: &str, track_id: &str, package: &str) -> NewCampaign {
        let config = default_package(package);
        NewCampaign {
            order_id: order_id.to_string(),
            order_number: format!("#{}", order_id),
            song_name: format!("Song {}", track_id),
            song_link: format!("https://open.spotify.com/track/{}", track_id),
            track_id: track_id.to_string(),
            package_name: package.to_string(),
            package_id: None,
            direct_streams_target: config.as_ref().map_or(0, |c| c.direct_streams_target),
            playlist_streams_target: config.as_ref().map_or(0, |c| c.playlist_streams_target),
            time_on_playlists: config.as_ref().map_or(0, |c| c.time_on_playlists),
            playlist_assignments_needed: config
                .as_ref()
                .map_or(0, |c| c.playlist_assignments_needed),
        }
    }

    /// A fresh, unconfirmed campaign created at `now()`.
    pub fn campaign(id: &str, order_id: &str, package: &str) -> Campaign {
        let fields = new_campaign(order_id, &format!("track-{}", id), package);
        Campaign {
            id: id.to_string(),
            order_id: fields.order_id,
            order_number: fields.order_number,
            song_name: fields.song_name,
            song_link: fields.song_link,
            track_id: fields.track_id,
            package_name: fields.package_name,
            package_id: fields.package_id,
            direct_streams_target: fields.direct_streams_target,
            playlist_streams_target: fields.playlist_streams_target,
            time_on_playlists: fields.time_on_playlists,
            playlist_assignments_needed: fields.playlist_assignments_needed,
            direct_streams_confirmed: false,
            playlists_added_confirmed: false,
            playlists_added_at: None,
            removed_from_playlists: false,
            playlist_assignments: Vec::new(),
            hidden_until: None,
            initial_actions_excluded: false,
            removal_actions_excluded: false,
            campaign_status: "active".to_string(),
            created_at: now(),
            updated_at: now(),
            version: 1,
        }
    }

    /// A processing order created at `now()`.
    pub fn order_summary(id: &str) -> OrderSummary {
        OrderSummary {
            id: id.to_string(),
            order_number: format!("#{}", id),
            customer_name: format!("Customer {}", id),
            created_at: now(),
            status: OrderStatus::Processing,
        }
    }

    /// A processing order with one line item per `(song link, package)`.
    pub fn order(id: &str, items: &[(&str, &str)]) -> Order {
        Order {
            summary: order_summary(id),
            items: items
                .iter()
                .map(|(link, package)| OrderItem {
                    song_name: format!("Song {}", extract_track_id(link)),
                    song_link: link.to_string(),
                    package_name: package.to_string(),
                    package_id: None,
                })
                .collect(),
        }
    }

    pub fn playlist(id: &str, name: &str, is_active: bool) -> Playlist {
        Playlist {
            id: id.to_string(),
            name: name.to_string(),
            genre: Some("pop".to_string()),
            is_active,
        }
    }
}

//! Playlist slot management.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use super::{Campaign, Slot, SlotValue};
use crate::package::{PackageCatalog, PackageError};
use crate::playlist::{PlaylistDirectory, PlaylistError};

#[derive(Debug, Error)]
pub enum SlotError {
    /// Playlist does not exist or is inactive.
    #[error("Active playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("Slot index {index} out of range ({len} slots)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Only a slot holding a playlist can be marked removed.
    #[error("Slot {0} holds no playlist to remove")]
    NothingToRemove(usize),

    /// Slot count could not be resolved from package configuration.
    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Directory(#[from] PlaylistError),
}

/// Maintains a campaign's ordered playlist slots.
///
/// Slot arrays start empty and are sized on the first assignment to slot 0.
/// They never shrink; only slot content changes.
#[derive(Clone)]
pub struct PlaylistSlotManager {
    packages: PackageCatalog,
    playlists: Arc<dyn PlaylistDirectory>,
}

impl PlaylistSlotManager {
    pub fn new(packages: PackageCatalog, playlists: Arc<dyn PlaylistDirectory>) -> Self {
        Self {
            packages,
            playlists,
        }
    }

    /// Turn a requested value into content for the slot at `index`.
    ///
    /// `Removed` keeps the playlist the slot held; it is rejected on a slot
    /// that never held one. Marking an already removed slot is a no-op.
    pub fn resolve(
        &self,
        campaign: &Campaign,
        index: usize,
        value: &SlotValue,
    ) -> Result<Slot, SlotError> {
        match value {
            SlotValue::Empty => Ok(Slot::Empty),
            SlotValue::Removed => match campaign.playlist_assignments.get(index) {
                Some(Slot::Real { id, name, .. }) => Ok(Slot::Removed {
                    id: id.clone(),
                    name: name.clone(),
                }),
                Some(removed @ Slot::Removed { .. }) => Ok(removed.clone()),
                Some(Slot::Empty) => Err(SlotError::NothingToRemove(index)),
                None => Err(SlotError::IndexOutOfRange {
                    index,
                    len: campaign.playlist_assignments.len(),
                }),
            },
            SlotValue::Playlist(id) => match self.playlists.get(id)? {
                Some(playlist) if playlist.is_active => Ok(Slot::Real {
                    id: playlist.id,
                    name: playlist.name,
                    genre: playlist.genre,
                }),
                _ => Err(SlotError::PlaylistNotFound(id.clone())),
            },
        }
    }

    /// Size the slot array from package configuration when slot 0 is the
    /// first one assigned.
    ///
    /// An initialized array shorter than the package now requires is padded
    /// with `Empty` slots.
    pub fn ensure_initialized(&self, campaign: &mut Campaign, index: usize) -> Result<(), SlotError> {
        let initialized = !campaign.playlist_assignments.is_empty();
        if !initialized && index != 0 {
            return Ok(());
        }

        let needed = self.packages.slots_needed(&campaign.package_name)?;
        let len = campaign.playlist_assignments.len();
        if (needed as usize) > len {
            debug!(
                campaign_id = %campaign.id,
                package = %campaign.package_name,
                from = len,
                to = needed,
                "Sizing playlist slots"
            );
            campaign
                .playlist_assignments
                .resize(needed as usize, Slot::Empty);
        }
        campaign.playlist_assignments_needed =
            campaign.playlist_assignments_needed.max(needed);
        Ok(())
    }

    /// Write `slot` at `index`. The array must already cover `index`.
    pub fn apply(
        &self,
        campaign: &mut Campaign,
        index: usize,
        slot: Slot,
        now: DateTime<Utc>,
    ) -> Result<(), SlotError> {
        let len = campaign.playlist_assignments.len();
        let target = campaign
            .playlist_assignments
            .get_mut(index)
            .ok_or(SlotError::IndexOutOfRange { index, len })?;
        *target = slot;
        campaign.updated_at = now;
        Ok(())
    }

    /// `ensure_initialized`, `resolve`, then `apply`.
    ///
    /// Works on a copy so a rejected value leaves the campaign untouched.
    pub fn set_slot(
        &self,
        campaign: &mut Campaign,
        index: usize,
        value: &SlotValue,
        now: DateTime<Utc>,
    ) -> Result<(), SlotError> {
        let mut updated = campaign.clone();
        self.ensure_initialized(&mut updated, index)?;
        let slot = self.resolve(&updated, index, value)?;
        self.apply(&mut updated, index, slot, now)?;
        *campaign = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{Playlist, SqlitePlaylistDirectory};
    use crate::testing::fixtures;
    use chrono::Duration;

    fn manager() -> PlaylistSlotManager {
        let directory = SqlitePlaylistDirectory::in_memory().unwrap();
        directory
            .upsert(&Playlist {
                id: "pl-chill".to_string(),
                name: "Chill Vibes".to_string(),
                genre: Some("lofi".to_string()),
                is_active: true,
            })
            .unwrap();
        directory
            .upsert(&Playlist {
                id: "pl-old".to_string(),
                name: "Retired".to_string(),
                genre: None,
                is_active: false,
            })
            .unwrap();
        PlaylistSlotManager::new(PackageCatalog::defaults_only(), Arc::new(directory))
    }

    #[test]
    fn test_first_assignment_initializes_legendary_slots() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "LEGENDARY");
        let now = fixtures::now();

        manager
            .set_slot(
                &mut campaign,
                0,
                &SlotValue::Playlist("pl-chill".to_string()),
                now,
            )
            .unwrap();

        assert_eq!(campaign.playlist_assignments.len(), 4);
        assert!(matches!(
            &campaign.playlist_assignments[0],
            Slot::Real { id, genre: Some(g), .. } if id == "pl-chill" && g == "lofi"
        ));
        assert!(campaign.playlist_assignments[1..].iter().all(Slot::is_empty));
        assert_eq!(campaign.updated_at, now);
    }

    #[test]
    fn test_legacy_alias_resolves_slot_count() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "Ultimate Package");
        manager
            .set_slot(&mut campaign, 0, &SlotValue::Empty, fixtures::now())
            .unwrap();
        assert_eq!(campaign.playlist_assignments.len(), 4);
    }

    #[test]
    fn test_removed_keeps_former_playlist() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "BREAKTHROUGH");
        let now = fixtures::now();
        manager
            .set_slot(&mut campaign, 0, &SlotValue::Playlist("pl-chill".to_string()), now)
            .unwrap();

        manager
            .set_slot(&mut campaign, 0, &SlotValue::Removed, now)
            .unwrap();
        assert_eq!(
            campaign.playlist_assignments[0],
            Slot::Removed {
                id: "pl-chill".to_string(),
                name: "Chill Vibes".to_string(),
            }
        );

        // Marking again changes nothing.
        manager
            .set_slot(&mut campaign, 0, &SlotValue::Removed, now)
            .unwrap();
        assert_eq!(campaign.assigned_playlist_count(), 1);
    }

    #[test]
    fn test_removed_rejected_on_slot_without_playlist() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "LEGENDARY");

        // First assignment would size the array, but the value is still rejected.
        let result = manager.set_slot(&mut campaign, 0, &SlotValue::Removed, fixtures::now());
        let err = result.unwrap_err();
        assert!(matches!(err, SlotError::NothingToRemove(0)));
        assert_eq!(err.to_string(), "Slot 0 holds no playlist to remove");
        assert!(campaign.playlist_assignments.is_empty());

        manager
            .set_slot(&mut campaign, 0, &SlotValue::Empty, fixtures::now())
            .unwrap();
        for index in 0..4 {
            let result =
                manager.set_slot(&mut campaign, index, &SlotValue::Removed, fixtures::now());
            assert!(matches!(result, Err(SlotError::NothingToRemove(i)) if i == index));
        }
        assert_eq!(campaign.assigned_playlist_count(), 0);
    }

    #[test]
    fn test_uninitialized_nonzero_index_rejected() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "LEGENDARY");
        let result = manager.set_slot(&mut campaign, 2, &SlotValue::Empty, fixtures::now());
        assert!(matches!(
            result,
            Err(SlotError::IndexOutOfRange { index: 2, len: 0 })
        ));
        assert!(campaign.playlist_assignments.is_empty());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "BREAKTHROUGH");
        manager
            .set_slot(&mut campaign, 0, &SlotValue::Empty, fixtures::now())
            .unwrap();
        let before = campaign.clone();

        let result = manager.set_slot(
            &mut campaign,
            1,
            &SlotValue::Empty,
            fixtures::now() + Duration::hours(1),
        );
        assert!(matches!(result, Err(SlotError::IndexOutOfRange { .. })));
        assert_eq!(campaign, before);
    }

    #[test]
    fn test_unknown_or_inactive_playlist_rejected() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "LEGENDARY");

        for id in ["pl-missing", "pl-old"] {
            let result = manager.set_slot(
                &mut campaign,
                0,
                &SlotValue::Playlist(id.to_string()),
                fixtures::now(),
            );
            assert!(matches!(result, Err(SlotError::PlaylistNotFound(_))));
        }
        assert!(campaign.playlist_assignments.is_empty());
    }

    #[test]
    fn test_unknown_package_is_configuration_error() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "Mystery Box");
        let result = manager.set_slot(&mut campaign, 0, &SlotValue::Empty, fixtures::now());
        assert!(matches!(
            result,
            Err(SlotError::Package(PackageError::Unresolved(_)))
        ));
    }

    #[test]
    fn test_slot_count_never_shrinks() {
        let manager = manager();
        let mut campaign = fixtures::campaign("c1", "o1", "BREAKTHROUGH");
        campaign.playlist_assignments = vec![
            Slot::Empty,
            Slot::Empty,
            Slot::Removed {
                id: "pl-chill".to_string(),
                name: "Chill Vibes".to_string(),
            },
        ];

        manager
            .set_slot(&mut campaign, 2, &SlotValue::Empty, fixtures::now())
            .unwrap();
        assert_eq!(campaign.playlist_assignments.len(), 3);
    }
}

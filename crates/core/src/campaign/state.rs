//! Campaign lifecycle.
//!
//! The stage is never stored. It is projected from the confirmation and
//! exclusion flags so the queue, the sweeper and the console all agree:
//!
//! ```text
//! AwaitingInitialActions -> InitialActionsComplete (grace) -> AwaitingRemoval
//!                                                                  |
//!                                    Excluded <- Removed (grace) <-+
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::Campaign;
use crate::progress::ProgressRamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStage {
    AwaitingInitialActions,
    InitialActionsComplete,
    AwaitingRemoval,
    Removed,
    Excluded,
}

impl CampaignStage {
    pub fn project(campaign: &Campaign, ramp: &ProgressRamp, now: DateTime<Utc>) -> Self {
        if campaign.fully_excluded() {
            CampaignStage::Excluded
        } else if campaign.removed_from_playlists {
            CampaignStage::Removed
        } else if campaign.removal_due(ramp, now) {
            CampaignStage::AwaitingRemoval
        } else if campaign.initial_actions_complete() {
            CampaignStage::InitialActionsComplete
        } else {
            CampaignStage::AwaitingInitialActions
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStage::AwaitingInitialActions => "awaiting_initial_actions",
            CampaignStage::InitialActionsComplete => "initial_actions_complete",
            CampaignStage::AwaitingRemoval => "awaiting_removal",
            CampaignStage::Removed => "removed",
            CampaignStage::Excluded => "excluded",
        }
    }
}

impl fmt::Display for CampaignStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Playlists cannot be confirmed until every slot holds a playlist.
    #[error("{unplaced} of {needed} playlist slots hold no playlist")]
    SlotsIncomplete { unplaced: usize, needed: u32 },

    /// Removal requires both initial confirmations.
    #[error("initial actions are not complete")]
    InitialActionsIncomplete,

    #[error("campaign already removed from playlists")]
    AlreadyRemoved,

    /// `hide` needs a point in the future.
    #[error("hide time must be in the future")]
    HideNotInFuture,
}

impl Campaign {
    /// Set once a full SMM submission succeeded.
    pub fn confirm_direct_streams(&mut self, now: DateTime<Utc>) {
        self.direct_streams_confirmed = true;
        self.updated_at = now;
    }

    /// Admin confirmation that every slot's playlist now carries the song.
    ///
    /// Every slot must be `Real`; `Empty` and `Removed` slots block it.
    /// Re-confirming keeps the original `playlists_added_at`, which drives
    /// the stream estimate.
    pub fn confirm_playlists_added(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let unplaced = if self.playlist_assignments.is_empty() {
            self.playlist_assignments_needed as usize
        } else {
            self.unplaced_slot_count()
        };
        if unplaced > 0 || self.playlist_assignments.is_empty() {
            return Err(TransitionError::SlotsIncomplete {
                unplaced,
                needed: self.playlist_assignments_needed,
            });
        }

        if !self.playlists_added_confirmed {
            self.playlists_added_confirmed = true;
            self.playlists_added_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn confirm_removal(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.initial_actions_complete() {
            return Err(TransitionError::InitialActionsIncomplete);
        }
        if self.removed_from_playlists {
            return Err(TransitionError::AlreadyRemoved);
        }
        self.removed_from_playlists = true;
        self.updated_at = now;
        Ok(())
    }

    pub fn hide(&mut self, until: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if until <= now {
            return Err(TransitionError::HideNotInFuture);
        }
        self.hidden_until = Some(until);
        self.updated_at = now;
        Ok(())
    }
}

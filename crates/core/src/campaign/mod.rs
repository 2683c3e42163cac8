//! Campaigns: one song + package fulfillment unit within an order.

mod slots;
mod sqlite_store;
mod state;
mod store;
mod types;

pub use slots::{PlaylistSlotManager, SlotError};
pub use sqlite_store::SqliteCampaignStore;
pub use state::{CampaignStage, TransitionError};
pub use store::{update_with_retry, CampaignError, CampaignFilter, CampaignStore};
pub use types::{extract_track_id, Campaign, NewCampaign, Slot, SlotValue};

//! SMM panel integration: panel client, order set templates, purchase log
//! and the direct-stream submission service.

mod client;
mod order_sets;
mod purchase_log;
mod submission;
mod types;

pub use client::PanelClient;
pub use order_sets::{OrderSet, OrderSetError, OrderSetInput, OrderSetStore, SqliteOrderSetStore};
pub use purchase_log::{
    PurchaseLogEntry, PurchaseLogError, PurchaseLogStore, PurchaseStatus, SqlitePurchaseLogStore,
};
pub use submission::{SetResult, SubmissionError, SubmissionOutcome, SubmissionService};
pub use types::*;

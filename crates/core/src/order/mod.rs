//! Order Store collaborator.
//!
//! Orders and their line items are owned by the order-management side; the
//! engine only reads them (to import campaigns and to join customer/status
//! data into the action queue).

mod sqlite_store;
mod types;

pub use sqlite_store::SqliteOrderStore;
pub use types::*;

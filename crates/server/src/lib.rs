//! Admin Console HTTP surface over the spotlight campaign engine.

pub mod api;
pub mod metrics;
pub mod state;

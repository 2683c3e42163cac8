//! Engine-level error taxonomy.
//!
//! Module errors collapse into six classes that callers (the HTTP layer in
//! particular) can act on without knowing which component failed.

use thiserror::Error;

use crate::audit::AuditError;
use crate::campaign::{CampaignError, SlotError, TransitionError};
use crate::order::OrderError;
use crate::package::PackageError;
use crate::playlist::PlaylistError;
use crate::smm::{OrderSetError, PurchaseLogError, SmmError, SubmissionError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing package config, API key or order sets. Not retryable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The SMM panel failed or rejected the request.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Rejected before any state was changed.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Lost a concurrent update race, or the action was already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "configuration",
            EngineError::ExternalService(_) => "external_service",
            EngineError::Validation(_) => "validation",
            EngineError::NotFound(_) => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::Storage(_) => "storage",
        }
    }
}

impl From<CampaignError> for EngineError {
    fn from(e: CampaignError) -> Self {
        match e {
            CampaignError::NotFound(_) => EngineError::NotFound(e.to_string()),
            CampaignError::Conflict { .. } => EngineError::Conflict(e.to_string()),
            CampaignError::Database(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<OrderError> for EngineError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotFound(_) => EngineError::NotFound(e.to_string()),
            OrderError::Database(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<PackageError> for EngineError {
    fn from(e: PackageError) -> Self {
        match e {
            PackageError::Unresolved(_) => EngineError::Configuration(e.to_string()),
            PackageError::Database(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<PlaylistError> for EngineError {
    fn from(e: PlaylistError) -> Self {
        match e {
            PlaylistError::Database(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<SlotError> for EngineError {
    fn from(e: SlotError) -> Self {
        match e {
            SlotError::PlaylistNotFound(_) => EngineError::NotFound(e.to_string()),
            SlotError::IndexOutOfRange { .. } | SlotError::NothingToRemove(_) => {
                EngineError::Validation(e.to_string())
            }
            SlotError::Package(inner) => inner.into(),
            SlotError::Directory(inner) => inner.into(),
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::AlreadyRemoved => EngineError::Conflict(e.to_string()),
            TransitionError::SlotsIncomplete { .. }
            | TransitionError::InitialActionsIncomplete
            | TransitionError::HideNotInFuture => EngineError::Validation(e.to_string()),
        }
    }
}

impl From<SmmError> for EngineError {
    fn from(e: SmmError) -> Self {
        match e {
            SmmError::NotConfigured(_) => EngineError::Configuration(e.to_string()),
            _ => EngineError::ExternalService(e.to_string()),
        }
    }
}

impl From<SubmissionError> for EngineError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::NotConfigured(_) | SubmissionError::NoOrderSets(_) => {
                EngineError::Configuration(e.to_string())
            }
            SubmissionError::OrderSets(inner) => inner.into(),
            SubmissionError::PurchaseLog(inner) => inner.into(),
        }
    }
}

impl From<OrderSetError> for EngineError {
    fn from(e: OrderSetError) -> Self {
        match e {
            OrderSetError::NotFound(_) => EngineError::NotFound(e.to_string()),
            OrderSetError::Invalid(_) => EngineError::Validation(e.to_string()),
            OrderSetError::Database(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<PurchaseLogError> for EngineError {
    fn from(e: PurchaseLogError) -> Self {
        match e {
            PurchaseLogError::Database(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<AuditError> for EngineError {
    fn from(e: AuditError) -> Self {
        EngineError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_errors_map_to_classes() {
        let e: EngineError = SlotError::PlaylistNotFound("pl-1".to_string()).into();
        assert_eq!(e.kind(), "not_found");

        let e: EngineError = SlotError::IndexOutOfRange { index: 5, len: 4 }.into();
        assert_eq!(e.kind(), "validation");

        let e: EngineError = SlotError::NothingToRemove(0).into();
        assert_eq!(e.kind(), "validation");

        let e: EngineError = SlotError::Package(PackageError::Unresolved("X".to_string())).into();
        assert_eq!(e.kind(), "configuration");
    }

    #[test]
    fn test_submission_errors_map_to_configuration() {
        let e: EngineError = SubmissionError::NoOrderSets("LEGENDARY".to_string()).into();
        assert_eq!(e.kind(), "configuration");

        let e: EngineError = SmmError::NotConfigured("no key".to_string()).into();
        assert_eq!(e.kind(), "configuration");

        let e: EngineError = SmmError::Timeout.into();
        assert_eq!(e.kind(), "external_service");
    }

    #[test]
    fn test_transition_errors() {
        let e: EngineError = TransitionError::AlreadyRemoved.into();
        assert_eq!(e.kind(), "conflict");
        let e: EngineError = TransitionError::HideNotInFuture.into();
        assert_eq!(e.kind(), "validation");
    }
}

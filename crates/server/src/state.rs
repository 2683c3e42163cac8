use std::sync::Arc;

use spotlight_core::{AuditStore, Authenticator, CampaignEngine, Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit_store: Arc<dyn AuditStore>,
    engine: Arc<CampaignEngine>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit_store: Arc<dyn AuditStore>,
        engine: Arc<CampaignEngine>,
    ) -> Self {
        Self {
            config,
            authenticator,
            audit_store,
            engine,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn engine(&self) -> &CampaignEngine {
        &self.engine
    }
}

pub mod audit;
pub mod auth;
pub mod campaign;
pub mod config;
pub mod deadline;
pub mod engine;
pub mod metrics;
pub mod order;
pub mod package;
pub mod playlist;
pub mod progress;
pub mod queue;
pub mod smm;
pub mod sweeper;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditEventEnvelope, AuditEventKind, AuditFilter,
    AuditHandle, AuditRecord, AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, AdminKeyGate, AuthError, AuthRequest, Authenticator, Identity, OpenGate,
};
pub use campaign::{
    extract_track_id, Campaign, CampaignError, CampaignFilter, CampaignStage, CampaignStore,
    NewCampaign, PlaylistSlotManager, Slot, SlotError, SlotValue, SqliteCampaignStore,
    TransitionError,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DatabaseConfig, EngineConfig, SanitizedConfig, ServerConfig, SmmPanelConfig,
};
pub use deadline::{DeadlinePolicy, DeadlineStatus, EscalationBand};
pub use engine::{CampaignEngine, CampaignView, DirectStreamsReport, EngineError, ImportReport};
pub use order::{Order, OrderError, OrderItem, OrderStatus, OrderStore, OrderSummary, SqliteOrderStore};
pub use package::{PackageCatalog, PackageConfig, PackageError, PackageStore, SqlitePackageStore};
pub use playlist::{Playlist, PlaylistDirectory, PlaylistError, SqlitePlaylistDirectory};
pub use progress::ProgressRamp;
pub use queue::{ActionItem, ActionStatus, ActionType, QueueBuilder, QueueOptions};
pub use smm::{
    OrderSet, OrderSetError, OrderSetInput, OrderSetStore, PanelClient, PurchaseLogEntry,
    PurchaseLogStore, SmmError, SmmPanel, SqliteOrderSetStore, SqlitePurchaseLogStore,
    SubmissionError, SubmissionOutcome, SubmissionService,
};
pub use sweeper::SweepReport;

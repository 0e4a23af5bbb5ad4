//! ESP Core
//!
//! Preview lifecycle, apply gating, enhancement history and rollback on top
//! of the enhancer, safety and diff crates.
//!
//! # Lifecycle
//!
//! ```text
//! create_preview ─► pending ─► approve ─► approved ─► apply ─► applied ─► rollback
//!                      │                     │
//!                      ├─► reject            └─► expired (sweep or inline check)
//!                      └─► expired
//! ```
//!
//! Enhancement, apply and rollback of one document are serialized by a
//! per-document lock. Preview status changes are compare-and-set, so a
//! request and the expiration sweep racing on one preview have exactly one
//! winner.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod clock;
mod config;
mod error;
mod history;
mod ids;
mod locks;
mod preview;
mod preview_store;
mod service;
mod store;
mod sweeper;
mod telemetry;
mod upstream;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PipelineConfig;
pub use error::{ConfigError, PreviewError, RollbackError, SinkError, StorageError};
pub use history::{EnhancementRecord, HistoryFilter, RollbackBackup, RollbackPoint, SafetyScoreSummary};
pub use ids::{BackupId, EnhancementId, PreviewId, ValidationId};
pub use locks::{DocumentGuard, DocumentLocks};
pub use preview::{allowed_transitions, validate_transition, Preview, PreviewFilter, PreviewStatus};
pub use preview_store::{ClaimToken, PreviewStorage};
pub use service::{
    ApplyConfirmation, CreatePreviewRequest, EnhancementService, EnhancementServiceBuilder, MaintenanceReport,
};
pub use store::{
    DocumentStorage, FsDocumentStorage, InMemoryDocumentStorage, InMemoryRecordStore, JsonFileRecordStore,
    RecordStore,
};
pub use sweeper::{ExpirationSweeper, SweeperHandle};
pub use telemetry::{init_json_tracing, init_tracing};
pub use upstream::{NoopSink, RecommendationSink};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for callers
pub mod prelude {
    pub use crate::{
        ApplyConfirmation, CreatePreviewRequest, EnhancementRecord, EnhancementService, HistoryFilter, PipelineConfig,
        Preview, PreviewError, PreviewFilter, PreviewId, PreviewStatus, RollbackError,
    };
    pub use esp_document::{Document, DocumentRef, Recommendation, RecommendationCategory, TargetLocator};
    pub use esp_safety::PreservationRules;
}

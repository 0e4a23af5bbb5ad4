//! Enhancement service facade
//!
//! Ties the enhancer, safety scoring, diffing, preview lifecycle and history
//! together behind the operations exposed to orchestration layers. Storage
//! has no cross-entity transactions, so apply and rollback order their
//! writes such that every failure before the commit point can be undone.

use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, PreviewError, RollbackError, StorageError};
use crate::history::{EnhancementRecord, HistoryFilter, RollbackBackup, RollbackPoint, SafetyScoreSummary};
use crate::ids::{BackupId, EnhancementId, PreviewId, ValidationId};
use crate::locks::{DocumentGuard, DocumentLocks};
use crate::preview::{Preview, PreviewFilter, PreviewStatus};
use crate::preview_store::PreviewStorage;
use crate::store::{bounded, DocumentStorage, InMemoryDocumentStorage, InMemoryRecordStore, RecordStore};
use crate::upstream::{NoopSink, RecommendationSink};
use chrono::{DateTime, Utc};
use esp_diff::DiffGenerator;
use esp_document::{Document, DocumentRef, Recommendation};
use esp_enhancer::{EnhanceError, GenerationService, RecommendationEnhancer, UnavailableGeneration};
use esp_safety::{EditValidator, PreCheckError, PreservationRules};
use std::sync::Arc;
use tracing::{info, warn};

/// Input to [`EnhancementService::create_preview`]
#[derive(Debug, Clone)]
pub struct CreatePreviewRequest {
    pub document_ref: DocumentRef,
    pub validation_id: ValidationId,
    /// Applied in this order
    pub recommendations: Vec<Recommendation>,
    pub rules: PreservationRules,
}

impl CreatePreviewRequest {
    pub fn new(
        document_ref: impl Into<DocumentRef>,
        validation_id: impl Into<ValidationId>,
        recommendations: Vec<Recommendation>,
    ) -> Self {
        Self {
            document_ref: document_ref.into(),
            validation_id: validation_id.into(),
            recommendations,
            rules: PreservationRules::default(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: PreservationRules) -> Self {
        self.rules = rules;
        self
    }
}

/// Caller intent for [`EnhancementService::apply_preview`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyConfirmation {
    /// Must be set; apply never proceeds on an implicit yes
    pub confirmed: bool,
    pub applied_by: String,
}

impl ApplyConfirmation {
    pub fn confirmed(applied_by: impl Into<String>) -> Self {
        Self {
            confirmed: true,
            applied_by: applied_by.into(),
        }
    }

    pub fn unconfirmed(applied_by: impl Into<String>) -> Self {
        Self {
            confirmed: false,
            applied_by: applied_by.into(),
        }
    }
}

/// Counts from one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub previews_expired: usize,
    pub previews_purged: usize,
    pub rollback_points_removed: usize,
}

/// Builder for [`EnhancementService`]
///
/// Every backend defaults to in-memory storage; generation defaults to a
/// service that is always unavailable.
pub struct EnhancementServiceBuilder {
    config: PipelineConfig,
    generator: Arc<dyn GenerationService>,
    documents: Arc<dyn DocumentStorage>,
    preview_backend: Option<Arc<dyn RecordStore<Preview>>>,
    records: Arc<dyn RecordStore<EnhancementRecord>>,
    rollback_points: Arc<dyn RecordStore<RollbackPoint>>,
    backups: Arc<dyn RecordStore<RollbackBackup>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn RecommendationSink>,
}

impl Default for EnhancementServiceBuilder {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            generator: Arc::new(UnavailableGeneration),
            documents: Arc::new(InMemoryDocumentStorage::new()),
            preview_backend: None,
            records: Arc::new(InMemoryRecordStore::new()),
            rollback_points: Arc::new(InMemoryRecordStore::new()),
            backups: Arc::new(InMemoryRecordStore::new()),
            clock: Arc::new(SystemClock),
            sink: Arc::new(NoopSink),
        }
    }
}

impl EnhancementServiceBuilder {
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn GenerationService>) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_document_storage(mut self, documents: Arc<dyn DocumentStorage>) -> Self {
        self.documents = documents;
        self
    }

    /// Mirror previews into a durable store
    #[must_use]
    pub fn with_preview_backend(mut self, backend: Arc<dyn RecordStore<Preview>>) -> Self {
        self.preview_backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_record_store(mut self, records: Arc<dyn RecordStore<EnhancementRecord>>) -> Self {
        self.records = records;
        self
    }

    #[must_use]
    pub fn with_rollback_store(mut self, points: Arc<dyn RecordStore<RollbackPoint>>) -> Self {
        self.rollback_points = points;
        self
    }

    #[must_use]
    pub fn with_backup_store(mut self, backups: Arc<dyn RecordStore<RollbackBackup>>) -> Self {
        self.backups = backups;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RecommendationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate the configuration and assemble the service
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for out-of-range configuration
    pub fn build(self) -> Result<EnhancementService, ConfigError> {
        self.config.validate()?;
        let enhancer = RecommendationEnhancer::new(self.generator)
            .with_validator(EditValidator::new(self.config.validation.clone()))
            .with_config(self.config.enhancer_config());
        let mut previews = PreviewStorage::new(self.config.storage_timeout());
        if let Some(backend) = self.preview_backend {
            previews = previews.with_backend(backend);
        }
        Ok(EnhancementService {
            enhancer,
            diff: DiffGenerator::new(),
            documents: self.documents,
            previews,
            records: self.records,
            rollback_points: self.rollback_points,
            backups: self.backups,
            locks: DocumentLocks::new(),
            clock: self.clock,
            sink: self.sink,
            config: self.config,
        })
    }
}

/// Preview, apply and rollback operations over one set of backends
pub struct EnhancementService {
    config: PipelineConfig,
    enhancer: RecommendationEnhancer,
    diff: DiffGenerator,
    documents: Arc<dyn DocumentStorage>,
    previews: PreviewStorage,
    records: Arc<dyn RecordStore<EnhancementRecord>>,
    rollback_points: Arc<dyn RecordStore<RollbackPoint>>,
    backups: Arc<dyn RecordStore<RollbackBackup>>,
    locks: DocumentLocks,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn RecommendationSink>,
}

impl std::fmt::Debug for EnhancementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementService")
            .field("config", &self.config)
            .field("previews", &self.previews)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl EnhancementService {
    #[must_use]
    pub fn builder() -> EnhancementServiceBuilder {
        EnhancementServiceBuilder::default()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn previews(&self) -> &PreviewStorage {
        &self.previews
    }

    #[inline]
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reload persisted previews after a restart
    ///
    /// # Errors
    /// Returns error if the preview backend cannot be scanned
    pub async fn recover(&self) -> Result<usize, StorageError> {
        self.previews.recover().await
    }

    /// Run the enhancer over a stored document and store the result as a
    /// pending preview
    ///
    /// # Errors
    /// Blocking pre-check failures surface as [`PreviewError::Enhance`] and no
    /// preview is created.
    pub async fn create_preview(&self, request: CreatePreviewRequest) -> Result<Preview, PreviewError> {
        let document_ref = request.document_ref;
        let _guard = self
            .lock(&document_ref)
            .await
            .ok_or_else(|| PreviewError::LockTimeout(document_ref.clone()))?;

        let original = match self.read(&document_ref).await {
            Ok(document) => document,
            Err(StorageError::Document(e)) => {
                return Err(EnhanceError::from(PreCheckError::UnreadableDocument(e.to_string())).into());
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = self
            .enhancer
            .enhance(&original, &request.recommendations, &request.rules)
            .await?;
        let (report, safety_score) = self
            .enhancer
            .validator()
            .score(&original, &outcome.candidate, &request.rules);
        for warning in &report.warnings {
            warn!(document = %document_ref, warning = %warning, "Post-enhancement warning");
        }
        let diff = self
            .diff
            .generate(document_ref.as_str(), original.content(), outcome.candidate.content());

        let now = self.clock.now();
        let preview = Preview {
            id: PreviewId::new(),
            validation_id: request.validation_id,
            original_content: original.content().to_string(),
            enhanced_content: outcome.candidate.content().to_string(),
            original_hash: *original.hash(),
            enhanced_hash: *outcome.candidate.hash(),
            stats: diff.stats,
            diff,
            applied_recommendations: outcome.applied_ids(),
            skipped_recommendations: outcome.skipped,
            safety_score,
            warnings: report.warnings,
            status: PreviewStatus::Pending,
            created_at: now,
            expires_at: now + self.config.preview_ttl(),
            approved_by: None,
            approved_at: None,
            rejected_at: None,
            applied_at: None,
            closed_at: None,
            document_ref,
        };
        self.previews.insert(preview.clone()).await?;

        info!(
            preview = %preview.id,
            document = %preview.document_ref,
            applied = preview.applied_recommendations.len(),
            skipped = preview.skipped_recommendations.len(),
            overall = preview.safety_score.overall,
            safe = preview.is_safe_to_apply(),
            "Preview created"
        );
        Ok(preview)
    }

    /// # Errors
    /// Returns [`PreviewError::NotFound`] for an unknown id
    pub fn get_preview(&self, id: &PreviewId) -> Result<Preview, PreviewError> {
        self.previews.get(id).ok_or(PreviewError::NotFound(*id))
    }

    /// `pending -> approved`
    ///
    /// # Errors
    /// `NotFound`, `Expired` or `InvalidTransition`
    pub async fn approve_preview(&self, id: &PreviewId, approver: &str) -> Result<Preview, PreviewError> {
        let preview = self.previews.approve(id, approver, self.clock.now()).await?;
        info!(preview = %id, approver, "Preview approved");
        Ok(preview)
    }

    /// `pending -> rejected`
    ///
    /// # Errors
    /// `NotFound`, `Expired` or `InvalidTransition`
    pub async fn reject_preview(&self, id: &PreviewId) -> Result<Preview, PreviewError> {
        let preview = self.previews.reject(id, self.clock.now()).await?;
        info!(preview = %id, "Preview rejected");
        Ok(preview)
    }

    #[must_use]
    pub fn list_previews(&self, filter: &PreviewFilter) -> Vec<Preview> {
        self.previews.list(filter)
    }

    /// Write an approved preview to storage and record it
    ///
    /// Order: claim, stale check, rollback point, document write, read-back
    /// verification, history record, `approved -> applied`, upstream
    /// notification. A failure before the status change undoes the earlier
    /// writes and releases the claim.
    ///
    /// # Errors
    /// Precondition failures (`ConfirmationRequired`, `NotApproved`,
    /// `Expired`, `Unsafe`, `StaleDocument`) leave storage untouched.
    pub async fn apply_preview(
        &self,
        id: &PreviewId,
        confirmation: &ApplyConfirmation,
    ) -> Result<EnhancementRecord, PreviewError> {
        if !confirmation.confirmed {
            return Err(PreviewError::ConfirmationRequired(*id));
        }
        let document_ref = self.get_preview(id)?.document_ref;
        let _guard = self
            .lock(&document_ref)
            .await
            .ok_or_else(|| PreviewError::LockTimeout(document_ref.clone()))?;

        let now = self.clock.now();
        let (preview, token) = self.previews.claim_for_apply(id, now).await?;
        if !preview.is_safe_to_apply() {
            self.previews.release_claim(id, token);
            return Err(PreviewError::Unsafe {
                id: *id,
                overall: preview.safety_score.overall,
                critical: preview.safety_score.critical_count(),
            });
        }

        let record = match self.write_applied(&preview, &confirmation.applied_by, now).await {
            Ok(record) => record,
            Err(e) => {
                self.previews.release_claim(id, token);
                return Err(e);
            }
        };

        if let Err(e) = self.previews.complete_apply(id, token, now).await {
            self.undo_apply(&preview, record.enhancement_id).await;
            self.delete_record(&record.enhancement_id).await;
            self.previews.release_claim(id, token);
            return Err(e);
        }

        info!(
            preview = %id,
            enhancement = %record.enhancement_id,
            document = %record.document_ref,
            applied_by = %record.applied_by,
            "Preview applied"
        );

        if let Err(e) = self
            .sink
            .mark_applied(&record.validation_id, &record.recommendations_applied)
            .await
        {
            warn!(
                enhancement = %record.enhancement_id,
                error = %e,
                retryable = e.is_retryable(),
                "Failed to notify recommendation source"
            );
        }
        Ok(record)
    }

    /// Storage half of apply; undoes itself on failure
    async fn write_applied(
        &self,
        preview: &Preview,
        applied_by: &str,
        now: DateTime<Utc>,
    ) -> Result<EnhancementRecord, PreviewError> {
        let current = self.read(&preview.document_ref).await?;
        if current.hash() != &preview.original_hash {
            return Err(PreviewError::StaleDocument {
                id: preview.id,
                document: preview.document_ref.clone(),
            });
        }

        let enhancement_id = EnhancementId::new();
        let point = RollbackPoint {
            enhancement_id,
            document_ref: preview.document_ref.clone(),
            content_snapshot: current.content().to_string(),
            created_at: now,
            retention_expires_at: now + self.config.rollback_retention(),
        };
        bounded(
            self.config.storage_timeout(),
            self.rollback_points.put(&enhancement_id.to_string(), &point),
        )
        .await?;

        let enhanced = Document::new(preview.enhanced_content.clone());
        if let Err(e) = self.write(&preview.document_ref, &enhanced).await {
            // the write may have landed before failing
            self.undo_apply(preview, enhancement_id).await;
            return Err(e.into());
        }

        match self.read(&preview.document_ref).await {
            Ok(written) if written.hash() == &preview.enhanced_hash => {}
            Ok(_) => {
                self.undo_apply(preview, enhancement_id).await;
                return Err(StorageError::WriteMismatch(preview.document_ref.to_string()).into());
            }
            Err(e) => {
                self.undo_apply(preview, enhancement_id).await;
                return Err(e.into());
            }
        }

        let record = EnhancementRecord {
            enhancement_id,
            validation_id: preview.validation_id.clone(),
            document_ref: preview.document_ref.clone(),
            preview_id: preview.id,
            original_hash: preview.original_hash,
            enhanced_hash: preview.enhanced_hash,
            recommendations_applied: preview.applied_recommendations.clone(),
            safety_score_summary: SafetyScoreSummary::from(&preview.safety_score),
            applied_by: applied_by.to_string(),
            applied_at: now,
            rollback_available: true,
            rolled_back: false,
            rolled_back_at: None,
            rolled_back_by: None,
        };
        if let Err(e) = bounded(
            self.config.storage_timeout(),
            self.records.put(&enhancement_id.to_string(), &record),
        )
        .await
        {
            self.undo_apply(preview, enhancement_id).await;
            return Err(e.into());
        }
        Ok(record)
    }

    /// Restore original content and drop the rollback point
    async fn undo_apply(&self, preview: &Preview, enhancement_id: EnhancementId) {
        let original = Document::new(preview.original_content.clone());
        if let Err(e) = self.write(&preview.document_ref, &original).await {
            warn!(
                preview = %preview.id,
                document = %preview.document_ref,
                error = %e,
                "Failed to restore original content after apply failure"
            );
        }
        if let Err(e) = bounded(
            self.config.storage_timeout(),
            self.rollback_points.delete(&enhancement_id.to_string()),
        )
        .await
        {
            warn!(enhancement = %enhancement_id, error = %e, "Failed to remove orphaned rollback point");
        }
    }

    async fn delete_record(&self, id: &EnhancementId) {
        if let Err(e) = bounded(self.config.storage_timeout(), self.records.delete(&id.to_string())).await {
            warn!(enhancement = %id, error = %e, "Failed to remove uncommitted enhancement record");
        }
    }

    /// Expire every live preview past its deadline
    pub async fn cleanup_expired_previews(&self) -> usize {
        self.previews.expire_due(self.clock.now()).await.len()
    }

    /// Remove terminal previews older than the retention window
    pub async fn purge_previews(&self) -> usize {
        self.previews
            .purge_terminal(self.clock.now(), self.config.preview_retention())
            .await
    }

    /// Restore the pre-apply content of an enhancement
    ///
    /// The content present at rollback time is saved as a
    /// [`RollbackBackup`] first. The record is kept and marked rolled back.
    ///
    /// # Errors
    /// `NotFound` for an unknown id; `RollbackUnavailable` when the record
    /// was already rolled back or its point is gone or past retention.
    pub async fn rollback_enhancement(
        &self,
        id: &EnhancementId,
        actor: &str,
    ) -> Result<EnhancementRecord, RollbackError> {
        let key = id.to_string();
        let document_ref = self.get_record(&key).await?.ok_or(RollbackError::NotFound(*id))?.document_ref;
        let _guard = self
            .lock(&document_ref)
            .await
            .ok_or_else(|| RollbackError::LockTimeout(document_ref.clone()))?;

        let mut record = self.get_record(&key).await?.ok_or(RollbackError::NotFound(*id))?;
        if record.rolled_back {
            return Err(RollbackError::unavailable(*id, "already rolled back"));
        }
        let point = bounded(self.config.storage_timeout(), self.rollback_points.get(&key))
            .await?
            .ok_or_else(|| RollbackError::unavailable(*id, "rollback point no longer exists"))?;
        let now = self.clock.now();
        if !point.is_retained(now) {
            return Err(RollbackError::unavailable(
                *id,
                format!("retention expired at {}", point.retention_expires_at),
            ));
        }

        let current = self.read(&document_ref).await?;
        let backup = RollbackBackup {
            id: BackupId::new(),
            enhancement_id: *id,
            document_ref: document_ref.clone(),
            content: current.content().to_string(),
            created_at: now,
        };
        bounded(
            self.config.storage_timeout(),
            self.backups.put(&backup.id.to_string(), &backup),
        )
        .await?;

        self.write(&document_ref, &Document::new(point.content_snapshot)).await?;

        record.mark_rolled_back(actor, now);
        if let Err(e) = bounded(self.config.storage_timeout(), self.records.put(&key, &record)).await {
            if let Err(restore) = self.write(&document_ref, &current).await {
                warn!(enhancement = %id, error = %restore, "Failed to restore content after rollback failure");
            }
            return Err(e.into());
        }

        if let Err(e) = bounded(self.config.storage_timeout(), self.rollback_points.delete(&key)).await {
            warn!(enhancement = %id, error = %e, "Failed to remove consumed rollback point");
        }

        info!(
            enhancement = %id,
            document = %document_ref,
            actor,
            backup = %backup.id,
            "Enhancement rolled back"
        );
        Ok(record)
    }

    /// Matching records ordered by `applied_at`
    ///
    /// # Errors
    /// Returns error if the record store scan fails
    pub async fn list_enhancement_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<EnhancementRecord>, StorageError> {
        let mut records = bounded(
            self.config.storage_timeout(),
            self.records.list(&|r: &EnhancementRecord| filter.matches(r)),
        )
        .await?;
        records.sort_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then(a.enhancement_id.cmp(&b.enhancement_id))
        });
        Ok(records)
    }

    /// Pre-rollback backups for one enhancement, oldest first
    ///
    /// # Errors
    /// Returns error if the backup store scan fails
    pub async fn list_rollback_backups(&self, id: &EnhancementId) -> Result<Vec<RollbackBackup>, StorageError> {
        let id = *id;
        let mut backups = bounded(
            self.config.storage_timeout(),
            self.backups.list(&move |b: &RollbackBackup| b.enhancement_id == id),
        )
        .await?;
        backups.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(backups)
    }

    /// Delete rollback points past retention; records always survive
    ///
    /// # Errors
    /// Returns error if a store operation fails
    pub async fn cleanup_expired_rollback_points(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let timeout = self.config.storage_timeout();
        let due = bounded(
            timeout,
            self.rollback_points.list(&move |p: &RollbackPoint| !p.is_retained(now)),
        )
        .await?;

        let mut removed = 0;
        for point in due {
            let key = point.enhancement_id.to_string();
            if !bounded(timeout, self.rollback_points.delete(&key)).await? {
                continue;
            }
            removed += 1;
            if let Some(mut record) = bounded(timeout, self.records.get(&key)).await? {
                record.rollback_available = false;
                bounded(timeout, self.records.put(&key, &record)).await?;
            }
        }
        if removed > 0 {
            info!(removed, "Expired rollback points removed");
        }
        Ok(removed)
    }

    /// One sweep: expire previews, purge old previews, drop old rollback points
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let previews_expired = self.cleanup_expired_previews().await;
        let previews_purged = self.purge_previews().await;
        let rollback_points_removed = match self.cleanup_expired_rollback_points().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Rollback point cleanup failed");
                0
            }
        };
        self.locks.prune();
        MaintenanceReport {
            previews_expired,
            previews_purged,
            rollback_points_removed,
        }
    }

    async fn lock(&self, document: &DocumentRef) -> Option<DocumentGuard> {
        self.locks.acquire(document, self.config.lock_timeout()).await
    }

    async fn read(&self, document: &DocumentRef) -> Result<Document, StorageError> {
        bounded(self.config.storage_timeout(), self.documents.read(document)).await
    }

    async fn write(&self, document: &DocumentRef, content: &Document) -> Result<(), StorageError> {
        bounded(self.config.storage_timeout(), self.documents.write(document, content)).await
    }

    async fn get_record(&self, key: &str) -> Result<Option<EnhancementRecord>, StorageError> {
        bounded(self.config.storage_timeout(), self.records.get(key)).await
    }
}

//! Compare-and-set preview storage
//!
//! The in-memory map is authoritative. Every status change happens
//! synchronously under the map entry's guard, so a request handler and the
//! expiration sweep racing on one preview see exactly one winner. An
//! optional [`RecordStore`] backend mirrors each change for crash recovery.

use crate::error::{PreviewError, StorageError};
use crate::ids::PreviewId;
use crate::preview::{Preview, PreviewFilter, PreviewStatus};
use crate::store::{bounded, RecordStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ulid::Ulid;

/// Exclusive right to finish applying one preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimToken(Ulid);

#[derive(Debug)]
struct PreviewEntry {
    preview: Preview,
    claim: Option<ClaimToken>,
}

impl PreviewEntry {
    /// Flip a live, due, unclaimed preview to `expired`
    fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        self.claim.is_none()
            && self.preview.has_expired(now)
            && self.preview.transition(PreviewStatus::Expired, now).is_ok()
    }
}

pub struct PreviewStorage {
    entries: DashMap<PreviewId, PreviewEntry>,
    backend: Option<Arc<dyn RecordStore<Preview>>>,
    timeout: Duration,
}

impl std::fmt::Debug for PreviewStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewStorage")
            .field("entries", &self.entries.len())
            .field("durable", &self.backend.is_some())
            .finish()
    }
}

impl PreviewStorage {
    /// Memory-only storage
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            backend: None,
            timeout,
        }
    }

    /// Mirror changes into `backend`
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn RecordStore<Preview>>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reload every persisted preview into memory
    ///
    /// Claims are not persisted; an apply interrupted by a crash leaves its
    /// preview `approved`.
    ///
    /// # Errors
    /// Returns error if the backend scan fails
    pub async fn recover(&self) -> Result<usize, StorageError> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };
        let previews = bounded(self.timeout, backend.list(&|_: &Preview| true)).await?;
        let count = previews.len();
        for preview in previews {
            self.entries.insert(preview.id, PreviewEntry { preview, claim: None });
        }
        info!(count, "Recovered previews");
        Ok(count)
    }

    /// Store a new preview
    ///
    /// # Errors
    /// Returns error if the durable backend rejects the write
    pub async fn insert(&self, preview: Preview) -> Result<(), StorageError> {
        if let Some(backend) = &self.backend {
            bounded(self.timeout, backend.put(&preview.id.to_string(), &preview)).await?;
        }
        self.entries.insert(preview.id, PreviewEntry { preview, claim: None });
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &PreviewId) -> Option<Preview> {
        self.entries.get(id).map(|e| e.preview.clone())
    }

    /// Matching previews, oldest first
    #[must_use]
    pub fn list(&self, filter: &PreviewFilter) -> Vec<Preview> {
        let mut previews: Vec<Preview> = self
            .entries
            .iter()
            .filter(|e| filter.matches(&e.preview))
            .map(|e| e.preview.clone())
            .collect();
        previews.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        previews
    }

    /// `pending -> approved`
    ///
    /// # Errors
    /// `NotFound`, `Expired` (checked inline) or `InvalidTransition`
    pub async fn approve(&self, id: &PreviewId, approver: &str, now: DateTime<Utc>) -> Result<Preview, PreviewError> {
        self.update(id, now, |entry| {
            if entry.claim.is_some() {
                return Err(PreviewError::ApplyInProgress(*id));
            }
            entry.preview.transition(PreviewStatus::Approved, now)?;
            entry.preview.approved_by = Some(approver.to_string());
            Ok(entry.preview.clone())
        })
        .await
    }

    /// `pending -> rejected`
    ///
    /// # Errors
    /// `NotFound`, `Expired` (checked inline) or `InvalidTransition`
    pub async fn reject(&self, id: &PreviewId, now: DateTime<Utc>) -> Result<Preview, PreviewError> {
        self.update(id, now, |entry| {
            if entry.claim.is_some() {
                return Err(PreviewError::ApplyInProgress(*id));
            }
            entry.preview.transition(PreviewStatus::Rejected, now)?;
            Ok(entry.preview.clone())
        })
        .await
    }

    /// Take the exclusive apply claim on an approved, unexpired preview
    ///
    /// # Errors
    /// `NotFound`, `Expired`, `NotApproved` or `ApplyInProgress`
    pub async fn claim_for_apply(
        &self,
        id: &PreviewId,
        now: DateTime<Utc>,
    ) -> Result<(Preview, ClaimToken), PreviewError> {
        self.update(id, now, |entry| {
            if entry.claim.is_some() {
                return Err(PreviewError::ApplyInProgress(*id));
            }
            if entry.preview.status != PreviewStatus::Approved {
                return Err(PreviewError::NotApproved {
                    id: *id,
                    status: entry.preview.status,
                });
            }
            let token = ClaimToken(Ulid::new());
            entry.claim = Some(token);
            Ok((entry.preview.clone(), token))
        })
        .await
    }

    /// `approved -> applied` for the holder of `token`
    ///
    /// # Errors
    /// `NotFound`, `ApplyInProgress` for a foreign token, or `InvalidTransition`
    pub async fn complete_apply(
        &self,
        id: &PreviewId,
        token: ClaimToken,
        now: DateTime<Utc>,
    ) -> Result<Preview, PreviewError> {
        let result = {
            let mut entry = self.entries.get_mut(id).ok_or(PreviewError::NotFound(*id))?;
            if entry.claim != Some(token) {
                return Err(PreviewError::ApplyInProgress(*id));
            }
            entry.claim = None;
            entry.preview.transition(PreviewStatus::Applied, now).map(|()| entry.preview.clone())
        };
        if let Ok(preview) = &result {
            self.persist(preview).await;
        }
        result
    }

    /// Give up a claim after a failed apply
    pub fn release_claim(&self, id: &PreviewId, token: ClaimToken) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            if entry.claim == Some(token) {
                entry.claim = None;
            }
        }
    }

    /// Expire every live preview past its deadline; claimed previews are skipped
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Vec<PreviewId> {
        let expired: Vec<Preview> = self
            .entries
            .iter_mut()
            .filter_map(|mut e| e.expire_if_due(now).then(|| e.preview.clone()))
            .collect();
        for preview in &expired {
            info!(preview = %preview.id, "Preview expired");
            self.persist(preview).await;
        }
        expired.into_iter().map(|p| p.id).collect()
    }

    /// Remove terminal previews closed at least `retention` ago
    pub async fn purge_terminal(&self, now: DateTime<Utc>, retention: chrono::Duration) -> usize {
        let due: Vec<PreviewId> = self
            .entries
            .iter()
            .filter(|e| {
                e.claim.is_none()
                    && e.preview.status.is_terminal()
                    && e.preview.closed_at.map_or(false, |at| at + retention <= now)
            })
            .map(|e| *e.key())
            .collect();

        let mut purged = 0;
        for id in due {
            let removed = self
                .entries
                .remove_if(&id, |_, e| e.claim.is_none() && e.preview.status.is_terminal())
                .is_some();
            if !removed {
                continue;
            }
            purged += 1;
            if let Some(backend) = &self.backend {
                if let Err(e) = bounded(self.timeout, backend.delete(&id.to_string())).await {
                    warn!(preview = %id, error = %e, "Failed to purge persisted preview");
                }
            }
        }
        purged
    }

    async fn update<R, F>(&self, id: &PreviewId, now: DateTime<Utc>, op: F) -> Result<R, PreviewError>
    where
        F: FnOnce(&mut PreviewEntry) -> Result<R, PreviewError>,
    {
        let (result, changed) = {
            let mut entry = self.entries.get_mut(id).ok_or(PreviewError::NotFound(*id))?;
            if entry.expire_if_due(now) {
                (Err(PreviewError::Expired(*id)), Some(entry.preview.clone()))
            } else if entry.preview.status == PreviewStatus::Expired {
                (Err(PreviewError::Expired(*id)), None)
            } else {
                let before = entry.preview.status;
                let result = op(&mut *entry);
                let changed = (entry.preview.status != before).then(|| entry.preview.clone());
                (result, changed)
            }
        };
        if let Some(preview) = changed {
            if preview.status == PreviewStatus::Expired {
                info!(preview = %preview.id, "Preview expired on access");
            }
            self.persist(&preview).await;
        }
        result
    }

    async fn persist(&self, preview: &Preview) {
        if let Some(backend) = &self.backend {
            if let Err(e) = bounded(self.timeout, backend.put(&preview.id.to_string(), preview)).await {
                warn!(preview = %preview.id, error = %e, "Failed to persist preview status");
            }
        }
    }
}

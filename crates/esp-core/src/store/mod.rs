//! Storage seams
//!
//! The core treats persistence as two narrow traits: [`DocumentStorage`]
//! for document bytes and [`RecordStore`] for keyed records with a filtered
//! scan. No cross-entity transactions are assumed; the service orders its
//! writes so every failure can be undone.

mod document;
mod record;

pub use document::{DocumentStorage, FsDocumentStorage, InMemoryDocumentStorage};
pub use record::{InMemoryRecordStore, JsonFileRecordStore, RecordStore};

use crate::error::StorageError;
use std::future::Future;
use std::time::Duration;

/// Run a storage call under a time bound
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| StorageError::Timeout(timeout))?
}

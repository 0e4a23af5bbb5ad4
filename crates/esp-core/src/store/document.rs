//! Document storage backends

use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use esp_document::{Document, DocumentRef};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use ulid::Ulid;

/// Reads and writes document content by reference
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Read the current content
    async fn read(&self, reference: &DocumentRef) -> Result<Document, StorageError>;

    /// Replace the content
    async fn write(&self, reference: &DocumentRef, document: &Document) -> Result<(), StorageError>;
}

/// In-memory document storage
#[derive(Debug, Default)]
pub struct InMemoryDocumentStorage {
    documents: DashMap<DocumentRef, Document>,
}

impl InMemoryDocumentStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document
    pub fn insert(&self, reference: impl Into<DocumentRef>, content: impl Into<String>) {
        self.documents.insert(reference.into(), Document::new(content));
    }

    /// Current snapshot, if present
    #[must_use]
    pub fn snapshot(&self, reference: &DocumentRef) -> Option<Document> {
        self.documents.get(reference).map(|d| d.value().clone())
    }
}

#[async_trait]
impl DocumentStorage for InMemoryDocumentStorage {
    async fn read(&self, reference: &DocumentRef) -> Result<Document, StorageError> {
        self.snapshot(reference)
            .ok_or_else(|| StorageError::NotFound(reference.to_string()))
    }

    async fn write(&self, reference: &DocumentRef, document: &Document) -> Result<(), StorageError> {
        self.documents.insert(reference.clone(), document.clone());
        Ok(())
    }
}

/// Filesystem storage rooted at a directory
///
/// References are relative paths under the root; absolute paths and `..`
/// components are rejected.
#[derive(Debug, Clone)]
pub struct FsDocumentStorage {
    root: PathBuf,
}

impl FsDocumentStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &DocumentRef) -> Result<PathBuf, StorageError> {
        let relative = Path::new(reference.as_str());
        let safe = !reference.as_str().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStorage for FsDocumentStorage {
    async fn read(&self, reference: &DocumentRef) -> Result<Document, StorageError> {
        let path = self.resolve(reference)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(reference.to_string()));
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };
        Ok(Document::from_bytes(bytes)?)
    }

    async fn write(&self, reference: &DocumentRef, document: &Document) -> Result<(), StorageError> {
        let path = self.resolve(reference)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, document.content())
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }
}

/// Sibling of `path` unique to one write
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.tmp", Ulid::new()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_roundtrip() {
        let storage = InMemoryDocumentStorage::new();
        let reference = DocumentRef::from("docs/a.md");
        assert!(matches!(storage.read(&reference).await, Err(StorageError::NotFound(_))));

        storage.write(&reference, &Document::new("# A\n")).await.unwrap();
        assert_eq!(storage.read(&reference).await.unwrap().content(), "# A\n");
    }

    #[tokio::test]
    async fn fs_roundtrip_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsDocumentStorage::new(dir.path());
        let reference = DocumentRef::from("guides/cells/intro.md");

        let doc = Document::new("# Intro\n\nText.\n");
        storage.write(&reference, &doc).await.unwrap();
        let read = storage.read(&reference).await.unwrap();
        assert_eq!(read.hash(), doc.hash());
    }

    #[tokio::test]
    async fn fs_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsDocumentStorage::new(dir.path());
        for bad in ["../escape.md", "/etc/passwd", ""] {
            let err = storage.read(&DocumentRef::from(bad)).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidReference(_)), "{bad}");
        }
    }

    #[test]
    fn temp_path_keeps_full_file_name() {
        let md = temp_path(Path::new("docs/guide.md"));
        let txt = temp_path(Path::new("docs/guide.txt"));
        assert!(md.to_string_lossy().starts_with("docs/guide.md."));
        assert!(txt.to_string_lossy().starts_with("docs/guide.txt."));
        assert_ne!(temp_path(Path::new("docs/guide.md")), md);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fs_sibling_extensions_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FsDocumentStorage::new(dir.path()));
        let md = DocumentRef::from("guide.md");
        let txt = DocumentRef::from("guide.txt");

        for round in 0..50 {
            let md_doc = Document::new(format!("markdown {round}\n"));
            let txt_doc = Document::new(format!("plain {round}\n"));
            let (a, b) = tokio::join!(
                tokio::spawn({
                    let storage = Arc::clone(&storage);
                    let (md, doc) = (md.clone(), md_doc.clone());
                    async move { storage.write(&md, &doc).await }
                }),
                tokio::spawn({
                    let storage = Arc::clone(&storage);
                    let (txt, doc) = (txt.clone(), txt_doc.clone());
                    async move { storage.write(&txt, &doc).await }
                }),
            );
            a.unwrap().unwrap();
            b.unwrap().unwrap();
            assert_eq!(storage.read(&md).await.unwrap().hash(), md_doc.hash());
            assert_eq!(storage.read(&txt).await.unwrap().hash(), txt_doc.hash());
        }
    }

    #[tokio::test]
    async fn fs_non_utf8_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.md"), [0xff, 0xfe, 0x00]).unwrap();
        let storage = FsDocumentStorage::new(dir.path());
        let err = storage.read(&DocumentRef::from("bin.md")).await.unwrap_err();
        assert!(matches!(err, StorageError::Document(_)));
    }
}

//! Durable backends: filesystem documents, JSON record stores, recovery

use esp_core::prelude::*;
use esp_core::{
    DocumentStorage, EnhancementRecord, FsDocumentStorage, JsonFileRecordStore, RecordStore, RollbackBackup,
    RollbackPoint,
};
use esp_test_utils::{article_rules, safe_recommendation, ARTICLE, ARTICLE_REF};
use std::path::Path;
use std::sync::Arc;

struct Stores {
    documents: Arc<FsDocumentStorage>,
    previews: Arc<dyn RecordStore<Preview>>,
    records: Arc<dyn RecordStore<EnhancementRecord>>,
    points: Arc<dyn RecordStore<RollbackPoint>>,
    backups: Arc<dyn RecordStore<RollbackBackup>>,
}

async fn open(root: &Path) -> Stores {
    Stores {
        documents: Arc::new(FsDocumentStorage::new(root.join("docs"))),
        previews: Arc::new(JsonFileRecordStore::<Preview>::open(root.join("previews")).await.unwrap()),
        records: Arc::new(JsonFileRecordStore::<EnhancementRecord>::open(root.join("records")).await.unwrap()),
        points: Arc::new(JsonFileRecordStore::<RollbackPoint>::open(root.join("rollback")).await.unwrap()),
        backups: Arc::new(JsonFileRecordStore::<RollbackBackup>::open(root.join("backups")).await.unwrap()),
    }
}

fn service(stores: &Stores) -> EnhancementService {
    EnhancementService::builder()
        .with_document_storage(Arc::clone(&stores.documents) as Arc<dyn DocumentStorage>)
        .with_preview_backend(Arc::clone(&stores.previews))
        .with_record_store(Arc::clone(&stores.records))
        .with_rollback_store(Arc::clone(&stores.points))
        .with_backup_store(Arc::clone(&stores.backups))
        .build()
        .unwrap()
}

#[tokio::test]
async fn approved_preview_survives_restart_and_applies() {
    let dir = tempfile::tempdir().unwrap();
    let stores = open(dir.path()).await;
    stores
        .documents
        .write(&DocumentRef::from(ARTICLE_REF), &Document::new(ARTICLE))
        .await
        .unwrap();

    let id = {
        let first = service(&stores);
        let preview = first
            .create_preview(
                CreatePreviewRequest::new(ARTICLE_REF, "v1", vec![safe_recommendation("r1")]).with_rules(article_rules()),
            )
            .await
            .unwrap();
        first.approve_preview(&preview.id, "reviewer").await.unwrap();
        preview.id
    };

    let restarted = service(&stores);
    assert_eq!(restarted.recover().await.unwrap(), 1);
    let recovered = restarted.get_preview(&id).unwrap();
    assert_eq!(recovered.status, PreviewStatus::Approved);

    let record = restarted
        .apply_preview(&id, &ApplyConfirmation::confirmed("editor"))
        .await
        .unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("docs").join(ARTICLE_REF)).unwrap();
    assert_eq!(on_disk, recovered.enhanced_content);
    assert!(dir
        .path()
        .join("records")
        .join(format!("{}.json", record.enhancement_id))
        .exists());

    let persisted = stores.previews.get(&id.to_string()).await.unwrap().unwrap();
    assert_eq!(persisted.status, PreviewStatus::Applied);
}

#[tokio::test]
async fn rollback_through_json_stores() {
    let dir = tempfile::tempdir().unwrap();
    let stores = open(dir.path()).await;
    stores
        .documents
        .write(&DocumentRef::from(ARTICLE_REF), &Document::new(ARTICLE))
        .await
        .unwrap();
    let service = service(&stores);

    let preview = service
        .create_preview(CreatePreviewRequest::new(ARTICLE_REF, "v1", vec![safe_recommendation("r1")]))
        .await
        .unwrap();
    service.approve_preview(&preview.id, "reviewer").await.unwrap();
    let record = service
        .apply_preview(&preview.id, &ApplyConfirmation::confirmed("editor"))
        .await
        .unwrap();

    service
        .rollback_enhancement(&record.enhancement_id, "operator")
        .await
        .unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("docs").join(ARTICLE_REF)).unwrap();
    assert_eq!(on_disk, ARTICLE);
    assert!(stores
        .points
        .get(&record.enhancement_id.to_string())
        .await
        .unwrap()
        .is_none());
    let stored = stores
        .records
        .get(&record.enhancement_id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.rolled_back);
    assert_eq!(service.list_rollback_backups(&record.enhancement_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_document_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let stores = open(dir.path()).await;
    let service = service(&stores);

    let err = service
        .create_preview(CreatePreviewRequest::new("absent.md", "v1", vec![safe_recommendation("r1")]))
        .await
        .unwrap_err();
    assert!(matches!(err, PreviewError::Storage(esp_core::StorageError::NotFound(_))));
}

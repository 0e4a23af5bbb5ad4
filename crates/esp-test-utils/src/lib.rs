//! Testing utilities for ESP workspace
//!
//! Shared fixtures, a scripted generation service and a harness that wires
//! an [`EnhancementService`] to in-memory storage and a manual clock.

#![allow(missing_docs)]

use async_trait::async_trait;
use esp_core::{
    Clock, CreatePreviewRequest, DocumentStorage, EnhancementService, InMemoryDocumentStorage, ManualClock,
    PipelineConfig, Preview, RecommendationSink, SinkError, StorageError, ValidationId,
};
use esp_document::{Document, DocumentRef, Recommendation, RecommendationCategory, RecommendationId, TargetLocator};
use esp_enhancer::{GenerationError, GenerationService};
use esp_safety::PreservationRules;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ARTICLE_REF: &str = "docs/cells/loading.md";

/// Knowledge-base article with front matter, a code block, a numbered list
/// and a table
pub const ARTICLE: &str = "---
title: Loading workbooks
category: spreadsheets
---
# Loading workbooks

The Document plugin loads XLSX files with Cells.

## Steps

1. Create a Workbook instance.
2. Call the open method with a path.
3. Read the first worksheet.

```csharp
var workbook = new Workbook(\"input.xlsx\");
```

## Formats

| Format | Supported |
|--------|-----------|
| XLSX   | yes       |
| XLS    | yes       |

See [the API reference](https://reference.example.com/cells) for details.
";

/// Rules protecting the terms [`ARTICLE`] relies on
pub fn article_rules() -> PreservationRules {
    PreservationRules::default()
        .with_keywords(["workbook", "worksheet"])
        .with_technical_terms(["XLSX"])
        .with_product_names(["Cells"])
        .with_max_content_reduction(30.0)
}

/// Claim fix against [`ARTICLE`] whose text comes from generation
pub fn generated_recommendation(id: &str) -> Recommendation {
    Recommendation::new(
        id,
        RecommendationCategory::ReplaceIncorrectClaim,
        TargetLocator::phrase("loads XLSX files"),
    )
    .with_rationale("XLS is also supported")
}

/// Harmless claim fix against [`ARTICLE`]
pub fn safe_recommendation(id: &str) -> Recommendation {
    Recommendation::new(
        id,
        RecommendationCategory::ReplaceIncorrectClaim,
        TargetLocator::phrase("loads XLSX files"),
    )
    .with_proposed_text("loads XLSX and XLS files")
    .with_rationale("XLS is also supported")
}

/// Replacement that drops the product name from the intro paragraph
pub fn product_dropping_recommendation(id: &str) -> Recommendation {
    Recommendation::new(
        id,
        RecommendationCategory::ReplaceIncorrectClaim,
        TargetLocator::paragraph("Document plugin"),
    )
    .with_proposed_text("The Document plugin loads XLSX files.")
}

/// Generation service that replays scripted responses in order
#[derive(Debug, Default)]
pub struct ScriptedGeneration {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.responses
            .lock()
            .push_back(Err(GenerationError::Failed(message.into())));
        self
    }

    /// Sleep before every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls observed running at once
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGeneration {
    async fn generate(&self, _context: &str, instruction: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.instructions.lock().push(instruction.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or(Err(GenerationError::Unavailable))
    }
}

/// Sink that remembers every notification
#[derive(Debug, Default)]
pub struct RecordingSink {
    marked: Mutex<Vec<(ValidationId, Vec<RecommendationId>)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose notifications always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn marked(&self) -> Vec<(ValidationId, Vec<RecommendationId>)> {
        self.marked.lock().clone()
    }
}

#[async_trait]
impl RecommendationSink for RecordingSink {
    async fn mark_applied(&self, validation_id: &ValidationId, ids: &[RecommendationId]) -> Result<(), SinkError> {
        self.marked.lock().push((validation_id.clone(), ids.to_vec()));
        if self.fail {
            Err(SinkError::Unavailable("recommendation source offline".to_string()))
        } else {
            Ok(())
        }
    }
}

/// In-memory document storage whose writes can be made to fail
#[derive(Debug, Default)]
pub struct FlakyDocumentStorage {
    inner: InMemoryDocumentStorage,
    fail_writes: AtomicBool,
    /// Writes that reach storage and then report failure
    write_then_fail: AtomicBool,
}

impl FlakyDocumentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, reference: &str, content: &str) {
        self.inner.insert(reference, content);
    }

    pub fn content(&self, reference: &str) -> Option<String> {
        self.inner
            .snapshot(&DocumentRef::from(reference))
            .map(|d| d.content().to_string())
    }

    /// Reject every write without storing it
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store the first write, then report failure; later writes succeed
    pub fn fail_after_next_write(&self) {
        self.write_then_fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStorage for FlakyDocumentStorage {
    async fn read(&self, reference: &DocumentRef) -> Result<Document, StorageError> {
        self.inner.read(reference).await
    }

    async fn write(&self, reference: &DocumentRef, document: &Document) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Timeout(Duration::from_millis(1)));
        }
        self.inner.write(reference, document).await?;
        if self.write_then_fail.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Timeout(Duration::from_millis(1)));
        }
        Ok(())
    }
}

/// Service wired to in-memory storage and a manual clock
pub struct TestHarness {
    pub service: Arc<EnhancementService>,
    pub documents: Arc<InMemoryDocumentStorage>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self::build(config, Arc::new(ScriptedGeneration::new()))
    }

    pub fn build(config: PipelineConfig, generator: Arc<dyn GenerationService>) -> Self {
        let documents = Arc::new(InMemoryDocumentStorage::new());
        documents.insert(ARTICLE_REF, ARTICLE);
        let clock = Arc::new(ManualClock::starting_now());
        let sink = Arc::new(RecordingSink::new());
        let service = EnhancementService::builder()
            .with_config(config)
            .with_generator(generator)
            .with_document_storage(Arc::clone(&documents) as Arc<dyn DocumentStorage>)
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_sink(Arc::clone(&sink) as Arc<dyn RecommendationSink>)
            .build()
            .unwrap();
        Self {
            service: Arc::new(service),
            documents,
            clock,
            sink,
        }
    }

    /// Current stored content of `reference`
    pub fn content(&self, reference: &str) -> String {
        self.documents
            .snapshot(&DocumentRef::from(reference))
            .map(|d| d.content().to_string())
            .unwrap_or_default()
    }

    /// Create a preview of [`ARTICLE`] under [`article_rules`]
    pub async fn preview(&self, recommendations: Vec<Recommendation>) -> Preview {
        self.service
            .create_preview(CreatePreviewRequest::new(ARTICLE_REF, "v1", recommendations).with_rules(article_rules()))
            .await
            .unwrap()
    }

    /// Create and approve a preview
    pub async fn approved(&self, recommendations: Vec<Recommendation>) -> Preview {
        let preview = self.preview(recommendations).await;
        self.service.approve_preview(&preview.id, "reviewer").await.unwrap()
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

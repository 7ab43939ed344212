//! In-memory engine for tests.
//!
//! Failure behaviour is switchable at runtime so tests can simulate an
//! unavailable primary or fallback.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use scribe_types::{
    doc_key, EngineDocumentStats, EngineKind, EntityId, EntityType, SearchCriteria, SearchHit,
    SearchIndex, SearchResultSet,
};

use crate::engine::SearchEngine;
use crate::error::IndexingError;

/// Mock engine holding documents in a map keyed by `doc_key`.
pub struct MockEngine {
    name: String,
    kind: EngineKind,
    docs: RwLock<BTreeMap<String, SearchIndex>>,
    fail_writes: AtomicBool,
    reject_writes: AtomicBool,
    fail_reads: AtomicBool,
    healthy: AtomicBool,
    /// Writes that fail before the engine recovers
    transient_failures: AtomicUsize,
    write_attempts: AtomicUsize,
}

impl MockEngine {
    /// Create a healthy engine of kind [`EngineKind::Memory`].
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, EngineKind::Memory)
    }

    /// Create a healthy engine reporting the given kind.
    pub fn with_kind(name: impl Into<String>, kind: EngineKind) -> Self {
        Self {
            name: name.into(),
            kind,
            docs: RwLock::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
            reject_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            transient_failures: AtomicUsize::new(0),
            write_attempts: AtomicUsize::new(0),
        }
    }

    /// Make every write return an error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every write return `Ok(false)`.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Make searches and stats return an error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Fail the next `count` writes, then recover.
    pub fn fail_next_writes(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Number of write calls received, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn get(&self, entity_type: EntityType, entity_id: EntityId) -> Option<SearchIndex> {
        self.docs
            .read()
            .ok()?
            .get(&doc_key(entity_type, entity_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the failure switches for one write. `Ok(false)` means rejected.
    fn admit_write(&self) -> Result<bool, IndexingError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IndexingError::Engine(format!("{}: write failed", self.name)));
        }
        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if transient.is_ok() {
            return Err(IndexingError::Engine(format!(
                "{}: transient write failure",
                self.name
            )));
        }
        Ok(!self.reject_writes.load(Ordering::SeqCst))
    }

    fn check_reads(&self) -> Result<(), IndexingError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(IndexingError::Engine(format!("{}: read failed", self.name)));
        }
        Ok(())
    }

    fn store(&self, doc: &SearchIndex) -> Result<(), IndexingError> {
        let mut docs = self
            .docs
            .write()
            .map_err(|e| IndexingError::Engine(e.to_string()))?;
        docs.insert(doc.doc_key(), doc.clone());
        Ok(())
    }

    fn matches(doc: &SearchIndex, criteria: &SearchCriteria) -> bool {
        let query = criteria.query.trim().to_lowercase();
        criteria.entity_type.is_none_or(|t| t == doc.entity_type)
            && criteria.entity_id.is_none_or(|id| id == doc.entity_id)
            && criteria
                .language
                .as_deref()
                .is_none_or(|lang| lang == doc.language)
            && (query.is_empty()
                || doc.title.to_lowercase().contains(&query)
                || doc.content.to_lowercase().contains(&query)
                || doc.keywords.to_lowercase().contains(&query))
    }
}

#[async_trait]
impl SearchEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn index_document(&self, doc: &SearchIndex) -> Result<bool, IndexingError> {
        if !self.admit_write()? {
            return Ok(false);
        }
        self.store(doc)?;
        Ok(true)
    }

    async fn update_document(&self, doc: &SearchIndex) -> Result<bool, IndexingError> {
        self.index_document(doc).await
    }

    async fn delete_document(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Result<bool, IndexingError> {
        if !self.admit_write()? {
            return Ok(false);
        }
        let mut docs = self
            .docs
            .write()
            .map_err(|e| IndexingError::Engine(e.to_string()))?;
        docs.remove(&doc_key(entity_type, entity_id));
        Ok(true)
    }

    async fn bulk_index(&self, docs: &[SearchIndex]) -> Result<usize, IndexingError> {
        if !self.admit_write()? {
            return Ok(0);
        }
        for doc in docs {
            self.store(doc)?;
        }
        Ok(docs.len())
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResultSet, IndexingError> {
        self.check_reads()?;
        let docs = self
            .docs
            .read()
            .map_err(|e| IndexingError::Engine(e.to_string()))?;
        let matched: Vec<_> = docs
            .values()
            .filter(|doc| Self::matches(doc, criteria))
            .collect();
        let total = matched.len();
        let hits = matched
            .into_iter()
            .skip(criteria.offset)
            .take(criteria.limit)
            .map(|doc| SearchHit::from_document(doc, 1.0))
            .collect();
        Ok(SearchResultSet {
            hits,
            total,
            engine: self.name.clone(),
        })
    }

    async fn rebuild_index(&self) -> Result<bool, IndexingError> {
        if !self.admit_write()? {
            return Ok(false);
        }
        let mut docs = self
            .docs
            .write()
            .map_err(|e| IndexingError::Engine(e.to_string()))?;
        docs.clear();
        Ok(true)
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn get_index_stats(&self) -> Result<EngineDocumentStats, IndexingError> {
        self.check_reads()?;
        let docs = self
            .docs
            .read()
            .map_err(|e| IndexingError::Engine(e.to_string()))?;
        let size_in_bytes = docs
            .values()
            .map(|d| (d.title.len() + d.content.len() + d.keywords.len()) as u64)
            .sum();
        Ok(EngineDocumentStats {
            document_count: docs.len() as u64,
            size_in_bytes,
        })
    }
}

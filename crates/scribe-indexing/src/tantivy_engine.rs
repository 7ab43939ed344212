//! Primary engine backed by the embedded Tantivy index.
//!
//! Every write commits and reloads the reader so the next search sees it.
//! Index work runs on the blocking pool; the async methods only await it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use scribe_search::{DocumentIndex, DocumentIndexConfig, DocumentIndexer, DocumentSearcher};
use scribe_types::{
    doc_key, EngineDocumentStats, EngineKind, EntityId, EntityType, SearchCriteria, SearchIndex,
    SearchResultSet,
};

use crate::engine::SearchEngine;
use crate::error::IndexingError;

const ENGINE_NAME: &str = "tantivy";

/// Index handles shared with blocking tasks.
struct TantivyIndex {
    index: DocumentIndex,
    indexer: DocumentIndexer,
    searcher: DocumentSearcher,
}

impl TantivyIndex {
    fn upsert_batch(&self, docs: &[SearchIndex]) -> Result<usize, IndexingError> {
        let count = self.indexer.upsert_batch(docs)?;
        self.searcher.reload()?;
        Ok(count)
    }

    fn delete(&self, doc_key: &str) -> Result<(), IndexingError> {
        self.indexer.delete(doc_key)?;
        self.searcher.reload()?;
        Ok(())
    }
}

/// Tantivy-backed search engine.
pub struct TantivyEngine {
    inner: Arc<TantivyIndex>,
}

impl TantivyEngine {
    /// Open or create the index described by `config`.
    pub fn open(config: DocumentIndexConfig) -> Result<Self, IndexingError> {
        let index = DocumentIndex::open_or_create(config)?;
        let indexer = DocumentIndexer::new(&index)?;
        let searcher = DocumentSearcher::new(&index)?;
        Ok(Self {
            inner: Arc::new(TantivyIndex {
                index,
                indexer,
                searcher,
            }),
        })
    }

    /// Run `task` against the index on the blocking pool.
    async fn blocking<T, F>(&self, task: F) -> Result<T, IndexingError>
    where
        T: Send + 'static,
        F: FnOnce(&TantivyIndex) -> Result<T, IndexingError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || task(&inner))
            .await
            .map_err(|e| IndexingError::Engine(format!("{} task failed: {}", ENGINE_NAME, e)))?
    }
}

#[async_trait]
impl SearchEngine for TantivyEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Tantivy
    }

    async fn index_document(&self, doc: &SearchIndex) -> Result<bool, IndexingError> {
        let doc = doc.clone();
        self.blocking(move |idx| idx.upsert_batch(std::slice::from_ref(&doc)))
            .await?;
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
        let key = doc_key(entity_type, entity_id);
        self.blocking(move |idx| idx.delete(&key)).await?;
        Ok(true)
    }

    async fn bulk_index(&self, docs: &[SearchIndex]) -> Result<usize, IndexingError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let docs = docs.to_vec();
        let count = self.blocking(move |idx| idx.upsert_batch(&docs)).await?;
        debug!(count, "Bulk indexed into tantivy");
        Ok(count)
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResultSet, IndexingError> {
        let criteria = criteria.clone();
        let (hits, total) = self
            .blocking(move |idx| Ok(idx.searcher.search(&criteria)?))
            .await?;
        Ok(SearchResultSet {
            hits,
            total,
            engine: ENGINE_NAME.to_string(),
        })
    }

    async fn rebuild_index(&self) -> Result<bool, IndexingError> {
        self.blocking(|idx| {
            idx.indexer.delete_all()?;
            idx.searcher.reload()?;
            Ok(())
        })
        .await?;
        info!("Cleared tantivy index for rebuild");
        Ok(true)
    }

    async fn is_healthy(&self) -> bool {
        self.blocking(|idx| Ok(idx.index.exists()))
            .await
            .unwrap_or(false)
    }

    async fn get_index_stats(&self) -> Result<EngineDocumentStats, IndexingError> {
        self.blocking(|idx| {
            Ok(EngineDocumentStats {
                document_count: idx.searcher.num_docs(),
                size_in_bytes: idx.index.size_in_bytes()?,
            })
        })
        .await
    }

    async fn count_by_type(&self, entity_type: EntityType) -> Result<Option<u64>, IndexingError> {
        self.blocking(move |idx| Ok(Some(idx.searcher.count_by_type(entity_type)?)))
            .await
    }

    async fn optimize(&self) -> Result<bool, IndexingError> {
        self.blocking(|idx| {
            idx.indexer.merge_segments()?;
            idx.searcher.reload()?;
            Ok(())
        })
        .await?;
        Ok(true)
    }
}

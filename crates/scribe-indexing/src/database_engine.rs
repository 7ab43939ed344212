//! Fallback engine backed by the derived-index row store.
//!
//! Documents are persisted as `SearchIndex` rows. Search is a
//! case-insensitive substring scan over active rows, so it works whenever
//! the row store does.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use scribe_types::{
    EngineDocumentStats, EngineKind, EntityId, EntityType, SearchCriteria, SearchHit, SearchIndex,
    SearchResultSet,
};

use crate::engine::SearchEngine;
use crate::error::IndexingError;
use crate::source::IndexRowStore;

/// Rows scanned per page during search.
const SCAN_PAGE_SIZE: usize = 500;

const TITLE_WEIGHT: f32 = 3.0;
const KEYWORD_WEIGHT: f32 = 2.0;
const CONTENT_WEIGHT: f32 = 1.0;

/// Substring-scan search over stored rows.
pub struct DatabaseEngine {
    rows: Arc<dyn IndexRowStore>,
}

impl DatabaseEngine {
    pub fn new(rows: Arc<dyn IndexRowStore>) -> Self {
        Self { rows }
    }

    fn passes_filters(row: &SearchIndex, criteria: &SearchCriteria) -> bool {
        row.is_active
            && criteria.entity_type.is_none_or(|t| t == row.entity_type)
            && criteria.entity_id.is_none_or(|id| id == row.entity_id)
            && criteria
                .language
                .as_deref()
                .is_none_or(|lang| lang == row.language)
    }

    /// Score a row against lowercase query terms. 0 means no match.
    fn score(row: &SearchIndex, terms: &[String]) -> f32 {
        if terms.is_empty() {
            return 1.0;
        }
        let title = row.title.to_lowercase();
        let keywords = row.keywords.to_lowercase();
        let content = row.content.to_lowercase();

        let mut score = 0.0;
        for term in terms {
            let mut term_score = 0.0;
            if title.contains(term.as_str()) {
                term_score += TITLE_WEIGHT;
            }
            if keywords.contains(term.as_str()) {
                term_score += KEYWORD_WEIGHT;
            }
            if content.contains(term.as_str()) {
                term_score += CONTENT_WEIGHT;
            }
            // Every term must match somewhere
            if term_score == 0.0 {
                return 0.0;
            }
            score += term_score;
        }
        score
    }

    fn scan(&self, criteria: &SearchCriteria) -> Result<Vec<SearchHit>, IndexingError> {
        // Identity lookups skip the scan
        if let (Some(entity_type), Some(entity_id)) = (criteria.entity_type, criteria.entity_id) {
            let terms = query_terms(&criteria.query);
            return Ok(self
                .rows
                .find_row(entity_type, entity_id)?
                .filter(|row| Self::passes_filters(row, criteria))
                .map(|row| (Self::score(&row, &terms), row))
                .filter(|(score, _)| *score > 0.0)
                .map(|(score, row)| SearchHit::from_document(&row, score))
                .into_iter()
                .collect());
        }

        let terms = query_terms(&criteria.query);
        let mut hits = Vec::new();
        let mut start_id = 0;
        loop {
            let page = self.rows.rows_page(start_id, SCAN_PAGE_SIZE)?;
            let Some(last) = page.last() else {
                break;
            };
            let next_start = last.id.checked_add(1);
            let page_len = page.len();

            for row in page {
                if !Self::passes_filters(&row, criteria) {
                    continue;
                }
                let score = Self::score(&row, &terms);
                if score > 0.0 {
                    hits.push(SearchHit::from_document(&row, score));
                }
            }

            if page_len < SCAN_PAGE_SIZE {
                break;
            }
            let Some(next) = next_start else {
                break;
            };
            start_id = next;
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.entity_type.cmp(&b.entity_type))
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        Ok(hits)
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

#[async_trait]
impl SearchEngine for DatabaseEngine {
    fn name(&self) -> &str {
        "database"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Database
    }

    async fn index_document(&self, doc: &SearchIndex) -> Result<bool, IndexingError> {
        let stored = self.rows.upsert_row(doc)?;
        debug!(row_id = stored.id, doc_key = %stored.doc_key(), "Stored row");
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
        let removed = self.rows.delete_row_for(entity_type, entity_id)?;
        debug!(%entity_type, entity_id, removed, "Deleted row");
        Ok(true)
    }

    async fn bulk_index(&self, docs: &[SearchIndex]) -> Result<usize, IndexingError> {
        let mut count = 0;
        for doc in docs {
            match self.rows.upsert_row(doc) {
                Ok(_) => count += 1,
                Err(e) => warn!(doc_key = %doc.doc_key(), error = %e, "Failed to store row"),
            }
        }
        Ok(count)
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResultSet, IndexingError> {
        let hits = self.scan(criteria)?;
        let total = hits.len();
        let hits = hits
            .into_iter()
            .skip(criteria.offset)
            .take(criteria.limit)
            .collect();
        Ok(SearchResultSet {
            hits,
            total,
            engine: self.name().to_string(),
        })
    }

    async fn rebuild_index(&self) -> Result<bool, IndexingError> {
        let cleared = self.rows.clear_rows()?;
        info!(cleared, "Cleared database rows for rebuild");
        Ok(true)
    }

    async fn is_healthy(&self) -> bool {
        self.rows.rows_page(0, 1).is_ok()
    }

    async fn get_index_stats(&self) -> Result<EngineDocumentStats, IndexingError> {
        let summary = self.rows.summary()?;
        Ok(EngineDocumentStats {
            document_count: summary.active_rows,
            size_in_bytes: summary.size_in_bytes,
        })
    }

    async fn count_by_type(&self, entity_type: EntityType) -> Result<Option<u64>, IndexingError> {
        let summary = self.rows.summary()?;
        Ok(Some(
            summary
                .active_by_type
                .get(&entity_type)
                .copied()
                .unwrap_or(0),
        ))
    }

    async fn optimize(&self) -> Result<bool, IndexingError> {
        self.rows.compact()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_storage::Storage;
    use tempfile::TempDir;

    fn engine() -> (TempDir, Arc<Storage>, DatabaseEngine) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let engine = DatabaseEngine::new(storage.clone());
        (temp, storage, engine)
    }

    fn doc(entity_type: EntityType, id: EntityId, title: &str, content: &str) -> SearchIndex {
        SearchIndex::new(entity_type, id, title, content, "en")
    }

    #[tokio::test]
    async fn test_index_creates_single_row() {
        let (_temp, storage, engine) = engine();
        let d = doc(EntityType::Post, 1, "Hello", "World");
        assert!(engine.index_document(&d).await.unwrap());
        assert!(engine.update_document(&d).await.unwrap());
        assert_eq!(storage.search_index_summary().unwrap().total_rows, 1);
    }

    #[tokio::test]
    async fn test_substring_search_case_insensitive() {
        let (_temp, _storage, engine) = engine();
        engine
            .bulk_index(&[
                doc(EntityType::Post, 1, "Rust Lifetimes", "Borrow checker"),
                doc(EntityType::Post, 2, "Go channels", "CSP"),
                doc(EntityType::Tag, 1, "rust", ""),
            ])
            .await
            .unwrap();

        let results = engine.search(&SearchCriteria::new("RUST")).await.unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.engine, "database");

        let results = engine
            .search(&SearchCriteria::new("rust borrow"))
            .await
            .unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.hits[0].entity_id, 1);
    }

    #[tokio::test]
    async fn test_search_filters_and_paging() {
        let (_temp, _storage, engine) = engine();
        let docs: Vec<_> = (1..=5)
            .map(|i| doc(EntityType::Post, i, &format!("Post {}", i), "common"))
            .collect();
        engine.bulk_index(&docs).await.unwrap();
        engine
            .index_document(&doc(EntityType::User, 1, "common user", ""))
            .await
            .unwrap();

        let criteria = SearchCriteria::new("common")
            .with_entity_type(EntityType::Post)
            .with_limit(2)
            .with_offset(2);
        let results = engine.search(&criteria).await.unwrap();
        assert_eq!(results.total, 5);
        assert_eq!(results.hits.len(), 2);
    }

    #[tokio::test]
    async fn test_identity_lookup() {
        let (_temp, _storage, engine) = engine();
        engine
            .index_document(&doc(EntityType::Category, 4, "Systems", ""))
            .await
            .unwrap();

        let found = engine
            .search(&SearchCriteria::by_identity(EntityType::Category, 4))
            .await
            .unwrap();
        assert_eq!(found.hits.len(), 1);

        let missing = engine
            .search(&SearchCriteria::by_identity(EntityType::Category, 5))
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_rows_hidden() {
        let (_temp, _storage, engine) = engine();
        let mut d = doc(EntityType::Post, 1, "Hidden", "");
        d.is_active = false;
        engine.index_document(&d).await.unwrap();

        assert!(engine
            .search(&SearchCriteria::new("hidden"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(engine.get_index_stats().await.unwrap().document_count, 0);
    }

    #[tokio::test]
    async fn test_delete_and_rebuild() {
        let (_temp, storage, engine) = engine();
        engine
            .bulk_index(&[
                doc(EntityType::Post, 1, "a", ""),
                doc(EntityType::Post, 2, "b", ""),
            ])
            .await
            .unwrap();

        assert!(engine.delete_document(EntityType::Post, 1).await.unwrap());
        assert!(engine.delete_document(EntityType::Post, 1).await.unwrap());
        assert_eq!(
            engine.count_by_type(EntityType::Post).await.unwrap(),
            Some(1)
        );

        assert!(engine.rebuild_index().await.unwrap());
        assert_eq!(storage.search_index_summary().unwrap().total_rows, 0);
        assert!(engine.is_healthy().await);
        assert!(engine.optimize().await.unwrap());
    }
}

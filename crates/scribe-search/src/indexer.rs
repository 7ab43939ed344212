//! Indexer for writing documents to the Tantivy index.
//!
//! The indexer wraps IndexWriter with shared access via Arc<Mutex>. Each
//! write applies its changes and commits (or rolls back) under a single
//! lock, so concurrent writers never commit or discard each other's
//! pending documents.

use std::sync::{Arc, Mutex, MutexGuard};

use tantivy::{IndexWriter, Opstamp, Term};
use tracing::{debug, info, warn};

use scribe_types::SearchIndex;

use crate::document::search_index_to_doc;
use crate::error::SearchError;
use crate::index::DocumentIndex;
use crate::schema::DocumentSchema;

/// Manages document indexing operations.
///
/// Every write replaces any existing document with the same `doc_key` and
/// is committed before the call returns.
pub struct DocumentIndexer {
    writer: Arc<Mutex<IndexWriter>>,
    schema: DocumentSchema,
}

impl DocumentIndexer {
    /// Create a new indexer from a DocumentIndex.
    pub fn new(index: &DocumentIndex) -> Result<Self, SearchError> {
        let writer = index.writer()?;
        let schema = index.schema().clone();

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            schema,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexWriter>, SearchError> {
        self.writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    /// Apply `changes` and commit them while holding the writer lock.
    ///
    /// On failure the pending changes are rolled back before the lock is
    /// released.
    fn apply<F>(&self, changes: F) -> Result<Opstamp, SearchError>
    where
        F: FnOnce(&IndexWriter) -> Result<(), SearchError>,
    {
        let mut writer = self.lock()?;
        let outcome = match changes(&*writer) {
            Ok(()) => writer.commit().map_err(SearchError::from),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(opstamp) => {
                debug!(opstamp, "Committed index changes");
                Ok(opstamp)
            }
            Err(e) => {
                match writer.rollback() {
                    Ok(opstamp) => warn!(opstamp, error = %e, "Rolled back index changes"),
                    Err(rollback) => {
                        warn!(error = %e, rollback_error = %rollback, "Rollback failed")
                    }
                }
                Err(e)
            }
        }
    }

    fn stage(&self, writer: &IndexWriter, row: &SearchIndex) -> Result<(), SearchError> {
        let doc = search_index_to_doc(&self.schema, row);
        writer.delete_term(Term::from_field_text(self.schema.doc_key, &row.doc_key()));
        writer.add_document(doc)?;
        Ok(())
    }

    /// Index one row, replacing any document with the same key.
    pub fn upsert(&self, row: &SearchIndex) -> Result<Opstamp, SearchError> {
        let opstamp = self.apply(|writer| self.stage(writer, row))?;
        debug!(doc_key = %row.doc_key(), "Indexed document");
        Ok(opstamp)
    }

    /// Index many rows in one commit.
    pub fn upsert_batch(&self, rows: &[SearchIndex]) -> Result<usize, SearchError> {
        self.apply(|writer| rows.iter().try_for_each(|row| self.stage(writer, row)))?;
        debug!(count = rows.len(), "Indexed document batch");
        Ok(rows.len())
    }

    /// Delete a document by key.
    pub fn delete(&self, doc_key: &str) -> Result<Opstamp, SearchError> {
        let opstamp = self.apply(|writer| {
            writer.delete_term(Term::from_field_text(self.schema.doc_key, doc_key));
            Ok(())
        })?;
        debug!(doc_key, "Deleted document");
        Ok(opstamp)
    }

    /// Delete every document.
    pub fn delete_all(&self) -> Result<Opstamp, SearchError> {
        let opstamp = self.apply(|writer| {
            writer.delete_all_documents()?;
            Ok(())
        })?;
        info!("Deleted all documents");
        Ok(opstamp)
    }

    /// Merge all searchable segments into one.
    pub fn merge_segments(&self) -> Result<(), SearchError> {
        let mut writer = self.lock()?;
        let segment_ids = writer.index().searchable_segment_ids()?;
        if segment_ids.len() > 1 {
            let merge = writer.merge(&segment_ids);
            drop(writer);
            merge.wait()?;
            info!(segments = segment_ids.len(), "Merged index segments");
            writer = self.lock()?;
        }
        writer.commit()?;
        Ok(())
    }
}

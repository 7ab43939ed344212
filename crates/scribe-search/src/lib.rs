//! # scribe-search
//!
//! Full-text search over scribe documents using Tantivy.
//!
//! ## Features
//! - Embedded Tantivy index, recreated when its on-disk schema is stale
//! - One document per `(entity_type, entity_id)`, upserted by `doc_key`
//! - BM25 scoring over title, content and keywords
//! - Exact filters on entity type, entity id and language
//! - Per-type document counts

pub mod document;
pub mod error;
pub mod index;
pub mod indexer;
pub mod schema;
pub mod searcher;

pub use document::{document_to_hit, search_index_to_doc};
pub use error::SearchError;
pub use index::{DocumentIndex, DocumentIndexConfig};
pub use indexer::DocumentIndexer;
pub use schema::{build_document_schema, DocumentSchema};
pub use searcher::DocumentSearcher;

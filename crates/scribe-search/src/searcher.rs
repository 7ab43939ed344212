//! Search implementation using BM25 scoring.
//!
//! Free text is matched against title, content and keywords. Entity type,
//! entity id and language are exact-match filters.

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{IndexReader, TantivyDocument, Term};
use tracing::{debug, warn};

use scribe_types::{EntityType, SearchCriteria, SearchHit};

use crate::document::document_to_hit;
use crate::error::SearchError;
use crate::index::DocumentIndex;
use crate::schema::DocumentSchema;

/// Searcher for scribe documents.
pub struct DocumentSearcher {
    reader: IndexReader,
    schema: DocumentSchema,
    query_parser: QueryParser,
}

impl DocumentSearcher {
    /// Create a new searcher from a DocumentIndex.
    pub fn new(index: &DocumentIndex) -> Result<Self, SearchError> {
        let reader = index.reader()?;
        let schema = index.schema().clone();

        let query_parser = QueryParser::for_index(
            index.index(),
            vec![schema.title, schema.content, schema.keywords],
        );

        Ok(Self {
            reader,
            schema,
            query_parser,
        })
    }

    /// Reload the reader to see recent commits.
    pub fn reload(&self) -> Result<(), SearchError> {
        self.reader.reload()?;
        debug!("Reloaded search reader");
        Ok(())
    }

    fn term_filter(field: Field, value: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_text(field, value),
            IndexRecordOption::Basic,
        ))
    }

    fn build_query(&self, criteria: &SearchCriteria) -> Box<dyn Query> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        let text = criteria.query.trim();
        if !text.is_empty() {
            // Lenient parsing so user punctuation never fails a search
            let (query, errors) = self.query_parser.parse_query_lenient(text);
            if !errors.is_empty() {
                warn!(query = text, errors = errors.len(), "Query parsed leniently");
            }
            clauses.push((Occur::Must, query));
        }

        if let Some(entity_type) = criteria.entity_type {
            clauses.push((
                Occur::Must,
                Self::term_filter(self.schema.entity_type, entity_type.as_str()),
            ));
        }
        if let Some(entity_id) = criteria.entity_id {
            clauses.push((
                Occur::Must,
                Self::term_filter(self.schema.entity_id, &entity_id.to_string()),
            ));
        }
        if let Some(language) = &criteria.language {
            clauses.push((
                Occur::Must,
                Self::term_filter(self.schema.language, language),
            ));
        }

        match clauses.len() {
            0 => Box::new(AllQuery),
            1 => clauses.remove(0).1,
            _ => Box::new(BooleanQuery::new(clauses)),
        }
    }

    /// Run a search, returning one page of hits and the total match count.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<(Vec<SearchHit>, usize), SearchError> {
        let searcher = self.reader.searcher();
        let query = self.build_query(criteria);

        if criteria.limit == 0 {
            let total = searcher.search(&query, &Count)?;
            return Ok((Vec::new(), total));
        }

        let top_docs = TopDocs::with_limit(criteria.limit).and_offset(criteria.offset);
        let (top_docs, total) = searcher.search(&query, &(top_docs, Count))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            match document_to_hit(&self.schema, &doc, score) {
                Some(hit) => hits.push(hit),
                None => warn!(?doc_address, "Skipping document with malformed identity"),
            }
        }

        debug!(
            query = %criteria.query,
            hits = hits.len(),
            total,
            "Search complete"
        );

        Ok((hits, total))
    }

    /// Count documents of one entity type.
    pub fn count_by_type(&self, entity_type: EntityType) -> Result<u64, SearchError> {
        let searcher = self.reader.searcher();
        let query = Self::term_filter(self.schema.entity_type, entity_type.as_str());
        let count = searcher.search(&query, &Count)?;
        Ok(count as u64)
    }

    /// Get the number of indexed documents.
    pub fn num_docs(&self) -> u64 {
        let searcher = self.reader.searcher();
        searcher
            .segment_readers()
            .iter()
            .map(|r| r.num_docs() as u64)
            .sum()
    }
}

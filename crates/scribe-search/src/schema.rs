//! Tantivy schema definition for scribe documents.
//!
//! Every indexed entity becomes one document carrying its identity
//! (`doc_key`, `entity_type`, `entity_id`) and the searchable text fields
//! (`title`, `content`, `keywords`).

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

use crate::SearchError;

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    schema: Schema,
    /// Identity key `{entity_type}:{entity_id}` (STRING | STORED)
    pub doc_key: Field,
    /// Entity type: "post", "category", "tag" or "user" (STRING | STORED)
    pub entity_type: Field,
    /// Entity id as decimal text (STRING | STORED)
    pub entity_id: Field,
    /// Language tag (STRING | STORED)
    pub language: Field,
    /// Title (TEXT | STORED)
    pub title: Field,
    /// Body text (TEXT | STORED)
    pub content: Field,
    /// Comma-joined keywords (TEXT | STORED)
    pub keywords: Field,
    /// Last update in milliseconds (STRING | STORED)
    pub updated_at_ms: Field,
}

impl DocumentSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create a DocumentSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {} field", name)))
        };

        Ok(Self {
            doc_key: field("doc_key")?,
            entity_type: field("entity_type")?,
            entity_id: field("entity_id")?,
            language: field("language")?,
            title: field("title")?,
            content: field("content")?,
            keywords: field("keywords")?,
            updated_at_ms: field("updated_at_ms")?,
            schema,
        })
    }
}

/// Build the document schema.
pub fn build_document_schema() -> DocumentSchema {
    let mut schema_builder = Schema::builder();

    // Identity and filters are exact-match
    let doc_key = schema_builder.add_text_field("doc_key", STRING | STORED);
    let entity_type = schema_builder.add_text_field("entity_type", STRING | STORED);
    let entity_id = schema_builder.add_text_field("entity_id", STRING | STORED);
    let language = schema_builder.add_text_field("language", STRING | STORED);

    let title = schema_builder.add_text_field("title", TEXT | STORED);
    let content = schema_builder.add_text_field("content", TEXT | STORED);
    let keywords = schema_builder.add_text_field("keywords", TEXT | STORED);

    let updated_at_ms = schema_builder.add_text_field("updated_at_ms", STRING | STORED);

    let schema = schema_builder.build();

    DocumentSchema {
        schema,
        doc_key,
        entity_type,
        entity_id,
        language,
        title,
        content,
        keywords,
        updated_at_ms,
    }
}

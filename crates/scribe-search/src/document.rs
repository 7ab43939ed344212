//! Mapping between `SearchIndex` rows and Tantivy documents.

use tantivy::doc;
use tantivy::schema::Value;
use tantivy::TantivyDocument;

use scribe_types::{EntityType, SearchHit, SearchIndex};

use crate::schema::DocumentSchema;

/// Convert a SearchIndex row to a Tantivy document.
pub fn search_index_to_doc(schema: &DocumentSchema, row: &SearchIndex) -> TantivyDocument {
    doc!(
        schema.doc_key => row.doc_key(),
        schema.entity_type => row.entity_type.as_str(),
        schema.entity_id => row.entity_id.to_string(),
        schema.language => row.language.clone(),
        schema.title => row.title.clone(),
        schema.content => row.content.clone(),
        schema.keywords => row.keywords.clone(),
        schema.updated_at_ms => row.updated_at.timestamp_millis().to_string()
    )
}

/// Rebuild a hit from a stored document.
///
/// Returns None when the identity fields are missing or unparseable.
pub fn document_to_hit(
    schema: &DocumentSchema,
    doc: &TantivyDocument,
    score: f32,
) -> Option<SearchHit> {
    let text = |field| {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    let entity_type = EntityType::parse(&text(schema.entity_type))?;
    let entity_id = text(schema.entity_id).parse().ok()?;

    Some(SearchHit {
        entity_type,
        entity_id,
        title: text(schema.title),
        content: text(schema.content),
        keywords: text(schema.keywords),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_document_schema;

    fn sample_row() -> SearchIndex {
        SearchIndex::new(
            EntityType::Post,
            42,
            "Fearless concurrency",
            "Send and Sync explained",
            "en",
        )
        .with_keywords(["rust", "threads"])
    }

    #[test]
    fn test_search_index_to_doc() {
        let schema = build_document_schema();
        let doc = search_index_to_doc(&schema, &sample_row());

        let doc_key = doc.get_first(schema.doc_key).unwrap();
        assert_eq!(doc_key.as_str(), Some("post:42"));

        let entity_id = doc.get_first(schema.entity_id).unwrap();
        assert_eq!(entity_id.as_str(), Some("42"));

        let keywords = doc.get_first(schema.keywords).unwrap();
        assert_eq!(keywords.as_str(), Some("rust,threads"));
    }

    #[test]
    fn test_document_to_hit() {
        let schema = build_document_schema();
        let doc = search_index_to_doc(&schema, &sample_row());

        let hit = document_to_hit(&schema, &doc, 1.5).unwrap();
        assert_eq!(hit.entity_type, EntityType::Post);
        assert_eq!(hit.entity_id, 42);
        assert_eq!(hit.title, "Fearless concurrency");
        assert_eq!(hit.score, 1.5);
    }

    #[test]
    fn test_document_to_hit_rejects_unknown_type() {
        let schema = build_document_schema();
        let doc = doc!(
            schema.entity_type => "comment",
            schema.entity_id => "1"
        );
        assert!(document_to_hit(&schema, &doc, 1.0).is_none());
    }
}

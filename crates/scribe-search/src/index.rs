//! Tantivy index lifecycle for scribe documents.
//!
//! The on-disk index is derived data. When an existing index was written
//! with a different schema it is either replaced by an empty one (and left
//! for a rebuild to repopulate) or rejected, depending on configuration.

use std::path::{Path, PathBuf};

use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info, warn};

use scribe_types::{SearchSettings, Settings};

use crate::error::SearchError;
use crate::schema::{build_document_schema, DocumentSchema};

const META_FILE: &str = "meta.json";

/// Where the index lives and how its writer is sized.
#[derive(Debug, Clone)]
pub struct DocumentIndexConfig {
    pub index_path: PathBuf,
    pub search: SearchSettings,
}

impl DocumentIndexConfig {
    /// Config for `index_path` with default tuning.
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            search: SearchSettings::default(),
        }
    }

    /// Config taken from application settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            index_path: settings.expanded_search_index_path(),
            search: settings.search.clone(),
        }
    }
}

/// Opened Tantivy index with resolved schema fields.
pub struct DocumentIndex {
    index: Index,
    schema: DocumentSchema,
    config: DocumentIndexConfig,
}

impl DocumentIndex {
    /// Open the index at the configured path, creating it when absent.
    pub fn open_or_create(config: DocumentIndexConfig) -> Result<Self, SearchError> {
        config.search.validate().map_err(SearchError::Config)?;

        let expected = build_document_schema();
        let path = config.index_path.as_path();

        let index = if !path.join(META_FILE).exists() {
            create_index(path, &expected)?
        } else {
            let existing = Index::open_in_dir(path)?;
            match schema_mismatch(expected.schema(), &existing.schema()) {
                None => {
                    debug!(path = ?path, "Opened existing index");
                    existing
                }
                Some(reason) if config.search.recreate_on_schema_mismatch => {
                    warn!(path = ?path, reason = %reason, "Index schema changed, recreating empty index");
                    drop(existing);
                    std::fs::remove_dir_all(path)?;
                    create_index(path, &expected)?
                }
                Some(reason) => return Err(SearchError::SchemaMismatch(reason)),
            }
        };

        let schema = DocumentSchema::from_schema(index.schema())?;
        info!(path = ?path, "Opened document index");

        Ok(Self {
            index,
            schema,
            config,
        })
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Create an IndexWriter with the configured memory budget.
    pub fn writer(&self) -> Result<IndexWriter, SearchError> {
        let memory_mb = self.config.search.writer_memory_mb;
        let writer = self.index.writer(memory_mb * 1024 * 1024)?;
        debug!(memory_mb, "Created index writer");
        Ok(writer)
    }

    /// Create an IndexReader that follows commits.
    pub fn reader(&self) -> Result<IndexReader, SearchError> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;
        Ok(reader)
    }

    /// True while the index metadata is present on disk.
    pub fn exists(&self) -> bool {
        self.config.index_path.join(META_FILE).exists()
    }

    /// Total size of the files in the index directory.
    pub fn size_in_bytes(&self) -> Result<u64, SearchError> {
        let mut total = 0u64;
        for entry in std::fs::read_dir(&self.config.index_path)? {
            let metadata = entry?.metadata()?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }
}

fn create_index(path: &Path, schema: &DocumentSchema) -> Result<Index, SearchError> {
    info!(path = ?path, "Creating new index");
    std::fs::create_dir_all(path)?;
    Ok(Index::create_in_dir(path, schema.schema().clone())?)
}

/// Describe the first difference between the expected and on-disk schema.
fn schema_mismatch(expected: &Schema, actual: &Schema) -> Option<String> {
    for (_, entry) in expected.fields() {
        let name = entry.name();
        match actual.get_field(name) {
            Err(_) => return Some(format!("missing field {}", name)),
            Ok(field) if actual.get_field_entry(field) != entry => {
                return Some(format!("field {} has different options", name))
            }
            Ok(_) => {}
        }
    }
    let extra = actual
        .fields()
        .count()
        .saturating_sub(expected.fields().count());
    if extra > 0 {
        return Some(format!("{} unexpected field(s)", extra));
    }
    None
}

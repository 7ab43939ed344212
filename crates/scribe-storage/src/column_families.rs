//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with different access patterns:
//! - posts, categories, tags, users: system-of-record entities keyed by id
//! - search_index: derived SearchIndex rows keyed by surrogate id
//! - search_index_keys: `{entity_type}:{entity_id}` -> surrogate id

use rocksdb::{ColumnFamilyDescriptor, Options};

use scribe_types::EntityType;

/// Column family name for posts
pub const CF_POSTS: &str = "posts";

/// Column family name for categories
pub const CF_CATEGORIES: &str = "categories";

/// Column family name for tags
pub const CF_TAGS: &str = "tags";

/// Column family name for users
pub const CF_USERS: &str = "users";

/// Column family name for derived SearchIndex rows
pub const CF_SEARCH_INDEX: &str = "search_index";

/// Column family name for the SearchIndex identity lookup
pub const CF_SEARCH_INDEX_KEYS: &str = "search_index_keys";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_POSTS,
    CF_CATEGORIES,
    CF_TAGS,
    CF_USERS,
    CF_SEARCH_INDEX,
    CF_SEARCH_INDEX_KEYS,
];

/// Column family holding entities of the given type.
pub fn entity_cf(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Post => CF_POSTS,
        EntityType::Category => CF_CATEGORIES,
        EntityType::Tag => CF_TAGS,
        EntityType::User => CF_USERS,
    }
}

/// Post bodies dominate storage; compress them.
fn posts_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_POSTS, posts_options()),
        ColumnFamilyDescriptor::new(CF_CATEGORIES, Options::default()),
        ColumnFamilyDescriptor::new(CF_TAGS, Options::default()),
        ColumnFamilyDescriptor::new(CF_USERS, Options::default()),
        ColumnFamilyDescriptor::new(CF_SEARCH_INDEX, Options::default()),
        ColumnFamilyDescriptor::new(CF_SEARCH_INDEX_KEYS, Options::default()),
    ]
}

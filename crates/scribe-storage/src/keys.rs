//! Key encoding and decoding for storage layer.
//!
//! Numeric ids are zero-padded to 20 digits so that lexicographic key order
//! matches numeric order, which makes "resume after id N" paging a plain
//! forward iteration.
//!
//! - entity keys: `{id:020}` inside the entity's column family
//! - row keys: `idx:{id:020}` inside search_index
//! - identity keys: `{entity_type}:{entity_id}` inside search_index_keys

use scribe_types::{EntityId, EntityType};

use crate::error::StorageError;

/// Key for an entity record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityKey {
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{:020}", self.id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
        let id = s
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid entity key {}: {}", s, e)))?;
        Ok(Self { id })
    }
}

/// Key for a SearchIndex row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowKey {
    pub id: u64,
}

impl RowKey {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Encode key to bytes for storage
    /// Format: "idx:{id:020}"
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("idx:{:020}", self.id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
        let digits = s
            .strip_prefix("idx:")
            .ok_or_else(|| StorageError::Key(format!("Invalid row key format: {}", s)))?;
        let id = digits
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid row id {}: {}", digits, e)))?;
        Ok(Self { id })
    }
}

/// Identity key mapping an entity to its SearchIndex row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityKey {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
}

impl IdentityKey {
    pub fn new(entity_type: EntityType, entity_id: EntityId) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        scribe_types::doc_key(self.entity_type, self.entity_id).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_roundtrip() {
        let key = EntityKey::new(42);
        assert_eq!(key.to_bytes(), b"00000000000000000042".to_vec());
        assert_eq!(EntityKey::from_bytes(&key.to_bytes()).unwrap(), key);
    }

    #[test]
    fn test_entity_keys_sort_numerically() {
        assert!(EntityKey::new(9).to_bytes() < EntityKey::new(10).to_bytes());
        assert!(EntityKey::new(99).to_bytes() < EntityKey::new(1000).to_bytes());
    }

    #[test]
    fn test_row_key_roundtrip() {
        let key = RowKey::new(7);
        let decoded = RowKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(decoded.id, 7);
    }

    #[test]
    fn test_row_key_invalid() {
        assert!(RowKey::from_bytes(b"post:7").is_err());
        assert!(RowKey::from_bytes(b"idx:abc").is_err());
    }

    #[test]
    fn test_identity_key() {
        let key = IdentityKey::new(EntityType::Category, 3);
        assert_eq!(key.to_bytes(), b"category:3".to_vec());
    }
}

//! Primary-key construction: the byte addressing scheme shared by the main
//! table and every GSI auxiliary table.

use ddb_expr::{AttributeValue, Entry, KeySchema};

use crate::error::{Result, StorageError};

/// The composite primary key of an item: partition bytes, plus sort bytes
/// when the schema has a sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub partition: Vec<u8>,
    pub sort: Option<Vec<u8>>,
}

/// Separator between partition and sort bytes in the composite key string.
///
/// Known ambiguity: `|` collides with partition/sort values that themselves
/// contain a `|` byte. Retained for wire compatibility with existing
/// clients rather than switched to a length-prefixed encoding.
const SEPARATOR: u8 = 0x7C;

impl PrimaryKey {
    /// Builds a `PrimaryKey` from an entry using the given key schema.
    pub fn from_entry(entry: &Entry, schema: &KeySchema) -> Result<Self> {
        let partition = entry
            .get(&schema.partition_key)
            .ok_or_else(|| StorageError::MissingKeyAttribute(schema.partition_key.clone()))?
            .key_bytes();
        let sort = match &schema.sort_key {
            Some(sort_key) => {
                let v = entry
                    .get(sort_key)
                    .ok_or_else(|| StorageError::MissingKeyAttribute(sort_key.clone()))?;
                Some(v.key_bytes())
            }
            None => None,
        };
        Ok(Self { partition, sort })
    }

    /// The composite byte string stored as the row's primary key column:
    /// `pk` alone, or `pk || 0x7C || sk` when a sort key is present.
    #[must_use]
    pub fn composite(&self) -> Vec<u8> {
        match &self.sort {
            Some(sort) => {
                let mut out = Vec::with_capacity(self.partition.len() + 1 + sort.len());
                out.extend_from_slice(&self.partition);
                out.push(SEPARATOR);
                out.extend_from_slice(sort);
                out
            }
            None => self.partition.clone(),
        }
    }
}

/// Extracts the partition/sort key attribute values from `entry` for
/// `schema`. Unlike `PrimaryKey::from_entry`, a missing sort-key attribute
/// is tolerated and yields empty sort bytes (used by GSI projection, where
/// an item lacking the index's sort-key attribute is simply excluded from
/// range ordering rather than erroring).
#[must_use]
pub fn gsi_key_bytes(entry: &Entry, schema: &KeySchema) -> Option<(Vec<u8>, Vec<u8>)> {
    let partition = entry.get(&schema.partition_key)?.key_bytes();
    let sort = match &schema.sort_key {
        Some(sort_key) => entry.get(sort_key).map(AttributeValue::key_bytes).unwrap_or_default(),
        None => Vec::new(),
    };
    Some((partition, sort))
}

//! The table catalog: schema, GSI settings, and billing configuration.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ddb_expr::TypeTag;

/// How a GSI's projection is shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionType {
    /// Base-table key attributes plus the index's own key attributes.
    KeysOnly,
    /// `KeysOnly` plus the named non-key attributes, when present.
    Include(Vec<String>),
    /// The entire item body.
    All,
}

/// A single global secondary index's configuration.
#[derive(Debug, Clone)]
pub struct GlobalSecondaryIndexSetting {
    pub index_name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
    pub projection: ProjectionType,
}

/// A table's billing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    /// Rate-limited by `read_capacity_units`/`write_capacity_units`.
    Provisioned,
    /// No rate limiting.
    PayPerRequest,
}

/// Immutable (except billing/throughput) per-table schema.
#[derive(Debug, Clone)]
pub struct TableMetaData {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
    pub attribute_types: BTreeMap<String, TypeTag>,
    pub gsis: Vec<GlobalSecondaryIndexSetting>,
    pub billing_mode: BillingMode,
    pub read_capacity_units: Option<i64>,
    pub write_capacity_units: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TableMetaData {
    /// The key schema for the base table, for compiling key-condition
    /// expressions against `Query`.
    #[must_use]
    pub fn key_schema(&self) -> ddb_expr::KeySchema {
        ddb_expr::KeySchema {
            partition_key: self.partition_key.clone(),
            sort_key: self.sort_key.clone(),
        }
    }

    /// Looks up a GSI by name, along with its key schema.
    #[must_use]
    pub fn gsi(&self, index_name: &str) -> Option<&GlobalSecondaryIndexSetting> {
        self.gsis.iter().find(|g| g.index_name == index_name)
    }
}

impl GlobalSecondaryIndexSetting {
    #[must_use]
    pub fn key_schema(&self) -> ddb_expr::KeySchema {
        ddb_expr::KeySchema {
            partition_key: self.partition_key.clone(),
            sort_key: self.sort_key.clone(),
        }
    }
}

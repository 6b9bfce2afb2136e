//! The transactional storage engine (S): table catalog, per-table primary
//! and per-GSI auxiliary sqlite tables, the two-slot tuple history,
//! conditional writes, and a coarse rate limiter.

mod catalog;
mod engine;
mod error;
mod key;
mod ratelimit;
mod tuple;
mod txn;

pub use catalog::{BillingMode, GlobalSecondaryIndexSetting, ProjectionType, TableMetaData};
pub use engine::StorageEngine;
pub use error::{Result, StorageError};
pub use key::PrimaryKey;
pub use tuple::{EntryWrapper, Tuple};
pub use txn::{Catalog, Txn};

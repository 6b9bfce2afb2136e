//! RAII transaction handles over the storage engine's single reader-writer
//! lock plus a sqlite transaction.

use sqlx::{Sqlite, Transaction};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};

use crate::catalog::TableMetaData;
use crate::error::Result;

/// The catalog guarded by the storage engine's single lock.
#[derive(Debug, Default)]
pub struct Catalog {
    pub tables: std::collections::HashMap<String, TableMetaData>,
}

enum Guard {
    Shared(OwnedRwLockReadGuard<Catalog>),
    Exclusive(OwnedRwLockWriteGuard<Catalog>),
}

/// A transaction scope: from `begin` to `commit`/`rollback`. Dropping
/// without an explicit terminal call rolls back (sqlx's own `Drop`
/// behavior) and always releases the catalog lock exactly once, since the
/// guard is owned by this struct's lifetime.
pub struct Txn {
    guard: Guard,
    sql: Option<Transaction<'static, Sqlite>>,
}

impl Txn {
    pub(crate) fn new_shared(guard: OwnedRwLockReadGuard<Catalog>, sql: Transaction<'static, Sqlite>) -> Self {
        Self {
            guard: Guard::Shared(guard),
            sql: Some(sql),
        }
    }

    pub(crate) fn new_exclusive(guard: OwnedRwLockWriteGuard<Catalog>, sql: Transaction<'static, Sqlite>) -> Self {
        Self {
            guard: Guard::Exclusive(guard),
            sql: Some(sql),
        }
    }

    /// Read-only access to the catalog, available under either lock kind.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        match &self.guard {
            Guard::Shared(g) => g,
            Guard::Exclusive(g) => g,
        }
    }

    /// Mutable access to the catalog; only available under the exclusive
    /// lock (table create/delete/update).
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        match &mut self.guard {
            Guard::Exclusive(g) => g,
            Guard::Shared(_) => unreachable!("catalog_mut called on a shared transaction"),
        }
    }

    pub(crate) fn sql(&mut self) -> &mut Transaction<'static, Sqlite> {
        self.sql.as_mut().expect("transaction already terminated")
    }

    /// Commits the sqlite transaction and releases the lock.
    pub async fn commit(mut self) -> Result<()> {
        self.sql.take().expect("transaction already terminated").commit().await?;
        Ok(())
    }

    /// Rolls back the sqlite transaction and releases the lock.
    pub async fn rollback(mut self) -> Result<()> {
        self.sql.take().expect("transaction already terminated").rollback().await?;
        Ok(())
    }
}

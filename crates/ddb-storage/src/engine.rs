//! The storage engine (S): table catalog, per-table primary and per-GSI
//! auxiliary sqlite tables, the two-slot tuple history, transactions, and
//! the rate limiter.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ddb_expr::{CompiledCondition, CompiledUpdate, Entry, Query};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

use crate::catalog::{BillingMode, GlobalSecondaryIndexSetting, ProjectionType, TableMetaData};
use crate::error::{Result, StorageError};
use crate::key::{gsi_key_bytes, PrimaryKey};
use crate::ratelimit::RateLimiter;
use crate::tuple::{EntryWrapper, Tuple};
use crate::txn::{Catalog, Txn};

/// The embedded, in-memory storage engine shared by every request handler.
pub struct StorageEngine {
    pool: SqlitePool,
    state: Arc<RwLock<Catalog>>,
    limiters: Mutex<HashMap<String, RateLimiter>>,
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn table_name(table: &str) -> String {
    format!("t_{}", sanitize(table))
}

fn gsi_table_name(table: &str, index: &str) -> String {
    format!("gsi_{}_{}", sanitize(table), sanitize(index))
}

impl StorageEngine {
    /// Connects a fresh, empty in-memory sqlite database.
    pub async fn new() -> Result<Self> {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await?;
        Ok(Self {
            pool,
            state: Arc::new(RwLock::new(Catalog::default())),
            limiters: Mutex::new(HashMap::new()),
        })
    }

    /// Opens a transaction holding the appropriate share of the storage
    /// lock for its lifetime.
    pub async fn begin(&self, exclusive: bool) -> Result<Txn> {
        let sql = self.pool.begin().await?;
        if exclusive {
            let guard = self.state.clone().write_owned().await;
            Ok(Txn::new_exclusive(guard, sql))
        } else {
            let guard = self.state.clone().read_owned().await;
            Ok(Txn::new_shared(guard, sql))
        }
    }

    /// Charges one token against the table's bucket; reads and writes both
    /// charge a single token, per spec.
    async fn charge(&self, meta: &TableMetaData, _write: bool) -> Result<()> {
        if meta.billing_mode != BillingMode::Provisioned {
            return Ok(());
        }
        let mut limiters = self.limiters.lock().await;
        let limiter = limiters
            .entry(meta.name.clone())
            .or_insert_with(|| RateLimiter::new(meta.write_capacity_units.unwrap_or(1)));
        if limiter.try_charge() {
            Ok(())
        } else {
            Err(StorageError::ThroughputExceeded(meta.name.clone()))
        }
    }

    fn require_table<'a>(txn: &'a Txn, table: &str) -> Result<&'a TableMetaData> {
        txn.catalog()
            .tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }

    // ---- catalog operations ----

    #[instrument(skip(self, txn))]
    pub async fn create_table_with_txn(&self, txn: &mut Txn, meta: TableMetaData) -> Result<()> {
        if txn.catalog().tables.contains_key(&meta.name) {
            return Err(StorageError::TableAlreadyExists(meta.name));
        }
        let main = table_name(&meta.name);
        sqlx::query(&format!(
            "CREATE TABLE {main} (primary_key BLOB PRIMARY KEY, partition_key BLOB NOT NULL, sort_key BLOB, body BLOB NOT NULL)"
        ))
        .execute(&mut *txn.sql())
        .await?;
        sqlx::query(&format!("CREATE INDEX idx_{main}_range ON {main} (partition_key, sort_key)"))
            .execute(&mut *txn.sql())
            .await?;

        for gsi in &meta.gsis {
            let aux = gsi_table_name(&meta.name, &gsi.index_name);
            sqlx::query(&format!(
                "CREATE TABLE {aux} (primary_key BLOB PRIMARY KEY, main_partition_key BLOB, main_sort_key BLOB, partition_key BLOB, sort_key BLOB, body BLOB NOT NULL)"
            ))
            .execute(&mut *txn.sql())
            .await?;
            sqlx::query(&format!("CREATE INDEX idx_{aux}_range ON {aux} (partition_key, sort_key)"))
                .execute(&mut *txn.sql())
                .await?;
        }

        txn.catalog_mut().tables.insert(meta.name.clone(), meta);
        Ok(())
    }

    pub async fn create_table(&self, meta: TableMetaData) -> Result<()> {
        let mut txn = self.begin(true).await?;
        self.create_table_with_txn(&mut txn, meta).await?;
        txn.commit().await
    }

    #[instrument(skip(self, txn))]
    pub async fn delete_table_with_txn(&self, txn: &mut Txn, table: &str) -> Result<TableMetaData> {
        let meta = Self::require_table(txn, table)?.clone();
        let main = table_name(table);
        sqlx::query(&format!("DROP TABLE {main}")).execute(&mut *txn.sql()).await?;
        for gsi in &meta.gsis {
            let aux = gsi_table_name(table, &gsi.index_name);
            sqlx::query(&format!("DROP TABLE {aux}")).execute(&mut *txn.sql()).await?;
        }
        txn.catalog_mut().tables.remove(table);
        Ok(meta)
    }

    pub async fn delete_table(&self, table: &str) -> Result<TableMetaData> {
        let mut txn = self.begin(true).await?;
        let meta = self.delete_table_with_txn(&mut txn, table).await?;
        txn.commit().await?;
        Ok(meta)
    }

    pub async fn describe_table(&self, table: &str) -> Result<TableMetaData> {
        let txn = self.begin(false).await?;
        let meta = Self::require_table(&txn, table)?.clone();
        txn.commit().await?;
        Ok(meta)
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let txn = self.begin(false).await?;
        let mut names: Vec<String> = txn.catalog().tables.keys().cloned().collect();
        names.sort();
        txn.commit().await?;
        Ok(names)
    }

    pub async fn update_table_throughput(
        &self,
        table: &str,
        read_capacity_units: Option<i64>,
        write_capacity_units: Option<i64>,
    ) -> Result<TableMetaData> {
        let mut txn = self.begin(true).await?;
        let meta = txn
            .catalog_mut()
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        if let Some(rcu) = read_capacity_units {
            meta.read_capacity_units = Some(rcu);
        }
        if let Some(wcu) = write_capacity_units {
            meta.write_capacity_units = Some(wcu);
        }
        let updated = meta.clone();
        self.limiters.lock().await.remove(table);
        txn.commit().await?;
        Ok(updated)
    }

    // ---- tuple I/O ----

    async fn load_tuple(txn: &mut Txn, table: &str, composite_key: &[u8]) -> Result<Tuple> {
        let row = sqlx::query(&format!("SELECT body FROM {table} WHERE primary_key = ?"))
            .bind(composite_key)
            .fetch_optional(&mut *txn.sql())
            .await?;
        match row {
            Some(row) => {
                let body: Vec<u8> = row.get("body");
                Ok(serde_json::from_slice(&body)?)
            }
            None => Ok(Tuple::new()),
        }
    }

    async fn store_tuple(
        txn: &mut Txn,
        table: &str,
        composite_key: &[u8],
        pk: &PrimaryKey,
        tuple: &Tuple,
    ) -> Result<()> {
        let body = serde_json::to_vec(tuple)?;
        let sort = pk.sort.clone().unwrap_or_default();
        sqlx::query(&format!(
            "INSERT INTO {table} (primary_key, partition_key, sort_key, body) VALUES (?, ?, ?, ?)
             ON CONFLICT(primary_key) DO UPDATE SET body = excluded.body"
        ))
        .bind(composite_key)
        .bind(&pk.partition)
        .bind(&sort)
        .bind(body)
        .execute(&mut *txn.sql())
        .await?;
        Ok(())
    }

    // ---- item operations ----

    #[instrument(skip(self, txn, entry, condition))]
    pub async fn put_with_txn(
        &self,
        txn: &mut Txn,
        table: &str,
        entry: Entry,
        condition: Option<&CompiledCondition>,
    ) -> Result<()> {
        let meta = Self::require_table(txn, table)?.clone();
        self.charge(&meta, true).await?;
        let schema = meta.key_schema();
        let pk = PrimaryKey::from_entry(&entry, &schema)?;
        let composite = pk.composite();
        let main = table_name(table);

        let mut tuple = Self::load_tuple(txn, &main, &composite).await?;
        if let Some(cond) = condition {
            let current = tuple.current().cloned().unwrap_or_default();
            if !cond.evaluate(&current)? {
                return Err(StorageError::ConditionalCheckFailed);
            }
        }
        tuple.push(EntryWrapper {
            entry: entry.clone(),
            tombstone: false,
            created_at: Utc::now(),
        });
        Self::store_tuple(txn, &main, &composite, &pk, &tuple).await?;
        self.sync_gsis(txn, &meta, &pk, &entry, false).await?;
        Ok(())
    }

    pub async fn put(&self, table: &str, entry: Entry, condition: Option<&CompiledCondition>) -> Result<()> {
        let mut txn = self.begin(true).await?;
        match self.put_with_txn(&mut txn, table, entry, condition).await {
            Ok(()) => txn.commit().await,
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    #[instrument(skip(self, txn, key_entry, condition))]
    pub async fn delete_with_txn(
        &self,
        txn: &mut Txn,
        table: &str,
        key_entry: Entry,
        condition: Option<&CompiledCondition>,
    ) -> Result<()> {
        let meta = Self::require_table(txn, table)?.clone();
        self.charge(&meta, true).await?;
        let schema = meta.key_schema();
        let pk = PrimaryKey::from_entry(&key_entry, &schema)?;
        let composite = pk.composite();
        let main = table_name(table);

        let mut tuple = Self::load_tuple(txn, &main, &composite).await?;
        let prior_entry = tuple.current().cloned();
        if let Some(cond) = condition {
            let current = prior_entry.clone().unwrap_or_default();
            if !cond.evaluate(&current)? {
                return Err(StorageError::ConditionalCheckFailed);
            }
        }
        tuple.push(EntryWrapper {
            entry: key_entry.clone(),
            tombstone: true,
            created_at: Utc::now(),
        });
        Self::store_tuple(txn, &main, &composite, &pk, &tuple).await?;
        let projection_source = prior_entry.unwrap_or(key_entry);
        self.sync_gsis(txn, &meta, &pk, &projection_source, true).await?;
        Ok(())
    }

    pub async fn delete(&self, table: &str, key_entry: Entry, condition: Option<&CompiledCondition>) -> Result<()> {
        let mut txn = self.begin(true).await?;
        match self.delete_with_txn(&mut txn, table, key_entry, condition).await {
            Ok(()) => txn.commit().await,
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    #[instrument(skip(self, txn, key_entry, condition, update))]
    pub async fn update_with_txn(
        &self,
        txn: &mut Txn,
        table: &str,
        key_entry: Entry,
        update: &CompiledUpdate,
        condition: Option<&CompiledCondition>,
    ) -> Result<Entry> {
        let meta = Self::require_table(txn, table)?.clone();
        let schema = meta.key_schema();
        let pk = PrimaryKey::from_entry(&key_entry, &schema)?;
        let composite = pk.composite();
        let main = table_name(table);

        let tuple = Self::load_tuple(txn, &main, &composite).await?;
        let mut working = tuple.current().cloned().unwrap_or_else(|| key_entry.clone());
        if let Some(cond) = condition {
            if !cond.evaluate(&working)? {
                return Err(StorageError::ConditionalCheckFailed);
            }
        }
        update.apply(&mut working)?;
        self.put_with_txn(txn, table, working.clone(), None).await?;
        Ok(working)
    }

    pub async fn update(
        &self,
        table: &str,
        key_entry: Entry,
        update: &CompiledUpdate,
        condition: Option<&CompiledCondition>,
    ) -> Result<Entry> {
        let mut txn = self.begin(true).await?;
        match self.update_with_txn(&mut txn, table, key_entry, update, condition).await {
            Ok(entry) => {
                txn.commit().await?;
                Ok(entry)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    #[instrument(skip(self, key_entry))]
    pub async fn get(&self, table: &str, key_entry: &Entry, consistent: bool) -> Result<Option<Entry>> {
        let mut txn = self.begin(false).await?;
        let meta = Self::require_table(&txn, table)?.clone();
        self.charge(&meta, false).await?;
        let schema = meta.key_schema();
        let pk = PrimaryKey::from_entry(key_entry, &schema)?;
        let main = table_name(table);
        let tuple = Self::load_tuple(&mut txn, &main, &pk.composite()).await?;
        let result = tuple.read(consistent).cloned();
        txn.commit().await?;
        Ok(result)
    }

    // ---- GSI synchronization ----

    async fn sync_gsis(
        &self,
        txn: &mut Txn,
        meta: &TableMetaData,
        base_pk: &PrimaryKey,
        projection_source: &Entry,
        tombstone: bool,
    ) -> Result<()> {
        let gsis = meta.gsis.clone();
        let base_schema = meta.key_schema();
        for gsi in &gsis {
            self.sync_one_gsi(txn, &meta.name, gsi, &base_schema, base_pk, projection_source, tombstone)
                .await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn sync_one_gsi(
        &self,
        txn: &mut Txn,
        table: &str,
        gsi: &GlobalSecondaryIndexSetting,
        base_schema: &ddb_expr::KeySchema,
        base_pk: &PrimaryKey,
        projection_source: &Entry,
        tombstone: bool,
    ) -> Result<()> {
        let schema = gsi.key_schema();
        let Some((gsi_partition, gsi_sort)) = gsi_key_bytes(projection_source, &schema) else {
            return Ok(());
        };
        let key_names = projected_key_names(base_schema, &schema);
        let projected = project(&key_names, &gsi.projection, projection_source);

        let aux = gsi_table_name(table, &gsi.index_name);
        let base_composite = base_pk.composite();
        let mut tuple = {
            let row = sqlx::query(&format!("SELECT body FROM {aux} WHERE primary_key = ?"))
                .bind(&base_composite)
                .fetch_optional(&mut *txn.sql())
                .await?;
            match row {
                Some(row) => {
                    let body: Vec<u8> = row.get("body");
                    serde_json::from_slice::<Tuple>(&body)?
                }
                None => Tuple::new(),
            }
        };
        tuple.push(EntryWrapper {
            entry: projected,
            tombstone,
            created_at: Utc::now(),
        });
        let body = serde_json::to_vec(&tuple)?;
        sqlx::query(&format!(
            "INSERT INTO {aux} (primary_key, main_partition_key, main_sort_key, partition_key, sort_key, body)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(primary_key) DO UPDATE SET body = excluded.body,
                partition_key = excluded.partition_key, sort_key = excluded.sort_key"
        ))
        .bind(&base_composite)
        .bind(&base_pk.partition)
        .bind(base_pk.sort.clone().unwrap_or_default())
        .bind(&gsi_partition)
        .bind(&gsi_sort)
        .bind(body)
        .execute(&mut *txn.sql())
        .await?;
        Ok(())
    }

    // ---- range reads ----

    #[instrument(skip(self, txn, query, filter))]
    #[allow(clippy::too_many_arguments)]
    pub async fn query_with_txn(
        &self,
        txn: &mut Txn,
        table: &str,
        index_name: Option<&str>,
        query: &Query,
        consistent: bool,
        forward: bool,
        limit: Option<usize>,
        exclusive_start_key: Option<Vec<u8>>,
        filter: Option<&CompiledCondition>,
    ) -> Result<(Vec<Entry>, usize)> {
        let meta = Self::require_table(txn, table)?.clone();
        self.charge(&meta, false).await?;
        let sql_table = match index_name {
            Some(name) => {
                if meta.gsi(name).is_none() {
                    return Err(StorageError::IndexNotFound(name.to_string(), table.to_string()));
                }
                gsi_table_name(table, name)
            }
            None => table_name(table),
        };

        let direction = if forward { "ASC" } else { "DESC" };
        let fetch_limit = limit.map(|l| (l * 3).max(l));
        let mut sql = format!(
            "SELECT primary_key, sort_key, body FROM {sql_table} WHERE partition_key = ?"
        );
        if exclusive_start_key.is_some() {
            sql.push_str(if forward {
                " AND primary_key > ?"
            } else {
                " AND primary_key < ?"
            });
        }
        sql.push_str(&format!(" ORDER BY sort_key {direction}, primary_key {direction}"));
        if let Some(n) = fetch_limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        let mut q = sqlx::query(&sql).bind(&query.partition_key_bytes);
        if let Some(start) = &exclusive_start_key {
            q = q.bind(start);
        }
        let rows = q.fetch_all(&mut *txn.sql()).await?;

        let mut results = Vec::new();
        let mut scanned = 0usize;
        for row in rows {
            scanned += 1;
            let sort_key: Vec<u8> = row.get("sort_key");
            if let Some(pred) = &query.sort_predicate {
                if !pred.matches(&sort_key) {
                    continue;
                }
            }
            let body: Vec<u8> = row.get("body");
            let tuple: Tuple = serde_json::from_slice(&body)?;
            let Some(entry) = tuple.read(consistent) else { continue };
            if let Some(f) = filter {
                if !f.evaluate(entry)? {
                    continue;
                }
            }
            results.push(entry.clone());
            if let Some(n) = limit {
                if results.len() >= n {
                    break;
                }
            }
        }
        Ok((results, scanned))
    }

    #[instrument(skip(self, txn, filter))]
    #[allow(clippy::too_many_arguments)]
    pub async fn scan_with_txn(
        &self,
        txn: &mut Txn,
        table: &str,
        index_name: Option<&str>,
        consistent: bool,
        segment: Option<(u32, u32)>,
        limit: Option<usize>,
        exclusive_start_key: Option<Vec<u8>>,
        filter: Option<&CompiledCondition>,
    ) -> Result<(Vec<Entry>, usize)> {
        let meta = Self::require_table(txn, table)?.clone();
        self.charge(&meta, false).await?;
        let sql_table = match index_name {
            Some(name) => {
                if meta.gsi(name).is_none() {
                    return Err(StorageError::IndexNotFound(name.to_string(), table.to_string()));
                }
                gsi_table_name(table, name)
            }
            None => table_name(table),
        };

        let mut sql = format!("SELECT primary_key, body FROM {sql_table}");
        if exclusive_start_key.is_some() {
            sql.push_str(" WHERE primary_key > ?");
        }
        sql.push_str(" ORDER BY primary_key ASC");
        let fetch_limit = limit.map(|l| l * 3);
        if let Some(n) = fetch_limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        let mut q = sqlx::query(&sql);
        if let Some(start) = &exclusive_start_key {
            q = q.bind(start);
        }
        let rows = q.fetch_all(&mut *txn.sql()).await?;

        let mut results = Vec::new();
        let mut scanned = 0usize;
        for row in rows {
            let primary_key: Vec<u8> = row.get("primary_key");
            if let Some((seg, total)) = segment {
                if total > 0 && fnv1a(&primary_key) % total != seg {
                    continue;
                }
            }
            scanned += 1;
            let body: Vec<u8> = row.get("body");
            let tuple: Tuple = serde_json::from_slice(&body)?;
            let Some(entry) = tuple.read(consistent) else { continue };
            if let Some(f) = filter {
                if !f.evaluate(entry)? {
                    continue;
                }
            }
            results.push(entry.clone());
            if let Some(n) = limit {
                if results.len() >= n {
                    break;
                }
            }
        }
        Ok((results, scanned))
    }
}

/// Base-table key attribute names plus the GSI's own key attribute names,
/// deduplicated, per §4.5.5's "base-table key attributes plus the GSI key
/// attributes" KEYS_ONLY/INCLUDE projection rule.
fn projected_key_names<'a>(base: &'a ddb_expr::KeySchema, gsi: &'a ddb_expr::KeySchema) -> Vec<&'a str> {
    let mut names = vec![base.partition_key.as_str()];
    if let Some(sort) = &base.sort_key {
        names.push(sort.as_str());
    }
    for name in std::iter::once(gsi.partition_key.as_str()).chain(gsi.sort_key.as_deref()) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Builds the projected GSI body per §4.5.5.
fn project(key_names: &[&str], projection: &ProjectionType, source: &Entry) -> Entry {
    match projection {
        ProjectionType::All => source.clone(),
        ProjectionType::KeysOnly => keys_only(key_names, source),
        ProjectionType::Include(names) => {
            let mut projected = keys_only(key_names, source);
            for name in names {
                if let Some(v) = source.get(name) {
                    projected.insert(name.clone(), v.clone());
                }
            }
            projected
        }
    }
}

fn keys_only(key_names: &[&str], source: &Entry) -> Entry {
    let mut projected = Entry::new();
    for name in key_names {
        if let Some(v) = source.get(*name) {
            projected.insert((*name).to_string(), v.clone());
        }
    }
    projected
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in bytes {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

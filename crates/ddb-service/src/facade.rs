//! The service facade (F): validates request shape, compiles expressions,
//! and dispatches to the storage engine. Table-catalog reads take a shared
//! facade-level lock; mutations take an exclusive one, acquired before the
//! storage engine's own lock, per §5's fixed lock ordering.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use ddb_expr::{compile_condition, compile_key_condition, compile_update, Entry, KeySchema, Parser};
use ddb_storage::{
    BillingMode, GlobalSecondaryIndexSetting, PrimaryKey, ProjectionType, StorageEngine, TableMetaData,
};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::error::{CancellationReason, Result, ServiceError};
use crate::types::{
    self, BatchGetItemRequest, BatchGetItemResponse, BatchWriteItemRequest, BatchWriteItemResponse,
    CreateTableRequest, DeleteItemRequest, DeleteItemResponse, GetItemRequest, GetItemResponse,
    GsiDescription, KeySchemaElementResponse, ListTablesResponse, PutItemRequest, PutItemResponse, QueryLikeResponse,
    QueryRequest, ScanRequest, TableDescription, TableDescriptionResponse, TableNameRequest,
    TransactWriteItemsRequest, TransactWriteItemsResponse, UpdateItemRequest, UpdateItemResponse, UpdateTableRequest,
};

const MAX_TRANSACT_ITEMS: usize = 100;
const MAX_BATCH_GET_KEYS: usize = 100;
const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// The request-facing facade over a `StorageEngine`.
pub struct Service {
    engine: StorageEngine,
    tables: Arc<RwLock<HashSet<String>>>,
}

impl Service {
    #[must_use]
    pub fn new(engine: StorageEngine) -> Self {
        Self {
            engine,
            tables: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    async fn require_known(&self, table: &str) -> Result<()> {
        if self.tables.read().await.contains(table) {
            Ok(())
        } else {
            Err(ServiceError::Storage(ddb_storage::StorageError::TableNotFound(table.to_string())))
        }
    }

    #[instrument(skip(self, req))]
    pub async fn create_table(&self, req: CreateTableRequest) -> Result<TableDescriptionResponse> {
        let mut guard = self.tables.write().await;
        if guard.contains(&req.table_name) {
            return Err(ServiceError::Storage(ddb_storage::StorageError::TableAlreadyExists(req.table_name)));
        }

        let mut partition_key = None;
        let mut sort_key = None;
        for elem in &req.key_schema {
            match elem.key_type.as_str() {
                "HASH" => partition_key = Some(elem.attribute_name.clone()),
                "RANGE" => sort_key = Some(elem.attribute_name.clone()),
                other => return Err(ServiceError::Validation(format!("unknown KeyType '{other}'"))),
            }
        }
        let partition_key = partition_key.ok_or_else(|| ServiceError::Validation("missing HASH key".to_string()))?;

        let mut attribute_types = std::collections::BTreeMap::new();
        for def in &req.attribute_definitions {
            attribute_types.insert(def.attribute_name.clone(), types::parse_scalar_type(&def.attribute_type)?);
        }

        let mut gsis = Vec::new();
        for gsi in &req.global_secondary_indexes {
            let mut gsi_partition = None;
            let mut gsi_sort = None;
            for elem in &gsi.key_schema {
                match elem.key_type.as_str() {
                    "HASH" => gsi_partition = Some(elem.attribute_name.clone()),
                    "RANGE" => gsi_sort = Some(elem.attribute_name.clone()),
                    other => return Err(ServiceError::Validation(format!("unknown KeyType '{other}'"))),
                }
            }
            let gsi_partition =
                gsi_partition.ok_or_else(|| ServiceError::Validation(format!("GSI '{}' missing HASH key", gsi.index_name)))?;
            let projection = match gsi.projection.projection_type.as_str() {
                "KEYS_ONLY" => ProjectionType::KeysOnly,
                "ALL" => ProjectionType::All,
                "INCLUDE" => ProjectionType::Include(gsi.projection.non_key_attributes.clone().unwrap_or_default()),
                other => return Err(ServiceError::Validation(format!("unknown ProjectionType '{other}'"))),
            };
            gsis.push(GlobalSecondaryIndexSetting {
                index_name: gsi.index_name.clone(),
                partition_key: gsi_partition,
                sort_key: gsi_sort,
                projection,
            });
        }

        let (billing_mode, rcu, wcu) = match req.billing_mode.as_deref() {
            Some("PAY_PER_REQUEST") | None if req.provisioned_throughput.is_none() => {
                (BillingMode::PayPerRequest, None, None)
            }
            _ => {
                let throughput = req
                    .provisioned_throughput
                    .ok_or_else(|| ServiceError::Validation("PROVISIONED billing mode requires ProvisionedThroughput".to_string()))?;
                (BillingMode::Provisioned, Some(throughput.read_capacity_units), Some(throughput.write_capacity_units))
            }
        };

        let meta = TableMetaData {
            name: req.table_name.clone(),
            partition_key,
            sort_key,
            attribute_types,
            gsis,
            billing_mode,
            read_capacity_units: rcu,
            write_capacity_units: wcu,
            created_at: Utc::now(),
        };
        self.engine.create_table(meta.clone()).await?;
        guard.insert(req.table_name);
        Ok(TableDescriptionResponse {
            table_description: describe(&meta),
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_table(&self, req: TableNameRequest) -> Result<TableDescriptionResponse> {
        let mut guard = self.tables.write().await;
        self.check_known(&guard, &req.table_name)?;
        let meta = self.engine.delete_table(&req.table_name).await?;
        guard.remove(&req.table_name);
        Ok(TableDescriptionResponse {
            table_description: describe(&meta),
        })
    }

    #[instrument(skip(self))]
    pub async fn describe_table(&self, req: TableNameRequest) -> Result<TableDescriptionResponse> {
        self.require_known(&req.table_name).await?;
        let meta = self.engine.describe_table(&req.table_name).await?;
        Ok(TableDescriptionResponse {
            table_description: describe(&meta),
        })
    }

    #[instrument(skip(self))]
    pub async fn list_tables(&self) -> Result<ListTablesResponse> {
        let names = self.engine.list_tables().await?;
        Ok(ListTablesResponse { table_names: names })
    }

    #[instrument(skip(self, req))]
    pub async fn update_table(&self, req: UpdateTableRequest) -> Result<TableDescriptionResponse> {
        self.require_known(&req.table_name).await?;
        let throughput = req.provisioned_throughput;
        let meta = self
            .engine
            .update_table_throughput(
                &req.table_name,
                throughput.as_ref().map(|t| t.read_capacity_units),
                throughput.as_ref().map(|t| t.write_capacity_units),
            )
            .await?;
        Ok(TableDescriptionResponse {
            table_description: describe(&meta),
        })
    }

    fn check_known(&self, guard: &HashSet<String>, table: &str) -> Result<()> {
        if guard.contains(table) {
            Ok(())
        } else {
            Err(ServiceError::Storage(ddb_storage::StorageError::TableNotFound(table.to_string())))
        }
    }

    #[instrument(skip(self, req))]
    pub async fn put_item(&self, req: PutItemRequest) -> Result<PutItemResponse> {
        self.require_known(&req.table_name).await?;
        let env = Arc::new(req.substitutions.into_env());
        let condition = req
            .condition_expression
            .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(&expr)?, env.clone())))
            .transpose()?;
        self.engine.put(&req.table_name, req.item, condition.as_ref()).await?;
        Ok(PutItemResponse {})
    }

    #[instrument(skip(self, req))]
    pub async fn get_item(&self, req: GetItemRequest) -> Result<GetItemResponse> {
        self.require_known(&req.table_name).await?;
        let item = self.engine.get(&req.table_name, &req.key, req.consistent_read).await?;
        Ok(GetItemResponse { item })
    }

    #[instrument(skip(self, req))]
    pub async fn update_item(&self, req: UpdateItemRequest) -> Result<UpdateItemResponse> {
        self.require_known(&req.table_name).await?;
        let env = Arc::new(req.substitutions.into_env());
        let update = compile_update(Parser::parse_update(&req.update_expression)?, env.clone());
        let condition = req
            .condition_expression
            .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(&expr)?, env)))
            .transpose()?;
        let attributes = self
            .engine
            .update(&req.table_name, req.key, &update, condition.as_ref())
            .await?;
        Ok(UpdateItemResponse { attributes })
    }

    #[instrument(skip(self, req))]
    pub async fn delete_item(&self, req: DeleteItemRequest) -> Result<DeleteItemResponse> {
        self.require_known(&req.table_name).await?;
        let env = Arc::new(req.substitutions.into_env());
        let condition = req
            .condition_expression
            .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(&expr)?, env)))
            .transpose()?;
        self.engine.delete(&req.table_name, req.key, condition.as_ref()).await?;
        Ok(DeleteItemResponse {})
    }

    #[instrument(skip(self, req))]
    pub async fn query(&self, req: QueryRequest) -> Result<QueryLikeResponse> {
        self.require_known(&req.table_name).await?;
        let meta = self.engine.describe_table(&req.table_name).await?;
        let schema = match &req.index_name {
            Some(name) => meta
                .gsi(name)
                .map(GlobalSecondaryIndexSetting::key_schema)
                .ok_or_else(|| ServiceError::Storage(ddb_storage::StorageError::IndexNotFound(name.clone(), req.table_name.clone())))?,
            None => meta.key_schema(),
        };
        let env = Arc::new(req.substitutions.into_env());
        let key_condition_ast = Parser::parse_key_condition(&req.key_condition_expression)?;
        let query = compile_key_condition(&key_condition_ast, &env, &schema)?;
        let filter = req
            .filter_expression
            .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(&expr)?, env)))
            .transpose()?;
        let exclusive_start = req.exclusive_start_key.as_ref().map(|key| key_bytes(key, &schema));

        let mut txn = self.engine.begin(false).await?;
        let (items, scanned_count) = self
            .engine
            .query_with_txn(
                &mut txn,
                &req.table_name,
                req.index_name.as_deref(),
                &query,
                req.consistent_read,
                req.scan_index_forward,
                req.limit,
                exclusive_start,
                filter.as_ref(),
            )
            .await?;
        txn.commit().await?;

        let last_evaluated_key = last_key(&items, req.limit, &schema);
        Ok(QueryLikeResponse {
            count: items.len(),
            scanned_count,
            items,
            last_evaluated_key,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn scan(&self, req: ScanRequest) -> Result<QueryLikeResponse> {
        self.require_known(&req.table_name).await?;
        let meta = self.engine.describe_table(&req.table_name).await?;
        let schema = match &req.index_name {
            Some(name) => meta
                .gsi(name)
                .map(GlobalSecondaryIndexSetting::key_schema)
                .ok_or_else(|| ServiceError::Storage(ddb_storage::StorageError::IndexNotFound(name.clone(), req.table_name.clone())))?,
            None => meta.key_schema(),
        };
        let env = Arc::new(req.substitutions.into_env());
        let filter = req
            .filter_expression
            .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(&expr)?, env)))
            .transpose()?;
        let segment = match (req.segment, req.total_segments) {
            (Some(s), Some(t)) => Some((s, t)),
            _ => None,
        };
        let exclusive_start = req.exclusive_start_key.as_ref().map(|key| key_bytes(key, &schema));

        let mut txn = self.engine.begin(false).await?;
        let (items, scanned_count) = self
            .engine
            .scan_with_txn(
                &mut txn,
                &req.table_name,
                req.index_name.as_deref(),
                req.consistent_read,
                segment,
                req.limit,
                exclusive_start,
                filter.as_ref(),
            )
            .await?;
        txn.commit().await?;

        let last_evaluated_key = last_key(&items, req.limit, &schema);
        Ok(QueryLikeResponse {
            count: items.len(),
            scanned_count,
            items,
            last_evaluated_key,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn batch_get_item(&self, req: BatchGetItemRequest) -> Result<BatchGetItemResponse> {
        let total_keys: usize = req.request_items.values().map(|k| k.keys.len()).sum();
        if total_keys > MAX_BATCH_GET_KEYS {
            return Err(ServiceError::Validation(
                "Too many items requested for the BatchGetItem call".to_string(),
            ));
        }

        let mut responses = std::collections::BTreeMap::new();
        let mut all_keys: Vec<(String, Entry, bool)> = Vec::new();
        for (table, keys_and_attrs) in &req.request_items {
            self.require_known(table).await?;
            for key in &keys_and_attrs.keys {
                all_keys.push((table.clone(), key.clone(), keys_and_attrs.consistent_read));
            }
        }

        // Deterministic partial failure: once a call is large enough, defer
        // the last two requested keys to unprocessed, per §4.6.
        let defer_count = if all_keys.len() > MAX_BATCH_GET_KEYS / 2 { 2.min(all_keys.len()) } else { 0 };
        let split = all_keys.len() - defer_count;
        let (to_serve, to_defer) = all_keys.split_at(split);

        for (table, key, consistent) in to_serve {
            if let Some(item) = self.engine.get(table, key, *consistent).await? {
                responses.entry(table.clone()).or_insert_with(Vec::new).push(item);
            }
        }

        let mut unprocessed_keys: std::collections::BTreeMap<String, Vec<Entry>> = std::collections::BTreeMap::new();
        for (table, key, _) in to_defer {
            unprocessed_keys.entry(table.clone()).or_insert_with(Vec::new).push(key.clone());
        }

        Ok(BatchGetItemResponse {
            responses,
            unprocessed_keys,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn batch_write_item(&self, req: BatchWriteItemRequest) -> Result<BatchWriteItemResponse> {
        let total_writes: usize = req.request_items.values().map(Vec::len).sum();
        if total_writes > MAX_BATCH_WRITE_ITEMS {
            return Err(ServiceError::Validation(
                "Too many items requested for the BatchWriteItem call".to_string(),
            ));
        }

        let mut flattened: Vec<(String, types::WriteRequest)> = Vec::new();
        for (table, writes) in &req.request_items {
            self.require_known(table).await?;
            for write in writes {
                flattened.push((table.clone(), write.clone()));
            }
        }

        let defer_count = if flattened.len() > MAX_BATCH_WRITE_ITEMS / 2 { 2.min(flattened.len()) } else { 0 };
        let split = flattened.len() - defer_count;
        let (to_apply, to_defer) = flattened.split_at(split);

        for (table, write) in to_apply {
            if let Some(put) = &write.put_request {
                self.engine.put(table, put.item.clone(), None).await?;
            } else if let Some(delete) = &write.delete_request {
                self.engine.delete(table, delete.key.clone(), None).await?;
            }
        }

        let mut unprocessed_items: std::collections::BTreeMap<String, Vec<types::WriteRequest>> =
            std::collections::BTreeMap::new();
        for (table, write) in to_defer {
            unprocessed_items.entry(table.clone()).or_insert_with(Vec::new).push(write.clone());
        }

        Ok(BatchWriteItemResponse { unprocessed_items })
    }

    #[instrument(skip(self, req))]
    pub async fn transact_write_items(&self, req: TransactWriteItemsRequest) -> Result<TransactWriteItemsResponse> {
        if req.transact_items.len() > MAX_TRANSACT_ITEMS {
            return Err(ServiceError::Validation(
                "Member must have length less than or equal to 100".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for item in &req.transact_items {
            let (table, key) = transact_item_target(item)?;
            self.require_known(table).await?;
            let meta = self.engine.describe_table(table).await?;
            let schema = meta.key_schema();
            let pk = PrimaryKey::from_entry(key, &schema)?;
            let marker = (table.clone(), pk.composite());
            if !seen.insert(marker) {
                return Err(ServiceError::Validation(
                    "Transaction request cannot include multiple operations on one item".to_string(),
                ));
            }
        }

        let mut txn = self.engine.begin(true).await?;
        let mut reasons = vec![CancellationReason::None; req.transact_items.len()];
        let mut failed = false;

        for (idx, item) in req.transact_items.iter().enumerate() {
            let outcome = self.apply_transact_item(&mut txn, item).await;
            match outcome {
                Ok(()) => {}
                Err(ServiceError::Storage(ddb_storage::StorageError::ConditionalCheckFailed)) => {
                    reasons[idx] = CancellationReason::ConditionalCheckFailed;
                    failed = true;
                    break;
                }
                Err(_) => {
                    reasons[idx] = CancellationReason::ValidationError;
                    failed = true;
                    break;
                }
            }
        }

        if failed {
            txn.rollback().await?;
            return Err(ServiceError::TransactionCanceled(reasons));
        }

        txn.commit().await?;
        Ok(TransactWriteItemsResponse {})
    }

    async fn apply_transact_item(&self, txn: &mut ddb_storage::Txn, item: &types::TransactWriteItem) -> Result<()> {
        if let Some(check) = &item.condition_check {
            let env = Arc::new(check.substitutions.clone().into_env());
            let compiled = compile_condition(Parser::parse_condition(&check.condition_expression)?, env);
            let current = self
                .engine
                .get(&check.table_name, &check.key, true)
                .await?
                .unwrap_or_default();
            if !compiled.evaluate(&current)? {
                return Err(ServiceError::Storage(ddb_storage::StorageError::ConditionalCheckFailed));
            }
            return Ok(());
        }
        if let Some(put) = &item.put {
            let env = Arc::new(put.substitutions.clone().into_env());
            let condition = put
                .condition_expression
                .as_ref()
                .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(expr)?, env)))
                .transpose()?;
            self.engine
                .put_with_txn(txn, &put.table_name, put.item.clone(), condition.as_ref())
                .await?;
            return Ok(());
        }
        if let Some(update) = &item.update {
            let env = Arc::new(update.substitutions.clone().into_env());
            let compiled_update = compile_update(Parser::parse_update(&update.update_expression)?, env.clone());
            let condition = update
                .condition_expression
                .as_ref()
                .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(expr)?, env)))
                .transpose()?;
            self.engine
                .update_with_txn(txn, &update.table_name, update.key.clone(), &compiled_update, condition.as_ref())
                .await?;
            return Ok(());
        }
        if let Some(delete) = &item.delete {
            let env = Arc::new(delete.substitutions.clone().into_env());
            let condition = delete
                .condition_expression
                .as_ref()
                .map(|expr| Ok::<_, ServiceError>(compile_condition(Parser::parse_condition(expr)?, env)))
                .transpose()?;
            self.engine
                .delete_with_txn(txn, &delete.table_name, delete.key.clone(), condition.as_ref())
                .await?;
            return Ok(());
        }
        Err(ServiceError::Validation("TransactWriteItem must name exactly one action".to_string()))
    }
}

fn transact_item_target(item: &types::TransactWriteItem) -> Result<(&str, &Entry)> {
    if let Some(c) = &item.condition_check {
        return Ok((&c.table_name, &c.key));
    }
    if let Some(p) = &item.put {
        return Ok((&p.table_name, &p.item));
    }
    if let Some(u) = &item.update {
        return Ok((&u.table_name, &u.key));
    }
    if let Some(d) = &item.delete {
        return Ok((&d.table_name, &d.key));
    }
    Err(ServiceError::Validation("TransactWriteItem must name exactly one action".to_string()))
}

fn key_bytes(entry: &Entry, schema: &KeySchema) -> Vec<u8> {
    PrimaryKey::from_entry(entry, schema).map(|pk| pk.composite()).unwrap_or_default()
}

fn last_key(items: &[Entry], limit: Option<usize>, schema: &KeySchema) -> Option<Entry> {
    let Some(limit) = limit else { return None };
    if items.len() < limit {
        return None;
    }
    items.last().map(|item| {
        let mut key = Entry::new();
        if let Some(v) = item.get(&schema.partition_key) {
            key.insert(schema.partition_key.clone(), v.clone());
        }
        if let Some(sort) = &schema.sort_key {
            if let Some(v) = item.get(sort) {
                key.insert(sort.clone(), v.clone());
            }
        }
        key
    })
}

fn describe(meta: &TableMetaData) -> TableDescription {
    let mut key_schema = vec![KeySchemaElementResponse {
        attribute_name: meta.partition_key.clone(),
        key_type: "HASH".to_string(),
    }];
    if let Some(sort) = &meta.sort_key {
        key_schema.push(KeySchemaElementResponse {
            attribute_name: sort.clone(),
            key_type: "RANGE".to_string(),
        });
    }
    let global_secondary_indexes = meta
        .gsis
        .iter()
        .map(|gsi| {
            let mut gsi_schema = vec![KeySchemaElementResponse {
                attribute_name: gsi.partition_key.clone(),
                key_type: "HASH".to_string(),
            }];
            if let Some(sort) = &gsi.sort_key {
                gsi_schema.push(KeySchemaElementResponse {
                    attribute_name: sort.clone(),
                    key_type: "RANGE".to_string(),
                });
            }
            GsiDescription {
                index_name: gsi.index_name.clone(),
                key_schema: gsi_schema,
            }
        })
        .collect();
    TableDescription {
        table_name: meta.name.clone(),
        table_status: "ACTIVE".to_string(),
        key_schema,
        global_secondary_indexes,
        billing_mode: match meta.billing_mode {
            BillingMode::Provisioned => "PROVISIONED".to_string(),
            BillingMode::PayPerRequest => "PAY_PER_REQUEST".to_string(),
        },
        creation_date_time: meta.created_at.to_rfc3339(),
    }
}

//! Request/response wire shapes for the fourteen operations (§6), decoded
//! and encoded via `serde`/`serde_json` in the DynamoDB JSON convention.

use std::collections::BTreeMap;

use ddb_expr::{AttributeValue, Entry, Env, TypeTag};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Substitutions {
    #[serde(default)]
    pub expression_attribute_names: BTreeMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: BTreeMap<String, AttributeValue>,
}

impl Substitutions {
    pub fn into_env(self) -> Env {
        Env::new(self.expression_attribute_names, self.expression_attribute_values)
    }
}

pub fn parse_scalar_type(s: &str) -> Result<TypeTag> {
    match s {
        "S" => Ok(TypeTag::S),
        "N" => Ok(TypeTag::N),
        "B" => Ok(TypeTag::B),
        other => Err(ServiceError::Validation(format!("unsupported key attribute type '{other}'"))),
    }
}

// ---- table management ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectionRequest {
    pub projection_type: String,
    #[serde(default)]
    pub non_key_attributes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GsiRequest {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub projection: ProjectionRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughputRequest {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableRequest {
    pub table_name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub global_secondary_indexes: Vec<GsiRequest>,
    #[serde(default)]
    pub billing_mode: Option<String>,
    #[serde(default)]
    pub provisioned_throughput: Option<ProvisionedThroughputRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableNameRequest {
    pub table_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateTableRequest {
    pub table_name: String,
    #[serde(default)]
    pub provisioned_throughput: Option<ProvisionedThroughputRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElementResponse {
    pub attribute_name: String,
    pub key_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GsiDescription {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElementResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    pub table_name: String,
    pub table_status: String,
    pub key_schema: Vec<KeySchemaElementResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GsiDescription>,
    pub billing_mode: String,
    pub creation_date_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescriptionResponse {
    pub table_description: TableDescription,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTablesResponse {
    pub table_names: Vec<String>,
}

// ---- item operations ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Entry,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemResponse {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: Entry,
    #[serde(default)]
    pub consistent_read: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Entry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: Entry,
    pub update_expression: String,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemResponse {
    pub attributes: Entry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: Entry,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemResponse {}

// ---- range reads ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRequest {
    pub table_name: String,
    #[serde(default)]
    pub index_name: Option<String>,
    pub key_condition_expression: String,
    #[serde(default)]
    pub filter_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
    #[serde(default)]
    pub consistent_read: bool,
    #[serde(default = "default_true")]
    pub scan_index_forward: bool,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub exclusive_start_key: Option<Entry>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanRequest {
    pub table_name: String,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub filter_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
    #[serde(default)]
    pub consistent_read: bool,
    #[serde(default)]
    pub segment: Option<u32>,
    #[serde(default)]
    pub total_segments: Option<u32>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub exclusive_start_key: Option<Entry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryLikeResponse {
    pub items: Vec<Entry>,
    pub count: usize,
    pub scanned_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Entry>,
}

// ---- batch operations ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    pub keys: Vec<Entry>,
    #[serde(default)]
    pub consistent_read: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemRequest {
    pub request_items: BTreeMap<String, KeysAndAttributes>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemResponse {
    pub responses: BTreeMap<String, Vec<Entry>>,
    pub unprocessed_keys: BTreeMap<String, Vec<Entry>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    pub item: Entry,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    pub key: Entry,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put_request: Option<PutRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_request: Option<DeleteRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemRequest {
    pub request_items: BTreeMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemResponse {
    pub unprocessed_items: BTreeMap<String, Vec<WriteRequest>>,
}

// ---- transactions ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionCheck {
    pub table_name: String,
    pub key: Entry,
    pub condition_expression: String,
    #[serde(flatten)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactPut {
    pub table_name: String,
    pub item: Entry,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactUpdate {
    pub table_name: String,
    pub key: Entry,
    pub update_expression: String,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactDelete {
    pub table_name: String,
    pub key: Entry,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(flatten)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItem {
    #[serde(default)]
    pub condition_check: Option<ConditionCheck>,
    #[serde(default)]
    pub put: Option<TransactPut>,
    #[serde(default)]
    pub update: Option<TransactUpdate>,
    #[serde(default)]
    pub delete: Option<TransactDelete>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItemsRequest {
    pub transact_items: Vec<TransactWriteItem>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItemsResponse {}

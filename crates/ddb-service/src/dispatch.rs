//! Single-endpoint dispatch: resolves the operation named by the
//! `X-Amz-Target` header (`DynamoDB_YYYYMMDD.Operation`) and decodes/encodes
//! the DynamoDB JSON wire format around the matching facade call.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, ServiceError};
use crate::facade::Service;
use crate::types::{
    BatchGetItemRequest, BatchWriteItemRequest, CreateTableRequest, DeleteItemRequest, GetItemRequest,
    PutItemRequest, QueryRequest, ScanRequest, TableNameRequest, TransactWriteItemsRequest, UpdateItemRequest,
    UpdateTableRequest,
};
use crate::wire::classify;

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ServiceError::Validation(format!("malformed request body: {e}")))
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec())
}

fn operation_name(target: &str) -> &str {
    target.rsplit('.').next().unwrap_or(target)
}

/// Runs one request body against the operation named by `target`, returning
/// the HTTP status and the JSON response body to send back.
pub async fn dispatch(service: &Service, target: &str, body: &[u8]) -> (u16, Vec<u8>) {
    match run(service, operation_name(target), body).await {
        Ok(bytes) => (200, bytes),
        Err(err) => {
            let (name, body) = classify(&err);
            (name.http_status(), body)
        }
    }
}

async fn run(service: &Service, operation: &str, body: &[u8]) -> Result<Vec<u8>> {
    match operation {
        "CreateTable" => Ok(encode(&service.create_table(decode::<CreateTableRequest>(body)?).await?)),
        "DeleteTable" => Ok(encode(&service.delete_table(decode::<TableNameRequest>(body)?).await?)),
        "DescribeTable" => Ok(encode(&service.describe_table(decode::<TableNameRequest>(body)?).await?)),
        "ListTables" => Ok(encode(&service.list_tables().await?)),
        "UpdateTable" => Ok(encode(&service.update_table(decode::<UpdateTableRequest>(body)?).await?)),
        "PutItem" => Ok(encode(&service.put_item(decode::<PutItemRequest>(body)?).await?)),
        "GetItem" => Ok(encode(&service.get_item(decode::<GetItemRequest>(body)?).await?)),
        "UpdateItem" => Ok(encode(&service.update_item(decode::<UpdateItemRequest>(body)?).await?)),
        "DeleteItem" => Ok(encode(&service.delete_item(decode::<DeleteItemRequest>(body)?).await?)),
        "Query" => Ok(encode(&service.query(decode::<QueryRequest>(body)?).await?)),
        "Scan" => Ok(encode(&service.scan(decode::<ScanRequest>(body)?).await?)),
        "BatchGetItem" => Ok(encode(&service.batch_get_item(decode::<BatchGetItemRequest>(body)?).await?)),
        "BatchWriteItem" => Ok(encode(&service.batch_write_item(decode::<BatchWriteItemRequest>(body)?).await?)),
        "TransactWriteItems" => Ok(encode(
            &service.transact_write_items(decode::<TransactWriteItemsRequest>(body)?).await?,
        )),
        other => Err(ServiceError::Validation(format!("unknown operation '{other}'"))),
    }
}

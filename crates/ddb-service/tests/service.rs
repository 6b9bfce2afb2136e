use ddb_service::{dispatch, Service};
use ddb_storage::StorageEngine;
use serde_json::{json, Value};

async fn new_service() -> Service {
    Service::new(StorageEngine::new().await.unwrap())
}

async fn call(service: &Service, operation: &str, body: Value) -> (u16, Value) {
    let target = format!("DynamoDB_20120810.{operation}");
    let bytes = serde_json::to_vec(&body).unwrap();
    let (status, response) = dispatch(service, &target, &bytes).await;
    let parsed: Value = serde_json::from_slice(&response).unwrap();
    (status, parsed)
}

fn create_movie_table() -> Value {
    json!({
        "TableName": "movie",
        "AttributeDefinitions": [
            {"AttributeName": "year", "AttributeType": "N"},
            {"AttributeName": "title", "AttributeType": "S"},
        ],
        "KeySchema": [
            {"AttributeName": "year", "KeyType": "HASH"},
            {"AttributeName": "title", "KeyType": "RANGE"},
        ],
        "BillingMode": "PAY_PER_REQUEST",
    })
}

#[tokio::test]
async fn basic_crud_scenario() {
    let service = new_service().await;
    let (status, _) = call(&service, "CreateTable", create_movie_table()).await;
    assert_eq!(status, 200);

    let (status, _) = call(
        &service,
        "PutItem",
        json!({
            "TableName": "movie",
            "Item": {
                "year": {"N": "2024"},
                "title": {"S": "A"},
                "info": {"M": {"rating": {"N": "9.3"}}},
                "language": {"S": "English"},
            },
        }),
    )
    .await;
    assert_eq!(status, 200);

    let key = json!({"year": {"N": "2024"}, "title": {"S": "A"}});

    let (status, consistent) = call(
        &service,
        "GetItem",
        json!({"TableName": "movie", "Key": key, "ConsistentRead": true}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(consistent["Item"]["language"], json!({"S": "English"}));

    let (status, eventual) = call(
        &service,
        "GetItem",
        json!({"TableName": "movie", "Key": key, "ConsistentRead": false}),
    )
    .await;
    assert_eq!(status, 200);
    assert!(eventual.get("Item").is_none());
}

#[tokio::test]
async fn conditional_put_fails_scenario() {
    let service = new_service().await;
    call(&service, "CreateTable", create_movie_table()).await;
    call(
        &service,
        "PutItem",
        json!({
            "TableName": "movie",
            "Item": {"year": {"N": "2024"}, "title": {"S": "A"}},
        }),
    )
    .await;

    let (status, body) = call(
        &service,
        "PutItem",
        json!({
            "TableName": "movie",
            "Item": {"year": {"N": "2024"}, "title": {"S": "A"}},
            "ConditionExpression": "attribute_not_exists(title)",
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["__type"], json!("com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException"));
}

#[tokio::test]
async fn update_with_infix_scenario() {
    let service = new_service().await;
    call(&service, "CreateTable", create_movie_table()).await;
    call(
        &service,
        "PutItem",
        json!({
            "TableName": "movie",
            "Item": {"year": {"N": "2024"}, "title": {"S": "A"}, "price": {"S": "100"}},
        }),
    )
    .await;

    let key = json!({"year": {"N": "2024"}, "title": {"S": "A"}});
    let (status, body) = call(
        &service,
        "UpdateItem",
        json!({
            "TableName": "movie",
            "Key": key,
            "UpdateExpression": "SET price = price - :d",
            "ExpressionAttributeValues": {":d": {"N": "10"}},
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["Attributes"]["price"], json!({"S": "90"}));
}

#[tokio::test]
async fn transact_write_items_partial_failure_scenario() {
    let service = new_service().await;
    call(&service, "CreateTable", create_movie_table()).await;
    call(
        &service,
        "PutItem",
        json!({
            "TableName": "movie",
            "Item": {"year": {"N": "2024"}, "title": {"S": "A"}},
        }),
    )
    .await;

    let (status, body) = call(
        &service,
        "TransactWriteItems",
        json!({
            "TransactItems": [
                {
                    "ConditionCheck": {
                        "TableName": "movie",
                        "Key": {"year": {"N": "2024"}, "title": {"S": "A"}},
                        "ConditionExpression": "attribute_not_exists(title)",
                    },
                },
                {
                    "Put": {
                        "TableName": "movie",
                        "Item": {"year": {"N": "2025"}, "title": {"S": "B"}},
                    },
                },
            ],
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["__type"], json!("com.amazonaws.dynamodb.v20120810#TransactionCanceledException"));

    let (_, get_body) = call(
        &service,
        "GetItem",
        json!({"TableName": "movie", "Key": {"year": {"N": "2025"}, "title": {"S": "B"}}, "ConsistentRead": true}),
    )
    .await;
    assert!(get_body.get("Item").is_none());
}

#[tokio::test]
async fn query_on_gsi_scenario() {
    let service = new_service().await;
    let mut table = create_movie_table();
    table["AttributeDefinitions"]
        .as_array_mut()
        .unwrap()
        .push(json!({"AttributeName": "language", "AttributeType": "S"}));
    table["GlobalSecondaryIndexes"] = json!([{
        "IndexName": "gsi_language",
        "KeySchema": [
            {"AttributeName": "language", "KeyType": "HASH"},
            {"AttributeName": "title", "KeyType": "RANGE"},
        ],
        "Projection": {"ProjectionType": "ALL"},
    }]);
    call(&service, "CreateTable", table).await;

    for (year, title) in [(2021, "D"), (2022, "B"), (2023, "C"), (2024, "A")] {
        call(
            &service,
            "PutItem",
            json!({
                "TableName": "movie",
                "Item": {
                    "year": {"N": year.to_string()},
                    "title": {"S": title},
                    "language": {"S": "English"},
                },
            }),
        )
        .await;
    }

    let (status, body) = call(
        &service,
        "Query",
        json!({
            "TableName": "movie",
            "IndexName": "gsi_language",
            "KeyConditionExpression": "language = :lang",
            "ExpressionAttributeValues": {":lang": {"S": "English"}},
            "Limit": 2,
            "ScanIndexForward": true,
        }),
    )
    .await;
    assert_eq!(status, 200);
    let items = body["Items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], json!({"S": "A"}));
    assert_eq!(items[1]["title"], json!({"S": "B"}));
}

#[tokio::test]
async fn transact_write_items_too_many_scenario() {
    let service = new_service().await;
    call(&service, "CreateTable", create_movie_table()).await;

    let items: Vec<Value> = (0..120)
        .map(|i| {
            json!({
                "Put": {
                    "TableName": "movie",
                    "Item": {"year": {"N": "2024"}, "title": {"S": format!("item-{i}")}},
                },
            })
        })
        .collect();

    let (status, body) = call(&service, "TransactWriteItems", json!({"TransactItems": items})).await;
    assert_eq!(status, 400);
    assert_eq!(body["__type"], json!("com.amazonaws.dynamodb.v20120810#ValidationException"));
    assert!(body["message"].as_str().unwrap().contains("less than or equal to 100"));

    let (_, list) = call(&service, "ListTables", json!({})).await;
    let _ = list;
}

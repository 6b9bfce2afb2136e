use std::collections::BTreeMap;

use chrono::Utc;
use ddb_expr::{AttributeValue, Entry};
use ddb_storage::{BillingMode, GlobalSecondaryIndexSetting, ProjectionType, StorageEngine, TableMetaData};

fn movie_table(gsis: Vec<GlobalSecondaryIndexSetting>) -> TableMetaData {
    TableMetaData {
        name: "movie".to_string(),
        partition_key: "year".to_string(),
        sort_key: Some("title".to_string()),
        attribute_types: BTreeMap::new(),
        gsis,
        billing_mode: BillingMode::PayPerRequest,
        read_capacity_units: None,
        write_capacity_units: None,
        created_at: Utc::now(),
    }
}

fn entry(fields: &[(&str, AttributeValue)]) -> Entry {
    fields.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
}

#[tokio::test]
async fn basic_crud_round_trip() {
    let engine = StorageEngine::new().await.unwrap();
    engine.create_table(movie_table(vec![])).await.unwrap();

    let item = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
        ("language", AttributeValue::S("English".into())),
    ]);
    engine.put("movie", item.clone(), None).await.unwrap();

    let key = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
    ]);
    let consistent = engine.get("movie", &key, true).await.unwrap();
    assert_eq!(consistent, Some(item));

    let eventual = engine.get("movie", &key, false).await.unwrap();
    assert_eq!(eventual, None);
}

#[tokio::test]
async fn conditional_put_fails_on_existing_item() {
    let engine = StorageEngine::new().await.unwrap();
    engine.create_table(movie_table(vec![])).await.unwrap();

    let item = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
    ]);
    engine.put("movie", item.clone(), None).await.unwrap();

    let condition_ast = ddb_expr::Parser::parse_condition("attribute_not_exists(title)").unwrap();
    let env = std::sync::Arc::new(ddb_expr::Env::default());
    let compiled = ddb_expr::compile_condition(condition_ast, env);

    let err = engine.put("movie", item, Some(&compiled)).await.unwrap_err();
    assert!(matches!(err, ddb_storage::StorageError::ConditionalCheckFailed));
}

#[tokio::test]
async fn tuple_history_tracks_two_most_recent_writes() {
    let engine = StorageEngine::new().await.unwrap();
    engine.create_table(movie_table(vec![])).await.unwrap();

    let key = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
    ]);

    let v1 = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
        ("rev", AttributeValue::N("1".into())),
    ]);
    let v2 = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
        ("rev", AttributeValue::N("2".into())),
    ]);

    engine.put("movie", v1.clone(), None).await.unwrap();
    assert_eq!(engine.get("movie", &key, false).await.unwrap(), None);

    engine.put("movie", v2.clone(), None).await.unwrap();
    assert_eq!(engine.get("movie", &key, true).await.unwrap(), Some(v2));
    assert_eq!(engine.get("movie", &key, false).await.unwrap(), Some(v1));

    engine.delete("movie", key.clone(), None).await.unwrap();
    assert_eq!(engine.get("movie", &key, true).await.unwrap(), None);
}

#[tokio::test]
async fn gsi_query_returns_items_in_ascending_sort_order() {
    let gsi = GlobalSecondaryIndexSetting {
        index_name: "gsi_language".to_string(),
        partition_key: "language".to_string(),
        sort_key: Some("title".to_string()),
        projection: ProjectionType::All,
    };
    let engine = StorageEngine::new().await.unwrap();
    engine.create_table(movie_table(vec![gsi])).await.unwrap();

    for title in ["D", "B", "C", "A"] {
        let item = entry(&[
            ("year", AttributeValue::N("2024".into())),
            ("title", AttributeValue::S(title.into())),
            ("language", AttributeValue::S("English".into())),
        ]);
        engine.put("movie", item, None).await.unwrap();
    }

    let key_condition = ddb_expr::Parser::parse_key_condition("language = :lang").unwrap();
    let mut env = ddb_expr::Env::default();
    env.values
        .insert(":lang".to_string(), AttributeValue::S("English".into()));
    let schema = ddb_expr::KeySchema {
        partition_key: "language".to_string(),
        sort_key: Some("title".to_string()),
    };
    let query = ddb_expr::compile_key_condition(&key_condition, &env, &schema).unwrap();

    let mut txn = engine.begin(false).await.unwrap();
    let (results, scanned) = engine
        .query_with_txn(&mut txn, "movie", Some("gsi_language"), &query, false, true, None, None, None)
        .await
        .unwrap();
    txn.commit().await.unwrap();

    assert_eq!(scanned, 4);
    let titles: Vec<String> = results
        .into_iter()
        .map(|item| match item.get("title") {
            Some(AttributeValue::S(s)) => s.clone(),
            _ => panic!("expected a string title"),
        })
        .collect();
    assert_eq!(titles, vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn gsi_keys_only_projection_includes_base_table_key_attributes() {
    let gsi = GlobalSecondaryIndexSetting {
        index_name: "gsi_language".to_string(),
        partition_key: "language".to_string(),
        sort_key: None,
        projection: ProjectionType::KeysOnly,
    };
    let engine = StorageEngine::new().await.unwrap();
    engine.create_table(movie_table(vec![gsi])).await.unwrap();

    let item = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
        ("language", AttributeValue::S("English".into())),
        ("rating", AttributeValue::N("9.3".into())),
    ]);
    engine.put("movie", item, None).await.unwrap();

    let key_condition = ddb_expr::Parser::parse_key_condition("language = :lang").unwrap();
    let mut env = ddb_expr::Env::default();
    env.values
        .insert(":lang".to_string(), AttributeValue::S("English".into()));
    let schema = ddb_expr::KeySchema {
        partition_key: "language".to_string(),
        sort_key: None,
    };
    let query = ddb_expr::compile_key_condition(&key_condition, &env, &schema).unwrap();

    let mut txn = engine.begin(false).await.unwrap();
    let (results, _) = engine
        .query_with_txn(&mut txn, "movie", Some("gsi_language"), &query, true, true, None, None, None)
        .await
        .unwrap();
    txn.commit().await.unwrap();

    assert_eq!(results.len(), 1);
    let projected = &results[0];
    assert_eq!(projected.get("year"), Some(&AttributeValue::N("2024".into())));
    assert_eq!(projected.get("title"), Some(&AttributeValue::S("A".into())));
    assert_eq!(projected.get("language"), Some(&AttributeValue::S("English".into())));
    assert_eq!(projected.get("rating"), None);
}

#[tokio::test]
async fn delete_tombstones_gsi_row() {
    let gsi = GlobalSecondaryIndexSetting {
        index_name: "gsi_language".to_string(),
        partition_key: "language".to_string(),
        sort_key: None,
        projection: ProjectionType::All,
    };
    let engine = StorageEngine::new().await.unwrap();
    engine.create_table(movie_table(vec![gsi])).await.unwrap();

    let item = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
        ("language", AttributeValue::S("English".into())),
    ]);
    engine.put("movie", item, None).await.unwrap();

    let key_condition = ddb_expr::Parser::parse_key_condition("language = :lang").unwrap();
    let mut env = ddb_expr::Env::default();
    env.values
        .insert(":lang".to_string(), AttributeValue::S("English".into()));
    let schema = ddb_expr::KeySchema {
        partition_key: "language".to_string(),
        sort_key: None,
    };
    let query = ddb_expr::compile_key_condition(&key_condition, &env, &schema).unwrap();

    let mut txn = engine.begin(false).await.unwrap();
    let (before, _) = engine
        .query_with_txn(&mut txn, "movie", Some("gsi_language"), &query, true, true, None, None, None)
        .await
        .unwrap();
    txn.commit().await.unwrap();
    assert_eq!(before.len(), 1);

    let key = entry(&[
        ("year", AttributeValue::N("2024".into())),
        ("title", AttributeValue::S("A".into())),
    ]);
    engine.delete("movie", key, None).await.unwrap();

    let mut txn = engine.begin(false).await.unwrap();
    let (after, _) = engine
        .query_with_txn(&mut txn, "movie", Some("gsi_language"), &query, true, true, None, None, None)
        .await
        .unwrap();
    txn.commit().await.unwrap();
    assert_eq!(after.len(), 0);
}

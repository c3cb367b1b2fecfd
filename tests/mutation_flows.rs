//! Mutation-layer tests: statement order, binds and adjacency patches.

mod common;

use std::sync::Arc;

use common::{row, MockExecutor};
use postgraph::{EndpointRef, Graph, GraphError};
use serde_json::json;

#[tokio::test]
async fn add_vertex_is_a_single_insert_with_system_columns() {
    let executor = Arc::new(MockExecutor::new(vec![vec![row(&[
        ("uuid", json!("fresh")),
        ("name", json!("saturn")),
    ])]]));
    let graph = Graph::new(executor.clone());

    let inserted = graph
        .add_vertex("god", row(&[("name", json!("saturn")), ("age", json!(10000))]))
        .await
        .unwrap();
    assert_eq!(inserted.get("uuid"), Some(&json!("fresh")));

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    let (sql, params) = &calls[0];
    assert_eq!(
        sql,
        "INSERT INTO god (name, age, in_e, out_e, uuid, version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *"
    );
    assert_eq!(params[0], json!("saturn"));
    assert_eq!(params[1], json!(10000));
    assert_eq!(params[2], json!({}));
    assert_eq!(params[3], json!({}));
    assert!(params[4].is_string());
    assert_eq!(params[5], json!(1));
    assert!(params[6].is_i64());
    assert_eq!(params[6], params[7]);
}

#[tokio::test]
async fn add_edge_inserts_then_patches_both_endpoints() {
    let executor = Arc::new(MockExecutor::empty());
    let graph = Graph::new(executor.clone());

    let from = EndpointRef::new("god", "g1");
    let to = EndpointRef::new("titan", "t1");
    graph
        .add_edge("father", &from, &to, row(&[]))
        .await
        .unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 3);

    let (insert_sql, insert_params) = &calls[0];
    assert!(insert_sql.starts_with("INSERT INTO god__father__titan ("));
    assert!(insert_sql.ends_with("RETURNING *"));
    // Edge rows store endpoint pointers under the adjacency column names.
    assert_eq!(insert_params[0], json!({ "label": "god", "uuid": "g1" }));
    assert_eq!(insert_params[1], json!({ "label": "titan", "uuid": "t1" }));
    let edge_uuid = insert_params[2].clone();

    // Target's in_e first, then source's out_e, both binding [vertex, edge].
    let (attach_in, in_params) = &calls[1];
    assert!(attach_in.starts_with("UPDATE titan SET in_e = CASE"));
    assert!(attach_in.contains("jsonb_insert(in_e, '{god__father__titan,0}'"));
    assert_eq!(in_params, &vec![json!("t1"), edge_uuid.clone()]);

    let (attach_out, out_params) = &calls[2];
    assert!(attach_out.starts_with("UPDATE god SET out_e = CASE"));
    assert!(attach_out.contains("jsonb_set(out_e, '{god__father__titan}'"));
    assert_eq!(out_params, &vec![json!("g1"), edge_uuid]);
}

#[tokio::test]
async fn update_properties_drops_protected_columns() {
    let executor = Arc::new(MockExecutor::empty());
    let graph = Graph::new(executor.clone());

    let ids = vec!["g1".to_string()];
    let props = row(&[
        ("age", json!(4001)),
        ("uuid", json!("hijack")),
        ("version", json!(99)),
    ]);
    graph.update_properties("god", &ids, &props).await.unwrap();

    let (sql, params) = &executor.calls()[0];
    assert!(sql.starts_with("UPDATE god SET version = version + 1, age = $2, updated_at = $3"));
    assert!(sql.contains("WHERE to_jsonb($1::text[]) ? uuid"));
    assert!(!sql.contains("uuid ="));
    assert!(!sql.contains("version = $"));
    assert_eq!(params.len(), 3);
    assert_eq!(params[0], json!(["g1"]));
    assert_eq!(params[1], json!(4001));
}

#[tokio::test]
async fn delete_vertex_detaches_every_incident_edge() {
    let executor = Arc::new(MockExecutor::new(vec![
        // in_e adjacency keys
        vec![row(&[("edge_label", json!("god__father__titan"))])],
        // correlated prune of the source neighbor's out_e
        vec![row(&[("path", json!(["t1", "e1", "g1"]))])],
        // edge row delete
        vec![row(&[("uuid", json!("e1"))])],
        // out_e adjacency keys
        Vec::new(),
        // vertex row delete
        Vec::new(),
    ]));
    let graph = Graph::new(executor.clone());

    let removed = graph.delete_vertex("titan", "t1").await.unwrap();
    assert_eq!(removed, 1);

    let calls = executor.calls();
    assert_eq!(calls.len(), 5);

    assert!(calls[0].0.contains("jsonb_object_keys(in_e)"));
    assert_eq!(calls[0].1, vec![json!("t1")]);

    let (prune_sql, prune_params) = &calls[1];
    assert!(prune_sql.starts_with("WITH p0 AS"));
    assert!(prune_sql.contains(
        "UPDATE god SET out_e = jsonb_set(god.out_e, '{god__father__titan}'"
    ));
    assert_eq!(prune_params, &vec![json!("t1")]);

    assert_eq!(
        calls[2].0,
        "DELETE FROM god__father__titan WHERE to_jsonb($1::text[]) ? uuid RETURNING *"
    );
    assert_eq!(calls[2].1, vec![json!(["e1"])]);

    assert!(calls[3].0.contains("jsonb_object_keys(out_e)"));
    assert_eq!(calls[4].0, "DELETE FROM titan WHERE uuid = $1");
}

#[tokio::test]
async fn delete_vertex_with_absent_id_is_a_noop() {
    let executor = Arc::new(MockExecutor::empty());
    let graph = Graph::new(executor.clone());

    let removed = graph.delete_vertex("god", "missing").await.unwrap();
    assert_eq!(removed, 0);
    assert_eq!(executor.calls().len(), 3);
}

#[tokio::test]
async fn delete_edge_prunes_both_adjacency_entries() {
    let executor = Arc::new(MockExecutor::new(vec![vec![row(&[
        ("uuid", json!("e1")),
        ("in_e", json!({ "label": "god", "uuid": "g1" })),
        ("out_e", json!({ "label": "location", "uuid": "l1" })),
    ])]]));
    let graph = Graph::new(executor.clone());

    graph
        .delete_edge("god__lives__location", "e1")
        .await
        .unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(
        calls[0].0,
        "SELECT * FROM god__lives__location WHERE uuid = $1"
    );

    let (prune_source, source_params) = &calls[1];
    assert!(prune_source.starts_with("UPDATE god SET out_e = jsonb_set(out_e"));
    assert_eq!(source_params, &vec![json!("g1"), json!("e1")]);

    let (prune_target, target_params) = &calls[2];
    assert!(prune_target.starts_with("UPDATE location SET in_e = jsonb_set(in_e"));
    assert_eq!(target_params, &vec![json!("l1"), json!("e1")]);

    assert_eq!(
        calls[3].0,
        "DELETE FROM god__lives__location WHERE uuid = $1"
    );
    assert_eq!(calls[3].1, vec![json!("e1")]);
}

#[tokio::test]
async fn delete_edge_with_absent_id_stops_after_the_lookup() {
    let executor = Arc::new(MockExecutor::empty());
    let graph = Graph::new(executor.clone());

    graph
        .delete_edge("god__lives__location", "missing")
        .await
        .unwrap();
    assert_eq!(executor.calls().len(), 1);
}

#[tokio::test]
async fn create_tables_emit_idempotent_ddl() {
    let executor = Arc::new(MockExecutor::empty());
    let graph = Graph::new(executor.clone());

    graph
        .create_vertex_table("god", &["name TEXT", "age BIGINT"])
        .await
        .unwrap();
    graph
        .create_edge_table("lives", "god", "location", &["reason TEXT"])
        .await
        .unwrap();

    let calls = executor.calls();
    assert!(calls[0].0.starts_with("CREATE TABLE IF NOT EXISTS god ("));
    assert!(calls[1]
        .0
        .starts_with("CREATE TABLE IF NOT EXISTS god__lives__location ("));
    assert!(calls[1].0.contains("reason TEXT"));
}

#[tokio::test]
async fn invalid_identifiers_never_reach_the_store() {
    let executor = Arc::new(MockExecutor::empty());
    let graph = Graph::new(executor.clone());

    let err = graph
        .add_vertex("god; DROP TABLE god", row(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidIdentifier(_)));

    let err = graph
        .add_vertex("god", row(&[("bad-key", json!(1))]))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidIdentifier(_)));

    assert!(executor.calls().is_empty());
}

//! Mutation statements that keep the adjacency indexes consistent.
//!
//! Adjacency appends and prunes are expressed as single atomic jsonb patch
//! statements (`jsonb_set`/`jsonb_insert`/array subtraction), never as a
//! client-side read-then-write, so concurrent writers fall back to the
//! store's row-level locking instead of losing updates.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use crate::config::GraphConfig;
use crate::executor::{Executor, Row};
use crate::graph::errors::GraphError;
use crate::graph::EndpointRef;
use crate::traversal::step::split_edge_label;

/// System columns rejected from property updates.
const PROTECTED_COLUMNS: [&str; 7] = [
    "id",
    "uuid",
    "in_e",
    "out_e",
    "version",
    "created_at",
    "updated_at",
];

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

/// Reject names that cannot be safely interpolated into statement text.
pub(crate) fn check_identifier(config: GraphConfig, name: &str) -> Result<(), GraphError> {
    if config.validate_identifiers && !IDENTIFIER.is_match(name) {
        return Err(GraphError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn insert_statement(table: &str, keys: &[String]) -> String {
    let placeholders: Vec<String> = (1..=keys.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        table,
        keys.join(", "),
        placeholders.join(", ")
    )
}

/// Insert a vertex row with empty adjacency maps, a fresh uuid, version 1 and
/// current timestamps. Returns the inserted row.
pub(crate) async fn insert_vertex(
    executor: &dyn Executor,
    config: GraphConfig,
    label: &str,
    props: Row,
) -> Result<Row, GraphError> {
    check_identifier(config, label)?;
    for key in props.keys() {
        check_identifier(config, key)?;
    }
    let now = now_millis();
    let mut keys: Vec<String> = props.keys().cloned().collect();
    let mut values: Vec<Value> = props.values().cloned().collect();
    keys.extend(
        ["in_e", "out_e", "uuid", "version", "created_at", "updated_at"]
            .map(str::to_string),
    );
    values.extend([
        json!({}),
        json!({}),
        Value::from(uuid::Uuid::new_v4().to_string()),
        json!(1),
        json!(now),
        json!(now),
    ]);
    log::debug!("inserting vertex into {label}");
    let mut rows = executor
        .execute(&insert_statement(label, &keys), &values)
        .await?;
    Ok(rows.pop().unwrap_or_default())
}

fn endpoint_document(endpoint: &EndpointRef) -> Value {
    json!({ "label": endpoint.label, "uuid": endpoint.uuid })
}

/// Atomic adjacency append: create the edge-label key with a one-element
/// array, or insert at the front of the existing one, in a single statement.
fn attach_statement(vertex_label: &str, direction: &str, edge_table: &str) -> String {
    format!(
        "UPDATE {v} SET {d} = CASE \
         WHEN {d} ? '{e}' IS FALSE \
         THEN jsonb_set({d}, '{{{e}}}', jsonb_build_array($2::text)) \
         ELSE jsonb_insert({d}, '{{{e},0}}', to_jsonb($2::text)) \
         END WHERE uuid = $1 RETURNING *",
        v = vertex_label,
        d = direction,
        e = edge_table,
    )
}

/// Insert an edge row carrying its endpoint references, then patch the
/// target's `in_e` and the source's `out_e` adjacency maps, in that order.
///
/// The three statements are not one transaction: a failure between them is
/// observable as "edge exists, endpoints not yet updated", never the reverse.
/// Returns the inserted edge row.
pub(crate) async fn insert_edge(
    executor: &dyn Executor,
    config: GraphConfig,
    edge_name: &str,
    from: &EndpointRef,
    to: &EndpointRef,
    props: Row,
) -> Result<Row, GraphError> {
    check_identifier(config, edge_name)?;
    check_identifier(config, &from.label)?;
    check_identifier(config, &to.label)?;
    for key in props.keys() {
        check_identifier(config, key)?;
    }
    let edge_table = super::ddl::edge_table_name(&from.label, edge_name, &to.label);
    let edge_uuid = uuid::Uuid::new_v4().to_string();
    let now = now_millis();

    let mut keys: Vec<String> = props.keys().cloned().collect();
    let mut values: Vec<Value> = props.values().cloned().collect();
    keys.extend(
        ["in_e", "out_e", "uuid", "version", "created_at", "updated_at"]
            .map(str::to_string),
    );
    values.extend([
        endpoint_document(from),
        endpoint_document(to),
        Value::from(edge_uuid.clone()),
        json!(1),
        json!(now),
        json!(now),
    ]);
    log::debug!("inserting edge into {edge_table}");
    let mut rows = executor
        .execute(&insert_statement(&edge_table, &keys), &values)
        .await?;
    let edge = rows.pop().unwrap_or_default();

    executor
        .execute(
            &attach_statement(&to.label, "in_e", &edge_table),
            &[Value::from(to.uuid.clone()), Value::from(edge_uuid.clone())],
        )
        .await?;
    executor
        .execute(
            &attach_statement(&from.label, "out_e", &edge_table),
            &[Value::from(from.uuid.clone()), Value::from(edge_uuid)],
        )
        .await?;
    Ok(edge)
}

/// Update user properties on every row whose uuid is in `ids`. Protected
/// system columns are silently dropped from the update set; `version` always
/// increments by exactly one and `updated_at` is refreshed.
pub(crate) async fn update_properties(
    executor: &dyn Executor,
    config: GraphConfig,
    label: &str,
    ids: &[String],
    props: &Row,
) -> Result<(), GraphError> {
    check_identifier(config, label)?;
    let mut assignments = Vec::new();
    let mut params: Vec<Value> = vec![Value::from(ids.to_vec())];
    for (key, value) in props {
        if PROTECTED_COLUMNS.contains(&key.as_str()) {
            continue;
        }
        check_identifier(config, key)?;
        params.push(value.clone());
        assignments.push(format!("{} = ${}", key, params.len()));
    }
    params.push(json!(now_millis()));
    assignments.push(format!("updated_at = ${}", params.len()));
    let sql = format!(
        "UPDATE {} SET version = version + 1, {} WHERE to_jsonb($1::text[]) ? uuid RETURNING *",
        label,
        assignments.join(", ")
    );
    log::debug!("updating {} row(s) in {label}", ids.len());
    executor.execute(&sql, &params).await?;
    Ok(())
}

/// The edge-label keys currently present in one of the vertex's adjacency
/// maps.
async fn adjacency_keys(
    executor: &dyn Executor,
    label: &str,
    direction: &str,
    uuid: &str,
) -> Result<Vec<String>, GraphError> {
    let sql = format!(
        "SELECT jsonb_object_keys({direction}) AS edge_label FROM {label} WHERE uuid = $1"
    );
    let rows = executor.execute(&sql, &[Value::from(uuid)]).await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("edge_label").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// Locate every edge of `edge_label` incident to the vertex in the given
/// direction together with the neighbor on the far side, prune the edge uuid
/// from that neighbor's opposite adjacency entry, then delete the edge rows.
///
/// Returns the number of edges removed. The lookup and the prune are one
/// correlated statement (a `WITH` chain feeding an `UPDATE .. FROM`); each
/// returned row's path array is `[vertex, edge, neighbor]`.
async fn detach_adjacent(
    executor: &dyn Executor,
    vertex_label: &str,
    uuid: &str,
    edge_label: &str,
    incoming: bool,
) -> Result<u64, GraphError> {
    let (from_label, _, to_label) = split_edge_label(edge_label)
        .ok_or_else(|| GraphError::MalformedEdgeLabel(edge_label.to_string()))?;
    // For incoming edges this vertex is the target and the neighbors are
    // sources (prune their out_e); for outgoing edges the roles flip.
    let (own_direction, neighbor_label, neighbor_direction) = if incoming {
        ("in_e", from_label, "out_e")
    } else {
        ("out_e", to_label, "in_e")
    };
    let triples_sql = format!(
        "WITH p0 AS (SELECT jsonb_build_array($1::text) AS path, {own} FROM {v} WHERE uuid = $1),\n\
         p1 AS (SELECT path || jsonb_build_array({e}.uuid) AS path FROM {e}, p0 WHERE p0.{own}->'{e}' ? {e}.uuid),\n\
         p2 AS (SELECT path || jsonb_build_array({n}.uuid) AS path FROM {n}, p1 WHERE {n}.{nd}->'{e}' ? (path->>1)::text),\n\
         res AS (SELECT * FROM p2)\n\
         UPDATE {n} SET {nd} = jsonb_set({n}.{nd}, '{{{e}}}', (({n}.{nd}->'{e}') - (path->>1)::text)) \
         FROM res WHERE path->>2 = {n}.uuid RETURNING *",
        v = vertex_label,
        e = edge_label,
        n = neighbor_label,
        own = own_direction,
        nd = neighbor_direction,
    );
    let rows = executor.execute(&triples_sql, &[Value::from(uuid)]).await?;
    let edge_ids: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get("path").and_then(|path| path.get(1)))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let removed = executor
        .execute(
            &format!("DELETE FROM {edge_label} WHERE to_jsonb($1::text[]) ? uuid RETURNING *"),
            &[Value::from(edge_ids)],
        )
        .await?;
    Ok(removed.len() as u64)
}

/// Cascading vertex delete: detach and remove every incoming edge, then every
/// outgoing edge, then the vertex row itself. Returns the number of edges
/// removed; deleting an absent id is a no-op returning zero.
///
/// The sequence is not transactional; a failure partway leaves a vertex with
/// a pruned but not-yet-empty adjacency map and some edges already gone.
pub(crate) async fn delete_vertex(
    executor: &dyn Executor,
    config: GraphConfig,
    label: &str,
    uuid: &str,
) -> Result<u64, GraphError> {
    check_identifier(config, label)?;
    let mut removed = 0u64;
    for edge_label in adjacency_keys(executor, label, "in_e", uuid).await? {
        check_identifier(config, &edge_label)?;
        log::debug!("detaching incoming {edge_label} edges from {label}");
        removed += detach_adjacent(executor, label, uuid, &edge_label, true).await?;
    }
    for edge_label in adjacency_keys(executor, label, "out_e", uuid).await? {
        check_identifier(config, &edge_label)?;
        log::debug!("detaching outgoing {edge_label} edges from {label}");
        removed += detach_adjacent(executor, label, uuid, &edge_label, false).await?;
    }
    executor
        .execute(
            &format!("DELETE FROM {label} WHERE uuid = $1"),
            &[Value::from(uuid)],
        )
        .await?;
    Ok(removed)
}

/// Single atomic adjacency prune: subtract one edge uuid from the array under
/// the edge-label key.
fn prune_statement(vertex_label: &str, direction: &str, edge_table: &str) -> String {
    format!(
        "UPDATE {v} SET {d} = jsonb_set({d}, '{{{e}}}', (({d}->'{e}') - $2::text)) WHERE uuid = $1",
        v = vertex_label,
        d = direction,
        e = edge_table,
    )
}

fn endpoint_of(value: Option<&Value>) -> Option<(String, String)> {
    let value = value?;
    Some((
        value.get("label")?.as_str()?.to_string(),
        value.get("uuid")?.as_str()?.to_string(),
    ))
}

/// Delete one edge: prune its uuid from the source's `out_e` and the target's
/// `in_e`, then delete the edge row. Deleting an absent id is a no-op.
pub(crate) async fn delete_edge(
    executor: &dyn Executor,
    config: GraphConfig,
    edge_label: &str,
    uuid: &str,
) -> Result<(), GraphError> {
    check_identifier(config, edge_label)?;
    let rows = executor
        .execute(
            &format!("SELECT * FROM {edge_label} WHERE uuid = $1"),
            &[Value::from(uuid)],
        )
        .await?;
    let edge = match rows.into_iter().next() {
        Some(edge) => edge,
        None => return Ok(()),
    };
    // On edge rows in_e/out_e are endpoint pointers, not adjacency maps.
    if let Some((source_label, source_uuid)) = endpoint_of(edge.get("in_e")) {
        check_identifier(config, &source_label)?;
        executor
            .execute(
                &prune_statement(&source_label, "out_e", edge_label),
                &[Value::from(source_uuid), Value::from(uuid)],
            )
            .await?;
    }
    if let Some((target_label, target_uuid)) = endpoint_of(edge.get("out_e")) {
        check_identifier(config, &target_label)?;
        executor
            .execute(
                &prune_statement(&target_label, "in_e", edge_label),
                &[Value::from(target_uuid), Value::from(uuid)],
            )
            .await?;
    }
    executor
        .execute(
            &format!("DELETE FROM {edge_label} WHERE uuid = $1"),
            &[Value::from(uuid)],
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        let config = GraphConfig::default();
        assert!(check_identifier(config, "god").is_ok());
        assert!(check_identifier(config, "god__lives__location").is_ok());
        assert!(check_identifier(config, "_private").is_ok());
        assert!(check_identifier(config, "1god").is_err());
        assert!(check_identifier(config, "god; DROP TABLE god").is_err());
        assert!(check_identifier(config, "").is_err());
    }

    #[test]
    fn test_identifier_validation_can_be_disabled() {
        let config = GraphConfig {
            validate_identifiers: false,
        };
        assert!(check_identifier(config, "\"public\".\"god\"").is_ok());
    }

    #[test]
    fn test_insert_statement_shape() {
        let keys: Vec<String> = ["name", "uuid"].map(str::to_string).to_vec();
        assert_eq!(
            insert_statement("god", &keys),
            "INSERT INTO god (name, uuid) VALUES ($1, $2) RETURNING *"
        );
    }

    #[test]
    fn test_attach_statement_is_single_document_patch() {
        let sql = attach_statement("location", "in_e", "god__lives__location");
        assert!(sql.contains("WHEN in_e ? 'god__lives__location' IS FALSE"));
        assert!(sql.contains("jsonb_set(in_e, '{god__lives__location}', jsonb_build_array($2::text))"));
        assert!(sql.contains("jsonb_insert(in_e, '{god__lives__location,0}', to_jsonb($2::text))"));
        assert!(sql.contains("WHERE uuid = $1"));
    }

    #[test]
    fn test_prune_statement_subtracts_one_element() {
        let sql = prune_statement("god", "out_e", "god__lives__location");
        assert_eq!(
            sql,
            "UPDATE god SET out_e = jsonb_set(out_e, '{god__lives__location}', \
             ((out_e->'god__lives__location') - $2::text)) WHERE uuid = $1"
        );
    }

    #[test]
    fn test_endpoint_of() {
        let value = json!({ "label": "god", "uuid": "abc" });
        assert_eq!(
            endpoint_of(Some(&value)),
            Some(("god".to_string(), "abc".to_string()))
        );
        assert_eq!(endpoint_of(Some(&json!("not an object"))), None);
        assert_eq!(endpoint_of(None), None);
    }
}

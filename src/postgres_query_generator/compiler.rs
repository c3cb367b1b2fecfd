//! Per-step lowering and positional parameter planning.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::errors::CompileError;
use super::path::PathColumns;
use super::{CompiledQuery, FragmentInfo};
use crate::traversal::step::split_edge_label;
use crate::traversal::{StepKind, StepValue, Traversal};

/// Compile a traversal into one statement. Consumes the chain; recursive for
/// `where_` sub-chains, which inherit the running parameter count as their
/// offset so the flat bound-value list stays positionally correct.
pub(crate) fn compile(traversal: Traversal) -> Result<CompiledQuery, CompileError> {
    let Traversal {
        executor,
        config,
        steps,
        meta,
    } = traversal;
    if steps.is_empty() {
        return Err(CompileError::EmptyTraversal);
    }

    let path = match &meta.path_column {
        Some(column) => PathColumns::named(column.clone()),
        None => PathColumns::new(meta.has_path_step),
    };
    let mut fragments: Vec<FragmentInfo> = Vec::new();
    let mut vars: Vec<Value> = Vec::new();

    for (index, step) in steps.into_iter().enumerate() {
        let name = fragment_name(index + 1, step.kind.token());
        match step.kind {
            StepKind::Vertices | StepKind::Edges => {
                let (sql, binds) = match step.value {
                    StepValue::Ids(ids) => {
                        let ph = placeholder(meta.param_offset, vars.len());
                        (
                            format!(
                                "SELECT *, {} FROM {} WHERE to_jsonb({}::text[]) ? uuid",
                                path.seed(),
                                step.label,
                                ph
                            ),
                            vec![Value::from(ids)],
                        )
                    }
                    _ => (
                        format!("SELECT *, {} FROM {}", path.seed(), step.label),
                        Vec::new(),
                    ),
                };
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name,
                        sql,
                        binds,
                        collection: step.label,
                    },
                );
            }
            StepKind::Seed => {
                // `label` holds the enclosing fragment name to select from.
                let collection = match step.value {
                    StepValue::SeedCollection(collection) => collection,
                    _ => String::new(),
                };
                let sql = format!("SELECT *, {} FROM {}", path.seed(), step.label);
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name,
                        sql,
                        binds: Vec::new(),
                        collection,
                    },
                );
            }
            StepKind::OutE | StepKind::InE => {
                let prev_name = predecessor_name(&fragments, step.kind.token())?;
                let direction = if step.kind == StepKind::OutE {
                    "out_e"
                } else {
                    "in_e"
                };
                let sql = format!(
                    "SELECT {e}.*, {p} FROM {f}, {e} WHERE {c}",
                    e = step.label,
                    p = path.extend(&prev_name, &step.label),
                    f = prev_name,
                    c = adjacency_contains(&prev_name, direction, &step.label, &step.label),
                );
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name,
                        sql,
                        binds: Vec::new(),
                        collection: step.label,
                    },
                );
            }
            StepKind::OutV | StepKind::InV => {
                let (prev_name, edge_label) = {
                    let prev = fragments
                        .last()
                        .ok_or(CompileError::MissingPredecessor(step.kind.token()))?;
                    (prev.name.clone(), prev.collection.clone())
                };
                // The vertex label was derived at chain time; the encoding is
                // re-checked here because seeded chains carry it indirectly.
                split_edge_label(&edge_label)
                    .ok_or_else(|| CompileError::MalformedEdgeLabel(edge_label.clone()))?;
                let direction = if step.kind == StepKind::InV {
                    "in_e"
                } else {
                    "out_e"
                };
                let sql = format!(
                    "SELECT {v}.*, {p} FROM {f}, {v} WHERE {c}",
                    v = step.label,
                    p = path.extend(&prev_name, &step.label),
                    f = prev_name,
                    c = adjacency_contains(&step.label, direction, &edge_label, &prev_name),
                );
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name,
                        sql,
                        binds: Vec::new(),
                        collection: step.label,
                    },
                );
            }
            StepKind::Out | StepKind::In => {
                let prev_name = predecessor_name(&fragments, step.kind.token())?;
                let edge_label = step.label;
                let (source_v, _, target_v) = split_edge_label(&edge_label)
                    .map(|(s, e, t)| (s.to_string(), e.to_string(), t.to_string()))
                    .ok_or_else(|| CompileError::MalformedEdgeLabel(edge_label.clone()))?;
                let (vertex_label, edge_dir, vertex_dir) = if step.kind == StepKind::Out {
                    (target_v, "out_e", "in_e")
                } else {
                    (source_v, "in_e", "out_e")
                };
                let edge_name = format!("{name}_e");
                let vertex_name = format!("{name}_v");
                // The intermediate edge fragment carries the path unchanged;
                // only the vertex fragment appends to it.
                let edge_sql = format!(
                    "SELECT {e}.*, {p} FROM {f}, {e} WHERE {c}",
                    e = edge_label,
                    p = path.carry(&prev_name),
                    f = prev_name,
                    c = adjacency_contains(&prev_name, edge_dir, &edge_label, &edge_label),
                );
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name: edge_name.clone(),
                        sql: edge_sql,
                        binds: Vec::new(),
                        collection: edge_label.clone(),
                    },
                );
                let vertex_sql = format!(
                    "SELECT {v}.*, {p} FROM {f}, {v} WHERE {c}",
                    v = vertex_label,
                    p = path.extend(&edge_name, &vertex_label),
                    f = edge_name,
                    c = adjacency_contains(&vertex_label, vertex_dir, &edge_label, &edge_name),
                );
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name: vertex_name,
                        sql: vertex_sql,
                        binds: Vec::new(),
                        collection: vertex_label,
                    },
                );
            }
            StepKind::Has => {
                let prev_name = predecessor_name(&fragments, "has")?;
                let conditions = match step.value {
                    StepValue::Conditions(conditions) => conditions,
                    _ => Vec::new(),
                };
                let mut clauses = Vec::with_capacity(conditions.len());
                let mut binds = Vec::with_capacity(conditions.len());
                for (field, condition) in conditions {
                    let predicate = condition.into_predicate();
                    let ph = placeholder(meta.param_offset, vars.len() + binds.len());
                    clauses.push(predicate.fragment(&field, &ph));
                    binds.push(predicate.bind_value());
                }
                let sql = if clauses.is_empty() {
                    format!("SELECT * FROM {prev_name}")
                } else {
                    format!("SELECT * FROM {} WHERE {}", prev_name, clauses.join(" AND "))
                };
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name,
                        sql,
                        binds,
                        collection: step.label,
                    },
                );
            }
            StepKind::HasId => {
                let prev_name = predecessor_name(&fragments, "hasId")?;
                let ids = match step.value {
                    StepValue::Ids(ids) => ids,
                    _ => Vec::new(),
                };
                let ph = placeholder(meta.param_offset, vars.len());
                let sql = format!(
                    "SELECT * FROM {prev_name} WHERE to_jsonb({ph}::text[]) ? uuid"
                );
                emit(
                    &mut fragments,
                    &mut vars,
                    FragmentInfo {
                        name,
                        sql,
                        binds: vec![Value::from(ids)],
                        collection: step.label,
                    },
                );
            }
            StepKind::Where => {
                let (prev_name, prev_collection) = {
                    let prev = fragments
                        .last()
                        .ok_or(CompileError::MissingPredecessor("where"))?;
                    (prev.name.clone(), prev.collection.clone())
                };
                let sub = match step.value {
                    StepValue::SubTraversal(sub) => sub,
                    _ => continue,
                };
                // The nested compile numbers its placeholders after every
                // value already bound here, offsets included, so the flat
                // list stays positionally correct at any nesting depth.
                let inherited = meta.param_offset + vars.len();
                // The sub-chain accumulates under its own column name: its
                // seed selects `*` from a fragment that already exposes this
                // compile's path column when tracking is on, and a second
                // `path` would make every later reference ambiguous.
                let sub_column = format!("path_{}", suffix());
                let seeded = Traversal::seeded(
                    Arc::clone(&executor),
                    config,
                    inherited,
                    sub_column.clone(),
                    prev_name.clone(),
                    step.result,
                    prev_collection,
                );
                let nested = compile(sub(seeded)?)?;
                let alias = format!("t_where_path_{}", suffix());
                let sql = format!(
                    "SELECT {prev}.* FROM ({nested}) AS {alias}, {prev} WHERE {alias}.{col}->0 = to_jsonb({prev}.uuid)",
                    prev = prev_name,
                    nested = nested.query,
                    alias = alias,
                    col = sub_column,
                );
                vars.extend(nested.vars.iter().cloned());
                fragments.push(FragmentInfo {
                    name,
                    sql,
                    binds: nested.vars,
                    collection: step.label,
                });
            }
        }
    }

    let queries: Vec<String> = fragments
        .iter()
        .map(|fragment| format!("{} AS ({})", fragment.name, fragment.sql))
        .collect();
    let last = fragments
        .last()
        .map(|fragment| fragment.name.clone())
        .ok_or(CompileError::EmptyTraversal)?;
    let query = format!("WITH {}\nSELECT * FROM {}", queries.join(",\n"), last);

    Ok(CompiledQuery {
        query,
        vars,
        queries,
        table_queries: fragments,
    })
}

fn emit(fragments: &mut Vec<FragmentInfo>, vars: &mut Vec<Value>, fragment: FragmentInfo) {
    vars.extend(fragment.binds.iter().cloned());
    fragments.push(fragment);
}

fn predecessor_name(
    fragments: &[FragmentInfo],
    token: &'static str,
) -> Result<String, CompileError> {
    fragments
        .last()
        .map(|fragment| fragment.name.clone())
        .ok_or(CompileError::MissingPredecessor(token))
}

/// Positional placeholder for the next bound value.
fn placeholder(offset: usize, bound_so_far: usize) -> String {
    format!("${}", offset + bound_so_far + 1)
}

/// `vertex.direction->'edge_label' ? edge.uuid` - does the adjacency map
/// under `edge_label` contain the edge fragment's id.
fn adjacency_contains(vertex: &str, direction: &str, edge_label: &str, edge: &str) -> String {
    format!("{vertex}.{direction}->'{edge_label}' ? {edge}.uuid")
}

fn suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..6].to_string()
}

fn fragment_name(step_no: usize, token: &str) -> String {
    format!("t{}_{}_{}", step_no, token, suffix())
}

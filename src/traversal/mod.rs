//! The fluent step chain.
//!
//! A [`Traversal`] records an ordered list of typed steps and hands the whole
//! list to the query generator when a terminal step runs. Step sequencing is
//! validated against an explicit result-type state machine as each step is
//! recorded, so an illegal chain fails before any SQL exists.

pub mod errors;
pub mod predicate;
pub mod step;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::config::GraphConfig;
use crate::executor::{Executor, Row};
use crate::graph::{mutation, GraphError};
use crate::postgres_query_generator::{self, CompiledQuery};

pub use errors::TraversalError;
pub use predicate::{HasValue, Predicate};
pub use step::{ChainState, ResultKind, Step, StepKind, StepValue};

use step::{split_edge_label, step_allowed, SubTraversalFn};

/// One id or several, always normalized to a list.
#[derive(Debug, Clone)]
pub struct IdList(pub Vec<String>);

impl From<&str> for IdList {
    fn from(id: &str) -> Self {
        IdList(vec![id.to_string()])
    }
}

impl From<String> for IdList {
    fn from(id: String) -> Self {
        IdList(vec![id])
    }
}

impl From<Vec<String>> for IdList {
    fn from(ids: Vec<String>) -> Self {
        IdList(ids)
    }
}

impl From<Vec<&str>> for IdList {
    fn from(ids: Vec<&str>) -> Self {
        IdList(ids.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for IdList {
    fn from(ids: &[String]) -> Self {
        IdList(ids.to_vec())
    }
}

/// Compilation metadata carried beside the step list.
#[derive(Debug, Clone, Default)]
pub(crate) struct TraversalMeta {
    /// Set by `path()` or by seeding a `where_` sub-chain; turns on the
    /// path-accumulator column for every navigational fragment.
    pub has_path_step: bool,
    /// Positional parameter offset inherited from an enclosing compile.
    pub param_offset: usize,
    /// Accumulator column name for a seeded sub-chain. `None` means the
    /// plain `path` column owned by the outermost chain; sub-chains get a
    /// unique name so selecting `*` from a path-carrying enclosing fragment
    /// never declares the same column twice.
    pub path_column: Option<String>,
}

/// A traversal under construction. Built by chaining step calls, consumed by
/// exactly one terminal.
pub struct Traversal {
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) config: GraphConfig,
    pub(crate) steps: Vec<Step>,
    pub(crate) meta: TraversalMeta,
}

impl std::fmt::Debug for Traversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traversal")
            .field("config", &self.config)
            .field("steps", &self.steps)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl Traversal {
    pub(crate) fn new(executor: Arc<dyn Executor>, config: GraphConfig) -> Self {
        Traversal {
            executor,
            config,
            steps: Vec::new(),
            meta: TraversalMeta::default(),
        }
    }

    /// A fresh chain seeded at an enclosing fragment, bypassing the empty
    /// start requirement. Only the `where_` compiler uses this; path tracking
    /// is forced on because the correlation predicate reads the seed's path.
    pub(crate) fn seeded(
        executor: Arc<dyn Executor>,
        config: GraphConfig,
        param_offset: usize,
        path_column: String,
        fragment: String,
        result: ResultKind,
        collection: String,
    ) -> Self {
        Traversal {
            executor,
            config,
            steps: vec![Step {
                kind: StepKind::Seed,
                result,
                label: fragment,
                value: StepValue::SeedCollection(collection),
            }],
            meta: TraversalMeta {
                has_path_step: true,
                param_offset,
                path_column: Some(path_column),
            },
        }
    }

    fn state(&self) -> ChainState {
        self.steps
            .last()
            .map(|step| step.result.into())
            .unwrap_or(ChainState::Empty)
    }

    fn require(&self, name: &'static str, kind: StepKind) -> Result<(), TraversalError> {
        let state = self.state();
        if step_allowed(state, kind) {
            return Ok(());
        }
        if matches!(kind, StepKind::Vertices | StepKind::Edges) && state != ChainState::Empty {
            return Err(TraversalError::StartNotFirst { step: name });
        }
        Err(TraversalError::IllegalStep { step: name, state })
    }

    fn require_started(&self, name: &'static str) -> Result<&Step, TraversalError> {
        self.steps.last().ok_or(TraversalError::IllegalStep {
            step: name,
            state: ChainState::Empty,
        })
    }

    /// The collection label the last step's rows belong to. Seed steps store
    /// the enclosing fragment name in `label`, so the collection lives in the
    /// step value instead.
    fn last_collection(&self) -> Option<&str> {
        self.steps.last().map(|step| match &step.value {
            StepValue::SeedCollection(collection) => collection.as_str(),
            _ => step.label.as_str(),
        })
    }

    // ---- start steps ----

    fn start(
        mut self,
        name: &'static str,
        kind: StepKind,
        result: ResultKind,
        label: String,
        ids: Option<Vec<String>>,
    ) -> Result<Self, TraversalError> {
        self.require(name, kind)?;
        self.steps.push(Step {
            kind,
            result,
            label,
            value: match ids {
                Some(ids) => StepValue::Ids(ids),
                None => StepValue::None,
            },
        });
        Ok(self)
    }

    /// Start at every vertex of `label`.
    pub fn v(self, label: impl Into<String>) -> Result<Self, TraversalError> {
        self.start("v", StepKind::Vertices, ResultKind::Vertex, label.into(), None)
    }

    /// Start at the vertices of `label` with the given id(s).
    pub fn v_ids(
        self,
        label: impl Into<String>,
        ids: impl Into<IdList>,
    ) -> Result<Self, TraversalError> {
        self.start(
            "v_ids",
            StepKind::Vertices,
            ResultKind::Vertex,
            label.into(),
            Some(ids.into().0),
        )
    }

    /// Start at every edge of the composite label.
    pub fn e(self, label: impl Into<String>) -> Result<Self, TraversalError> {
        self.start("e", StepKind::Edges, ResultKind::Edge, label.into(), None)
    }

    /// Start at the edges of the composite label with the given id(s).
    pub fn e_ids(
        self,
        label: impl Into<String>,
        ids: impl Into<IdList>,
    ) -> Result<Self, TraversalError> {
        self.start(
            "e_ids",
            StepKind::Edges,
            ResultKind::Edge,
            label.into(),
            Some(ids.into().0),
        )
    }

    // ---- navigation steps ----

    fn navigate(
        mut self,
        name: &'static str,
        kind: StepKind,
        result: ResultKind,
        label: String,
    ) -> Result<Self, TraversalError> {
        self.require(name, kind)?;
        self.steps.push(Step {
            kind,
            result,
            label,
            value: StepValue::None,
        });
        Ok(self)
    }

    /// Follow outgoing edges of the composite label to their target vertices.
    pub fn out(self, edge_label: impl Into<String>) -> Result<Self, TraversalError> {
        self.navigate("out", StepKind::Out, ResultKind::Vertex, edge_label.into())
    }

    /// Select the outgoing edges of the composite label.
    pub fn out_e(self, edge_label: impl Into<String>) -> Result<Self, TraversalError> {
        self.navigate("out_e", StepKind::OutE, ResultKind::Edge, edge_label.into())
    }

    /// Follow incoming edges of the composite label back to their source
    /// vertices.
    pub fn in_(self, edge_label: impl Into<String>) -> Result<Self, TraversalError> {
        self.navigate("in_", StepKind::In, ResultKind::Vertex, edge_label.into())
    }

    /// Select the incoming edges of the composite label.
    pub fn in_e(self, edge_label: impl Into<String>) -> Result<Self, TraversalError> {
        self.navigate("in_e", StepKind::InE, ResultKind::Edge, edge_label.into())
    }

    /// Move from edges to their source vertices. The vertex label is derived
    /// from the edge label's first component.
    pub fn out_v(self) -> Result<Self, TraversalError> {
        self.require("out_v", StepKind::OutV)?;
        let vertex_label = self.endpoint_label(true)?;
        self.navigate("out_v", StepKind::OutV, ResultKind::Vertex, vertex_label)
    }

    /// Move from edges to their target vertices. The vertex label is derived
    /// from the edge label's last component.
    pub fn in_v(self) -> Result<Self, TraversalError> {
        self.require("in_v", StepKind::InV)?;
        let vertex_label = self.endpoint_label(false)?;
        self.navigate("in_v", StepKind::InV, ResultKind::Vertex, vertex_label)
    }

    fn endpoint_label(&self, pick_source: bool) -> Result<String, TraversalError> {
        let edge_label = self.last_collection().unwrap_or_default();
        let (source, _, target) =
            split_edge_label(edge_label).ok_or_else(|| TraversalError::MalformedEdgeLabel {
                label: edge_label.to_string(),
            })?;
        Ok(if pick_source { source } else { target }.to_string())
    }

    // ---- filter steps ----

    /// Keep rows matching every `(field, condition)` pair. Literal conditions
    /// compare with equality; predicates render their own fragment.
    pub fn has<I, K>(mut self, conditions: I) -> Result<Self, TraversalError>
    where
        I: IntoIterator<Item = (K, HasValue)>,
        K: Into<String>,
    {
        self.require("has", StepKind::Has)?;
        let step = self.require_started("has")?;
        let (result, label) = (step.result, self.last_collection().unwrap_or_default().to_string());
        self.steps.push(Step {
            kind: StepKind::Has,
            result,
            label,
            value: StepValue::Conditions(
                conditions
                    .into_iter()
                    .map(|(field, condition)| (field.into(), condition))
                    .collect(),
            ),
        });
        Ok(self)
    }

    /// Keep rows whose id is in the given set.
    pub fn has_id(mut self, ids: impl Into<IdList>) -> Result<Self, TraversalError> {
        self.require("has_id", StepKind::HasId)?;
        let step = self.require_started("has_id")?;
        let (result, label) = (step.result, self.last_collection().unwrap_or_default().to_string());
        self.steps.push(Step {
            kind: StepKind::HasId,
            result,
            label,
            value: StepValue::Ids(ids.into().0),
        });
        Ok(self)
    }

    /// Keep rows for which the sub-traversal built by `sub` matches at least
    /// once. The closure receives a fresh chain seeded at the current
    /// position; the sub-chain compiles into a correlated sub-query and does
    /// not change the chain's result kind.
    pub fn where_<F>(mut self, sub: F) -> Result<Self, TraversalError>
    where
        F: Fn(Traversal) -> Result<Traversal, TraversalError> + Send + Sync + 'static,
    {
        self.require("where_", StepKind::Where)?;
        let step = self.require_started("where_")?;
        let (result, label) = (step.result, self.last_collection().unwrap_or_default().to_string());
        let sub: SubTraversalFn = Box::new(sub);
        self.steps.push(Step {
            kind: StepKind::Where,
            result,
            label,
            value: StepValue::SubTraversal(sub),
        });
        Ok(self)
    }

    // ---- terminal steps ----

    /// Compile without executing: the final SQL, the flat bound-value list,
    /// and the per-fragment breakdown.
    pub fn explain(self) -> Result<CompiledQuery, GraphError> {
        self.require_started("explain")?;
        Ok(postgres_query_generator::compile(self)?)
    }

    /// Execute and return every result row as-is.
    pub async fn value_map(self) -> Result<Vec<Row>, GraphError> {
        self.require_started("value_map")?;
        let executor = Arc::clone(&self.executor);
        let compiled = postgres_query_generator::compile(self)?;
        log::debug!(
            "executing traversal: {} fragment(s), {} bound value(s)",
            compiled.table_queries.len(),
            compiled.vars.len()
        );
        Ok(executor.execute(&compiled.query, &compiled.vars).await?)
    }

    /// Execute and return the result ids, in row order.
    pub async fn to_list(self) -> Result<Vec<String>, GraphError> {
        self.require_started("to_list")?;
        let rows = self.value_map().await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("uuid").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Execute and return de-duplicated result ids (first-seen order).
    pub async fn to_set(self) -> Result<Vec<String>, GraphError> {
        self.require_started("to_set")?;
        let ids = self.to_list().await?;
        let mut seen = HashSet::new();
        Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
    }

    /// Execute with path tracking and return, per row, the array of ids
    /// accumulated by the navigational steps.
    pub async fn path(mut self) -> Result<Vec<Value>, GraphError> {
        self.require_started("path")?;
        self.meta.has_path_step = true;
        let rows = self.value_map().await?;
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove("path").unwrap_or(Value::Null))
            .collect())
    }

    /// Execute the compiled read, then update the given properties on every
    /// resulting row (protected system fields are dropped, `version` is
    /// incremented).
    pub async fn property(self, props: Row) -> Result<(), GraphError> {
        self.require_started("property")?;
        let executor = Arc::clone(&self.executor);
        let config = self.config;
        let compiled = postgres_query_generator::compile(self)?;
        let rows = executor.execute(&compiled.query, &compiled.vars).await?;
        let collection = final_collection(&compiled);
        let ids = row_ids(&rows);
        mutation::update_properties(executor.as_ref(), config, &collection, &ids, &props).await?;
        Ok(())
    }

    /// Execute the compiled read, then delete every resulting element,
    /// cascading through adjacency maps for vertices.
    #[allow(clippy::should_implement_trait)]
    pub async fn drop(self) -> Result<(), GraphError> {
        self.require_started("drop")?;
        let executor = Arc::clone(&self.executor);
        let config = self.config;
        let compiled = postgres_query_generator::compile(self)?;
        let rows = executor.execute(&compiled.query, &compiled.vars).await?;
        let collection = final_collection(&compiled);
        let is_vertex = collection.split("__").count() == 1;
        for id in row_ids(&rows) {
            if is_vertex {
                mutation::delete_vertex(executor.as_ref(), config, &collection, &id).await?;
            } else {
                mutation::delete_edge(executor.as_ref(), config, &collection, &id).await?;
            }
        }
        Ok(())
    }
}

fn final_collection(compiled: &CompiledQuery) -> String {
    compiled
        .table_queries
        .last()
        .map(|fragment| fragment.collection.clone())
        .unwrap_or_default()
}

fn row_ids(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get("uuid").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

//! The graph handle and the adjacency consistency layer.
//!
//! A [`Graph`] owns an [`Executor`] and a [`GraphConfig`]; traversals start
//! from it and mutations go through it. Vertex rows carry adjacency maps
//! (edge-label to array of edge uuids); edge rows carry endpoint references.
//! The mutation layer restores the adjacency invariant on every write.

pub mod ddl;
mod errors;
pub(crate) mod mutation;

use std::sync::Arc;

use crate::config::GraphConfig;
use crate::executor::{Executor, Row};
use crate::traversal::Traversal;

pub use errors::GraphError;

/// A direct endpoint pointer stored on edge rows. Distinct from the
/// adjacency maps on vertex rows even though both share the `in_e`/`out_e`
/// column names on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    pub label: String,
    pub uuid: String,
}

impl EndpointRef {
    pub fn new(label: impl Into<String>, uuid: impl Into<String>) -> Self {
        EndpointRef {
            label: label.into(),
            uuid: uuid.into(),
        }
    }
}

/// Entry point: traversals and mutations over one backing store.
#[derive(Clone)]
pub struct Graph {
    executor: Arc<dyn Executor>,
    config: GraphConfig,
}

impl Graph {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Graph::with_config(executor, GraphConfig::default())
    }

    pub fn with_config(executor: Arc<dyn Executor>, config: GraphConfig) -> Self {
        Graph { executor, config }
    }

    /// Start a new traversal chain.
    pub fn traversal(&self) -> Traversal {
        Traversal::new(Arc::clone(&self.executor), self.config)
    }

    /// Create the table for a vertex label if it does not exist.
    pub async fn create_vertex_table(
        &self,
        label: &str,
        columns: &[&str],
    ) -> Result<(), GraphError> {
        mutation::check_identifier(self.config, label)?;
        self.check_columns(columns)?;
        let sql = ddl::create_table_statement(label, columns);
        self.executor.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Create the table for an edge between two vertex labels if it does not
    /// exist.
    pub async fn create_edge_table(
        &self,
        edge_name: &str,
        from_label: &str,
        to_label: &str,
        columns: &[&str],
    ) -> Result<(), GraphError> {
        for part in [edge_name, from_label, to_label] {
            mutation::check_identifier(self.config, part)?;
        }
        self.check_columns(columns)?;
        let table = ddl::edge_table_name(from_label, edge_name, to_label);
        let sql = ddl::create_table_statement(&table, columns);
        self.executor.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Insert a vertex; see [`mutation::insert_vertex`].
    pub async fn add_vertex(&self, label: &str, props: Row) -> Result<Row, GraphError> {
        mutation::insert_vertex(self.executor.as_ref(), self.config, label, props).await
    }

    /// Insert an edge and patch both endpoint adjacency maps.
    pub async fn add_edge(
        &self,
        edge_name: &str,
        from: &EndpointRef,
        to: &EndpointRef,
        props: Row,
    ) -> Result<Row, GraphError> {
        mutation::insert_edge(self.executor.as_ref(), self.config, edge_name, from, to, props)
            .await
    }

    /// Update user properties on the rows of `label` with the given ids.
    pub async fn update_properties(
        &self,
        label: &str,
        ids: &[String],
        props: &Row,
    ) -> Result<(), GraphError> {
        mutation::update_properties(self.executor.as_ref(), self.config, label, ids, props).await
    }

    /// Cascading vertex delete; returns the number of edges removed.
    pub async fn delete_vertex(&self, label: &str, uuid: &str) -> Result<u64, GraphError> {
        mutation::delete_vertex(self.executor.as_ref(), self.config, label, uuid).await
    }

    /// Delete one edge and prune both endpoint adjacency entries.
    pub async fn delete_edge(&self, edge_label: &str, uuid: &str) -> Result<(), GraphError> {
        mutation::delete_edge(self.executor.as_ref(), self.config, edge_label, uuid).await
    }

    fn check_columns(&self, columns: &[&str]) -> Result<(), GraphError> {
        for declaration in columns {
            let column = declaration.split_whitespace().next().unwrap_or_default();
            mutation::check_identifier(self.config, column)?;
        }
        Ok(())
    }
}

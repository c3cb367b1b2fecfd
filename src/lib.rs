//! Postgraph - Gremlin-style graph traversals over PostgreSQL
//!
//! This crate provides a property-graph layer on ordinary Postgres tables through:
//! - A typed, fluent traversal builder (vertex/edge selection, adjacency
//!   navigation, filters, correlated sub-traversals)
//! - Compilation of a whole traversal into one parameterized `WITH` query
//!   executed in a single round trip
//! - Denormalized JSONB adjacency indexes kept consistent by the mutation layer
//!
//! Vertices live one table per label; edges live one table per composite label
//! `From__Edge__To`. Every row carries `uuid`, `in_e`, `out_e`, `version` and
//! timestamp columns next to the user-defined ones.

pub mod config;
pub mod executor;
pub mod graph;
pub mod postgres_query_generator;
pub mod traversal;

pub use config::GraphConfig;
pub use executor::{Executor, Row, StoreError};
pub use graph::{EndpointRef, Graph, GraphError};
pub use postgres_query_generator::{CompiledQuery, FragmentInfo};
pub use traversal::predicate::{self, HasValue, Predicate};
pub use traversal::{IdList, Traversal, TraversalError};

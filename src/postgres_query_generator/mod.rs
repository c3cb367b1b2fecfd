//! Lowers a recorded step chain into one parameterized Postgres statement.
//!
//! Each step becomes one named sub-query (two for the composite `out`/`in_`
//! steps); the final statement is a `WITH` chain ending in `SELECT *` from
//! the last fragment. Bound values live in a single flat list - every
//! placeholder anywhere in the statement, nested sub-compiles included, is a
//! literal positional index into that list.

mod compiler;
mod errors;
mod path;

pub use errors::CompileError;

pub(crate) use compiler::compile;

use serde_json::Value;

/// One named sub-query of a compiled traversal.
#[derive(Debug, Clone)]
pub struct FragmentInfo {
    /// Name unique within the compilation.
    pub name: String,
    /// Final SQL text with positional placeholders already baked in.
    pub sql: String,
    /// The bound values this fragment contributed, in placeholder order.
    pub binds: Vec<Value>,
    /// The vertex or edge label this fragment's rows belong to; the next
    /// step resolves adjacency-map keys and endpoint labels from it.
    pub collection: String,
}

/// The output of compiling one traversal.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// The complete statement: `WITH f1 AS (..), .. SELECT * FROM last`.
    pub query: String,
    /// The flat ordered bound-value list, one entry per placeholder.
    pub vars: Vec<Value>,
    /// Per-fragment `name AS (sql)` texts, in emission order.
    pub queries: Vec<String>,
    /// Per-fragment descriptors, in emission order.
    pub table_queries: Vec<FragmentInfo>,
}

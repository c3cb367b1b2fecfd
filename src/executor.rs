//! The consumed query-execution contract.
//!
//! Postgraph never owns a connection. Everything it runs goes through an
//! [`Executor`]: one parameterized statement in, ordered rows out. Pooling,
//! retries, timeouts and cancellation all belong to the implementation behind
//! the trait.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One result row: column name to JSON value, in select order.
pub type Row = serde_json::Map<String, Value>;

/// Opaque store failure. Callers are not expected to pattern-match on it;
/// the executor has already released whatever resource it held.
#[derive(Debug, Clone, Error)]
#[error("store error: {message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError {
            message: message.into(),
        }
    }
}

/// Executes `(sql, params)` against the backing store.
///
/// `params` are bound positionally: the value at index `k` answers the
/// placeholder `$k+1` in `sql`. Scalars bind as their SQL type, arrays as
/// Postgres arrays, objects as `jsonb`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError>;
}

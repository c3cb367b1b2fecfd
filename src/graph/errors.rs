use thiserror::Error;

use crate::executor::StoreError;
use crate::postgres_query_generator::CompileError;
use crate::traversal::TraversalError;

/// Top-level error surface of the crate.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Traversal(#[from] TraversalError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("'{0}' is not a valid SQL identifier (letters, digits and underscores; must not start with a digit)")]
    InvalidIdentifier(String),
    #[error("edge label '{0}' is not encoded as From__Edge__To")]
    MalformedEdgeLabel(String),
}

use thiserror::Error;

use crate::traversal::TraversalError;

/// Compilation failures. Detected before any SQL reaches the store.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot compile an empty traversal")]
    EmptyTraversal,
    #[error("edge label '{0}' is not encoded as From__Edge__To")]
    MalformedEdgeLabel(String),
    #[error("step '{0}' has no preceding fragment to select from")]
    MissingPredecessor(&'static str),
    #[error("sub-traversal failed to build: {0}")]
    SubTraversal(#[from] TraversalError),
}

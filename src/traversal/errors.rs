use thiserror::Error;

use super::step::ChainState;

/// Chain-build failures. Raised synchronously while steps are recorded;
/// nothing here ever reaches the database. The chain must be rebuilt.
#[derive(Debug, Clone, Error)]
pub enum TraversalError {
    #[error("step '{step}' is not legal from {state}")]
    IllegalStep {
        step: &'static str,
        state: ChainState,
    },
    #[error("start step '{step}' resets the traversal; it must be the first step")]
    StartNotFirst { step: &'static str },
    #[error("edge label '{label}' is not encoded as From__Edge__To")]
    MalformedEdgeLabel { label: String },
}

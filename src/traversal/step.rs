//! Step records and the result-type state machine.

use std::fmt;

use super::errors::TraversalError;
use super::predicate::HasValue;
use super::Traversal;

/// The element kind a step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Vertex,
    Edge,
}

/// The state a chain is in when the next step is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Empty,
    Vertex,
    Edge,
}

impl From<ResultKind> for ChainState {
    fn from(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Vertex => ChainState::Vertex,
            ResultKind::Edge => ChainState::Edge,
        }
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::Empty => write!(f, "an empty traversal"),
            ChainState::Vertex => write!(f, "a Vertex step"),
            ChainState::Edge => write!(f, "an Edge step"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Vertices,
    Edges,
    Out,
    OutE,
    OutV,
    In,
    InE,
    InV,
    Has,
    HasId,
    Where,
    /// Internal start of a `where_` sub-chain: selects from an enclosing
    /// fragment instead of a base table.
    Seed,
}

impl StepKind {
    /// Short token used in generated fragment names.
    pub(crate) fn token(self) -> &'static str {
        match self {
            StepKind::Vertices => "V",
            StepKind::Edges => "E",
            StepKind::Out => "out",
            StepKind::OutE => "outE",
            StepKind::OutV => "outV",
            StepKind::In => "in",
            StepKind::InE => "inE",
            StepKind::InV => "inV",
            StepKind::Has => "has",
            StepKind::HasId => "hasId",
            StepKind::Where => "where",
            StepKind::Seed => "seed",
        }
    }
}

/// Whether `kind` may be recorded while the chain is in `state`.
pub(crate) fn step_allowed(state: ChainState, kind: StepKind) -> bool {
    match state {
        ChainState::Empty => matches!(
            kind,
            StepKind::Vertices | StepKind::Edges | StepKind::Seed
        ),
        ChainState::Vertex => matches!(
            kind,
            StepKind::Out
                | StepKind::OutE
                | StepKind::In
                | StepKind::InE
                | StepKind::Has
                | StepKind::HasId
                | StepKind::Where
        ),
        ChainState::Edge => matches!(
            kind,
            StepKind::OutV
                | StepKind::InV
                | StepKind::Has
                | StepKind::HasId
                | StepKind::Where
        ),
    }
}

/// Split a composite edge label into `(source, edge, target)` components.
pub(crate) fn split_edge_label(label: &str) -> Option<(&str, &str, &str)> {
    let mut parts = label.split("__");
    let source = parts.next()?;
    let edge = parts.next()?;
    let target = parts.next()?;
    if parts.next().is_some() || source.is_empty() || edge.is_empty() || target.is_empty() {
        return None;
    }
    Some((source, edge, target))
}

/// Builds the rest of a `where_` sub-chain from a seeded traversal.
pub type SubTraversalFn =
    Box<dyn Fn(Traversal) -> Result<Traversal, TraversalError> + Send + Sync>;

/// Step-specific payload carried into compilation.
pub enum StepValue {
    None,
    /// Id filter for start steps and `has_id`.
    Ids(Vec<String>),
    /// Ordered field conditions for `has`.
    Conditions(Vec<(String, HasValue)>),
    /// Sub-chain builder for `where_`.
    SubTraversal(SubTraversalFn),
    /// Collection label carried by a seed step (its `label` field holds the
    /// enclosing fragment name instead).
    SeedCollection(String),
}

impl fmt::Debug for StepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepValue::None => write!(f, "None"),
            StepValue::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
            StepValue::Conditions(conditions) => {
                f.debug_tuple("Conditions").field(conditions).finish()
            }
            StepValue::SubTraversal(_) => write!(f, "SubTraversal(..)"),
            StepValue::SeedCollection(collection) => {
                f.debug_tuple("SeedCollection").field(collection).finish()
            }
        }
    }
}

/// One recorded traversal step. Appended by chain calls, consumed exactly
/// once by compilation.
#[derive(Debug)]
pub struct Step {
    pub kind: StepKind,
    pub result: ResultKind,
    pub label: String,
    pub value: StepValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_steps_only_from_empty() {
        assert!(step_allowed(ChainState::Empty, StepKind::Vertices));
        assert!(step_allowed(ChainState::Empty, StepKind::Edges));
        assert!(!step_allowed(ChainState::Vertex, StepKind::Vertices));
        assert!(!step_allowed(ChainState::Edge, StepKind::Edges));
    }

    #[test]
    fn test_vertex_navigation() {
        assert!(step_allowed(ChainState::Vertex, StepKind::Out));
        assert!(step_allowed(ChainState::Vertex, StepKind::InE));
        assert!(!step_allowed(ChainState::Vertex, StepKind::OutV));
        assert!(!step_allowed(ChainState::Vertex, StepKind::InV));
    }

    #[test]
    fn test_edge_navigation() {
        assert!(step_allowed(ChainState::Edge, StepKind::OutV));
        assert!(step_allowed(ChainState::Edge, StepKind::InV));
        assert!(!step_allowed(ChainState::Edge, StepKind::Out));
        assert!(!step_allowed(ChainState::Edge, StepKind::InE));
    }

    #[test]
    fn test_filters_from_either_element_kind() {
        for state in [ChainState::Vertex, ChainState::Edge] {
            assert!(step_allowed(state, StepKind::Has));
            assert!(step_allowed(state, StepKind::HasId));
            assert!(step_allowed(state, StepKind::Where));
        }
        assert!(!step_allowed(ChainState::Empty, StepKind::Has));
    }

    #[test]
    fn test_split_edge_label() {
        assert_eq!(
            split_edge_label("god__lives__location"),
            Some(("god", "lives", "location"))
        );
        assert_eq!(split_edge_label("god"), None);
        assert_eq!(split_edge_label("god__lives"), None);
        assert_eq!(split_edge_label("a__b__c__d"), None);
        assert_eq!(split_edge_label("__lives__location"), None);
    }
}

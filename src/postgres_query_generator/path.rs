//! The path-accumulator column.
//!
//! With path tracking on, the start fragment seeds a one-element jsonb array
//! and every later navigational fragment appends its own uuid; composite
//! steps carry the array unchanged through their intermediate edge fragment.
//! With tracking off, every fragment emits the same inert placeholder column
//! so all fragments keep a stable column shape.
//!
//! Sub-chains seeded by `where_` select `*` from an enclosing fragment that
//! may already expose a `path` column, so each seeded compile accumulates
//! under its own uniquely named column instead of re-declaring `path` and
//! making every later reference ambiguous.

const BLANK: &str = "'' AS blankcol";

pub(crate) struct PathColumns {
    enabled: bool,
    column: String,
}

impl PathColumns {
    pub(crate) fn new(enabled: bool) -> Self {
        PathColumns {
            enabled,
            column: "path".to_string(),
        }
    }

    /// Accumulate under `column` instead of `path`. Used by seeded sub-chain
    /// compiles, where tracking is always on.
    pub(crate) fn named(column: String) -> Self {
        PathColumns {
            enabled: true,
            column,
        }
    }

    /// Select-list entry for a start or seed fragment.
    pub(crate) fn seed(&self) -> String {
        if self.enabled {
            format!("jsonb_build_array(uuid) AS {}", self.column)
        } else {
            BLANK.to_string()
        }
    }

    /// Carry the predecessor's path through unchanged.
    pub(crate) fn carry(&self, prev: &str) -> String {
        if self.enabled {
            format!("{prev}.{}", self.column)
        } else {
            BLANK.to_string()
        }
    }

    /// Append the current fragment's uuid to the predecessor's path.
    pub(crate) fn extend(&self, prev: &str, current: &str) -> String {
        if self.enabled {
            format!(
                "{prev}.{col} || jsonb_build_array({current}.uuid) AS {col}",
                col = self.column
            )
        } else {
            BLANK.to_string()
        }
    }
}

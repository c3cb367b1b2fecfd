//! Predicate algebra for `has` filters.
//!
//! Every constructor pairs the value(s) to bind with a renderer that, given
//! the field name and the positional placeholder assigned by the compiler,
//! produces the SQL boolean fragment. Constructors are pure; nothing here
//! touches the store.

use serde_json::Value;
use std::fmt;

type RenderFn = Box<dyn Fn(&str, &str) -> String + Send + Sync>;

/// A comparison intent: one bindable value (scalar or array) plus the
/// fragment it renders to once the compiler assigns it a placeholder.
pub struct Predicate {
    value: Value,
    render: RenderFn,
}

impl Predicate {
    pub(crate) fn bind_value(&self) -> Value {
        self.value.clone()
    }

    /// Render the SQL boolean fragment for `field` against `placeholder`.
    pub(crate) fn fragment(&self, field: &str, placeholder: &str) -> String {
        (self.render)(field, placeholder)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// A `has` condition: either a literal (compared with equality) or an
/// explicit predicate.
#[derive(Debug)]
pub enum HasValue {
    Literal(Value),
    Predicate(Predicate),
}

impl HasValue {
    pub(crate) fn into_predicate(self) -> Predicate {
        match self {
            HasValue::Literal(value) => eq(value),
            HasValue::Predicate(predicate) => predicate,
        }
    }
}

impl From<Predicate> for HasValue {
    fn from(predicate: Predicate) -> Self {
        HasValue::Predicate(predicate)
    }
}

impl From<Value> for HasValue {
    fn from(value: Value) -> Self {
        HasValue::Literal(value)
    }
}

impl From<&str> for HasValue {
    fn from(value: &str) -> Self {
        HasValue::Literal(Value::from(value))
    }
}

impl From<String> for HasValue {
    fn from(value: String) -> Self {
        HasValue::Literal(Value::from(value))
    }
}

impl From<i64> for HasValue {
    fn from(value: i64) -> Self {
        HasValue::Literal(Value::from(value))
    }
}

impl From<i32> for HasValue {
    fn from(value: i32) -> Self {
        HasValue::Literal(Value::from(value))
    }
}

impl From<f64> for HasValue {
    fn from(value: f64) -> Self {
        HasValue::Literal(Value::from(value))
    }
}

impl From<bool> for HasValue {
    fn from(value: bool) -> Self {
        HasValue::Literal(Value::from(value))
    }
}

fn comparison(value: Value, operator: &'static str) -> Predicate {
    Predicate {
        value,
        render: Box::new(move |field, placeholder| format!("{field} {operator} {placeholder}")),
    }
}

pub fn eq(value: impl Into<Value>) -> Predicate {
    comparison(value.into(), "=")
}

pub fn neq(value: impl Into<Value>) -> Predicate {
    comparison(value.into(), "!=")
}

pub fn lt(value: impl Into<Value>) -> Predicate {
    comparison(value.into(), "<")
}

pub fn lte(value: impl Into<Value>) -> Predicate {
    comparison(value.into(), "<=")
}

pub fn gt(value: impl Into<Value>) -> Predicate {
    comparison(value.into(), ">")
}

pub fn gte(value: impl Into<Value>) -> Predicate {
    comparison(value.into(), ">=")
}

fn bounds(low: impl Into<Value>, high: impl Into<Value>) -> Value {
    Value::Array(vec![low.into(), high.into()])
}

/// Exclusive range: `low < field < high`.
///
/// The pair binds as one numeric array; the row value is lifted to jsonb so a
/// single placeholder covers both bounds.
pub fn inside(low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
    Predicate {
        value: bounds(low, high),
        render: Box::new(|field, ph| {
            format!(
                "(to_jsonb({field}) > to_jsonb({ph}::numeric[])->0 AND to_jsonb({field}) < to_jsonb({ph}::numeric[])->1)"
            )
        }),
    }
}

/// Complement of [`inside`]: `field < low OR field > high`.
pub fn outside(low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
    Predicate {
        value: bounds(low, high),
        render: Box::new(|field, ph| {
            format!(
                "(to_jsonb({field}) < to_jsonb({ph}::numeric[])->0 OR to_jsonb({field}) > to_jsonb({ph}::numeric[])->1)"
            )
        }),
    }
}

/// Inclusive-exclusive range: `low <= field < high`.
pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
    Predicate {
        value: bounds(low, high),
        render: Box::new(|field, ph| {
            format!(
                "(to_jsonb({field}) >= to_jsonb({ph}::numeric[])->0 AND to_jsonb({field}) < to_jsonb({ph}::numeric[])->1)"
            )
        }),
    }
}

/// The element cast for an array bind, inferred from the first element.
fn element_cast(values: &[Value]) -> &'static str {
    match values.first() {
        Some(Value::String(_)) => "text",
        _ => "numeric",
    }
}

/// Set membership: `field = ANY ($n::text[])` (or `numeric[]`).
pub fn within<V: Into<Value>>(values: Vec<V>) -> Predicate {
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    let cast = element_cast(&values);
    Predicate {
        value: Value::Array(values),
        render: Box::new(move |field, ph| format!("{field} = ANY ({ph}::{cast}[])")),
    }
}

/// Negated set membership.
pub fn without<V: Into<Value>>(values: Vec<V>) -> Predicate {
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    let cast = element_cast(&values);
    Predicate {
        value: Value::Array(values),
        render: Box::new(move |field, ph| format!("NOT ({field} = ANY ({ph}::{cast}[]))")),
    }
}

/// Escape hatch: bind the given value(s) and render the fragment yourself.
///
/// A single value binds as that scalar; several bind as one ordered array.
/// The renderer receives `(field, placeholder, bound value)` so it can branch
/// on arity or type.
pub fn custom<F>(values: Vec<Value>, fragment: F) -> Predicate
where
    F: Fn(&str, &str, &Value) -> String + Send + Sync + 'static,
{
    let value = if values.len() == 1 {
        values.into_iter().next().unwrap_or(Value::Null)
    } else {
        Value::Array(values)
    };
    let captured = value.clone();
    Predicate {
        value,
        render: Box::new(move |field, ph| fragment(field, ph, &captured)),
    }
}

//! # Query Capability
//!
//! The storage layer is consumed only through the [`Query`] trait. Its methods fall into
//! three disjoint groups:
//!
//! - **Builders** (`filter`, `includes`, `order`, `limit`, `offset`, `scope`, `distinct`,
//!   `reset`) take `&mut self`, return nothing and must not perform I/O. They describe an
//!   increasingly specific deferred query.
//! - **Materializers** (`load`, `first`, `last`, `find`, `find_by`, `nth`, `nth_back`) execute
//!   the pending query once and return raw resources.
//! - **Inspection** (`count`, `exists`, `ids`, `aggregate`, `to_query_text`, `is_loaded`)
//!   execute the query and return scalars unrelated to row shape.
//!
//! The single-row materializers have default implementations on top of `load`, so a storage
//! adapter only needs to override them when it can do better.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Comparison applied by one [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

impl Op {
    fn symbol(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::NotEq => "<>",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::In => "IN",
            Op::IsNull => "IS NULL",
        }
    }
}

/// `field <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Op::Eq, value)
    }

    /// Evaluates the condition against a field value (`None` when the field is unknown).
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let actual = actual.unwrap_or(&Value::Null);
        match self.op {
            Op::Eq => actual == &self.value,
            Op::NotEq => actual != &self.value,
            Op::Gt => compare_values(actual, &self.value) == Ordering::Greater,
            Op::Gte => compare_values(actual, &self.value) != Ordering::Less,
            Op::Lt => compare_values(actual, &self.value) == Ordering::Less,
            Op::Lte => compare_values(actual, &self.value) != Ordering::Greater,
            Op::In => match &self.value {
                Value::Array(candidates) => candidates.contains(actual),
                single => single == actual,
            },
            Op::IsNull => actual.is_null(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Op::IsNull => write!(f, "{} IS NULL", self.field),
            op => write!(f, "{} {} {}", self.field, op.symbol(), self.value),
        }
    }
}

/// A conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.0.push(condition);
        self
    }

    /// Equality conditions from a mapping. A JSON array value means "any of".
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self(
            map.iter()
                .map(|(field, value)| match value {
                    Value::Array(_) => Condition::new(field.clone(), Op::In, value.clone()),
                    Value::Null => Condition::new(field.clone(), Op::IsNull, Value::Null),
                    _ => Condition::eq(field.clone(), value.clone()),
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }
}

impl From<Condition> for Conditions {
    fn from(condition: Condition) -> Self {
        Self(vec![condition])
    }
}

impl Extend<Condition> for Conditions {
    fn extend<I: IntoIterator<Item = Condition>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

/// One ordering term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Parses an order clause such as `"name desc, id"`. Blank input yields no terms.
    pub fn parse_list(clause: &str) -> Vec<OrderBy> {
        clause
            .split(',')
            .filter_map(|term| {
                let mut words = term.split_whitespace();
                let field = words.next()?;
                let direction = match words.next() {
                    Some(dir) if dir.eq_ignore_ascii_case("desc") => Direction::Desc,
                    _ => Direction::Asc,
                };
                Some(OrderBy {
                    field: field.to_string(),
                    direction,
                })
            })
            .collect()
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Asc => write!(f, "{} ASC", self.field),
            Direction::Desc => write!(f, "{} DESC", self.field),
        }
    }
}

/// Aggregate functions available as inspection operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Maximum,
    Minimum,
    Sum,
}

/// Total order over JSON values used for sorting and range comparisons:
/// null < bool < number < string < array < object.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => rank(left).cmp(&rank(right)),
    }
}

/// A deferred query over resources of type `R`.
///
/// Implementations are value-like handles: cloning a query clones its pending operator
/// chain, never the rows.
pub trait Query<R>: Clone + 'static {
    // --- Builders (no I/O) ---

    fn filter(&mut self, conditions: Conditions);

    /// Records relations the caller intends to traverse, so storage can preload them.
    fn includes(&mut self, relations: &[String]);

    fn order(&mut self, order: &[OrderBy]);

    fn limit(&mut self, limit: usize);

    fn offset(&mut self, offset: usize);

    /// Applies a named scope defined by the storage layer. Unknown scopes are reported
    /// when the query executes.
    fn scope(&mut self, name: &str);

    fn distinct(&mut self);

    /// Forgets any loaded rows so the next materializer reads fresh data.
    fn reset(&mut self);

    // --- Materializers (one execution each) ---

    fn load(&self) -> Result<Vec<R>, QueryError>;

    fn first(&self) -> Result<Option<R>, QueryError> {
        Ok(self.load()?.into_iter().next())
    }

    fn last(&self) -> Result<Option<R>, QueryError> {
        Ok(self.load()?.into_iter().last())
    }

    fn nth(&self, index: usize) -> Result<Option<R>, QueryError> {
        Ok(self.load()?.into_iter().nth(index))
    }

    /// The `index`-th row counting from the end (0 is the last row).
    fn nth_back(&self, index: usize) -> Result<Option<R>, QueryError> {
        Ok(self.load()?.into_iter().rev().nth(index))
    }

    fn find(&self, key: &Value) -> Result<Option<R>, QueryError>;

    fn find_by(&self, conditions: Conditions) -> Result<Option<R>, QueryError> {
        let mut narrowed = self.clone();
        narrowed.filter(conditions);
        narrowed.first()
    }

    // --- Inspection (no serialization) ---

    fn count(&self) -> Result<usize, QueryError>;

    fn exists(&self) -> Result<bool, QueryError> {
        Ok(self.count()? > 0)
    }

    fn ids(&self) -> Result<Vec<Value>, QueryError>;

    fn aggregate(&self, function: Aggregate, field: &str) -> Result<Option<Value>, QueryError>;

    /// Human readable description of the pending query.
    fn to_query_text(&self) -> String;

    fn is_loaded(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_order_clause() {
        assert_eq!(
            OrderBy::parse_list("name desc, id"),
            vec![OrderBy::desc("name"), OrderBy::asc("id")]
        );
        assert!(OrderBy::parse_list("  ").is_empty());
    }

    #[test]
    fn test_conditions_from_map() {
        let map = json!({ "status": "active", "id": [1, 2], "deleted_at": null });
        let conditions = Conditions::from_map(map.as_object().unwrap());
        let rendered: Vec<String> = conditions.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["status = \"active\"", "id IN [1,2]", "deleted_at IS NULL"]
        );
    }

    #[test]
    fn test_condition_matching() {
        assert!(Condition::new("total", Op::Gt, 10).matches(Some(&json!(12.5))));
        assert!(!Condition::new("total", Op::Lte, 10).matches(Some(&json!(12.5))));
        assert!(Condition::new("id", Op::In, json!([1, 3])).matches(Some(&json!(3))));
        assert!(Condition::new("email", Op::IsNull, Value::Null).matches(None));
    }

    #[test]
    fn test_compare_values_orders_mixed_types() {
        let mut values = vec![json!("b"), json!(2), Value::Null, json!("a"), json!(1.5)];
        values.sort_by(compare_values);
        assert_eq!(values, vec![Value::Null, json!(1.5), json!(2), json!("a"), json!("b")]);
    }
}

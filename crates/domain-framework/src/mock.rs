//! # In-Memory Queries & Testing Guide
//!
//! [`MemoryQuery<R>`] implements the [`Query`] trait over rows held in memory. It backs the
//! sample application's tables and is the quickest way to test serializers, relations and
//! commands without a database.
//!
//! ## Counting executions
//!
//! Every query carries a [`QueryStats`] handle. Each time the pending query runs against its
//! source (a load, a count, an aggregate...) the counter goes up by one. Builders never touch
//! it, which makes laziness observable:
//!
//! ```rust
//! use domain_framework::mock::MemoryQuery;
//! use domain_framework::{Query, Resource};
//! use serde_json::{json, Value};
//!
//! #[derive(Debug, Clone)]
//! struct Tag { id: u32, label: &'static str }
//!
//! impl Resource for Tag {
//!     fn model_name(&self) -> &'static str { "Tag" }
//!     fn key(&self) -> Option<Value> { Some(json!(self.id)) }
//!     fn read(&self, attribute: &str) -> Option<Value> {
//!         match attribute {
//!             "id" => Some(json!(self.id)),
//!             "label" => Some(json!(self.label)),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let tags = vec![Tag { id: 1, label: "red" }, Tag { id: 2, label: "blue" }];
//! let query = MemoryQuery::new("tags", tags).where_eq("label", "blue");
//! assert_eq!(query.stats().executions(), 0);
//!
//! assert_eq!(query.count().unwrap(), 1);
//! assert_eq!(query.stats().executions(), 1);
//! ```
//!
//! ## Scopes
//!
//! Named scopes are registered with [`MemoryQuery::with_scope`] as plain conditions. Asking
//! for an unknown scope is not an error until the query executes, where it surfaces as
//! [`QueryError::UnknownScope`].

use crate::error::QueryError;
use crate::query::{compare_values, Aggregate, Condition, Conditions, Direction, OrderBy, Query};
use crate::resource::Resource;
use serde_json::{Number, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Shared execution counter.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    executions: Arc<AtomicUsize>,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.executions.store(0, Ordering::SeqCst);
    }

    fn record(&self) {
        self.executions.fetch_add(1, Ordering::SeqCst);
    }
}

type Source<R> = Arc<dyn Fn() -> Result<Vec<R>, QueryError> + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Pending {
    conditions: Conditions,
    scopes: Vec<String>,
    includes: Vec<String>,
    order: Vec<OrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
    distinct: bool,
}

/// A deferred query over rows produced by a source closure.
pub struct MemoryQuery<R> {
    table: &'static str,
    source: Source<R>,
    scopes: Arc<HashMap<String, Conditions>>,
    pending: Pending,
    loaded: Arc<OnceLock<Vec<R>>>,
    stats: QueryStats,
}

impl<R> Clone for MemoryQuery<R> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            source: Arc::clone(&self.source),
            scopes: Arc::clone(&self.scopes),
            pending: self.pending.clone(),
            loaded: Arc::clone(&self.loaded),
            stats: self.stats.clone(),
        }
    }
}

impl<R> fmt::Debug for MemoryQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("table", &self.table)
            .field("pending", &self.pending)
            .finish()
    }
}

impl<R: Resource + Clone> MemoryQuery<R> {
    /// A query over a fixed set of rows.
    pub fn new(table: &'static str, rows: Vec<R>) -> Self {
        let rows = Arc::new(rows);
        Self::from_source(table, move || Ok(rows.as_ref().clone()))
    }

    /// A query whose rows are read from `source` on every execution.
    pub fn from_source<F>(table: &'static str, source: F) -> Self
    where
        F: Fn() -> Result<Vec<R>, QueryError> + Send + Sync + 'static,
    {
        Self {
            table,
            source: Arc::new(source),
            scopes: Arc::new(HashMap::new()),
            pending: Pending::default(),
            loaded: Arc::new(OnceLock::new()),
            stats: QueryStats::new(),
        }
    }

    pub fn with_scope(mut self, name: &str, conditions: Conditions) -> Self {
        Arc::make_mut(&mut self.scopes).insert(name.to_string(), conditions);
        self
    }

    /// Shares an existing counter, e.g. one owned by a table.
    pub fn with_stats(mut self, stats: QueryStats) -> Self {
        self.stats = stats;
        self
    }

    /// Builder-style equality filter.
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Condition::eq(field, value).into());
        self
    }

    pub fn stats(&self) -> QueryStats {
        self.stats.clone()
    }

    /// Relations requested through `includes`, in request order.
    pub fn included(&self) -> &[String] {
        &self.pending.includes
    }

    fn unload(&mut self) {
        self.loaded = Arc::new(OnceLock::new());
    }

    fn conditions(&self) -> Result<Vec<&Condition>, QueryError> {
        let mut conditions: Vec<&Condition> = self.pending.conditions.iter().collect();
        for name in &self.pending.scopes {
            let scope = self
                .scopes
                .get(name)
                .ok_or_else(|| QueryError::UnknownScope(name.clone()))?;
            conditions.extend(scope.iter());
        }
        Ok(conditions)
    }

    /// Filters and orders, without offset or limit.
    fn matching(&self) -> Result<Vec<R>, QueryError> {
        let conditions = self.conditions()?;
        self.stats.record();
        let mut rows = (self.source)()?;
        rows.retain(|row| {
            conditions
                .iter()
                .all(|condition| condition.matches(row.read(&condition.field).as_ref()))
        });
        if !self.pending.order.is_empty() {
            rows.sort_by(|a, b| {
                self.pending
                    .order
                    .iter()
                    .map(|term| {
                        let ordering = compare_values(
                            &a.read(&term.field).unwrap_or(Value::Null),
                            &b.read(&term.field).unwrap_or(Value::Null),
                        );
                        match term.direction {
                            Direction::Asc => ordering,
                            Direction::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        if self.pending.distinct {
            let mut seen = HashSet::new();
            rows.retain(|row| seen.insert(row.key().map(|key| key.to_string())));
        }
        Ok(rows)
    }

    fn execute(&self) -> Result<Vec<R>, QueryError> {
        let rows = self.matching()?;
        let offset = self.pending.offset.unwrap_or(0);
        let limit = self.pending.limit.unwrap_or(usize::MAX);
        if !self.pending.includes.is_empty() {
            debug!(table = self.table, relations = ?self.pending.includes, "Preloading relations");
        }
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

/// Integer sums stay integers until they overflow, then the float total is returned.
fn sum(values: &[Value]) -> Option<Value> {
    if values.iter().all(|value| value.is_i64()) {
        let total = values
            .iter()
            .filter_map(Value::as_i64)
            .try_fold(0i64, i64::checked_add);
        if let Some(total) = total {
            return Some(Value::from(total));
        }
    }
    let total: f64 = values.iter().filter_map(Value::as_f64).sum();
    Number::from_f64(total).map(Value::Number)
}

impl<R: Resource + Clone> Query<R> for MemoryQuery<R> {
    fn filter(&mut self, conditions: Conditions) {
        self.pending.conditions.extend(conditions.iter().cloned());
        self.unload();
    }

    fn includes(&mut self, relations: &[String]) {
        self.pending.includes.extend(relations.iter().cloned());
    }

    fn order(&mut self, order: &[OrderBy]) {
        self.pending.order.extend(order.iter().cloned());
        self.unload();
    }

    fn limit(&mut self, limit: usize) {
        self.pending.limit = Some(limit);
        self.unload();
    }

    fn offset(&mut self, offset: usize) {
        self.pending.offset = Some(offset);
        self.unload();
    }

    fn scope(&mut self, name: &str) {
        self.pending.scopes.push(name.to_string());
        self.unload();
    }

    fn distinct(&mut self) {
        self.pending.distinct = true;
        self.unload();
    }

    fn reset(&mut self) {
        self.unload();
    }

    fn load(&self) -> Result<Vec<R>, QueryError> {
        if let Some(rows) = self.loaded.get() {
            return Ok(rows.clone());
        }
        let rows = self.execute()?;
        let _ = self.loaded.set(rows.clone());
        Ok(rows)
    }

    fn find(&self, key: &Value) -> Result<Option<R>, QueryError> {
        Ok(self
            .execute()?
            .into_iter()
            .find(|row| row.key().as_ref() == Some(key)))
    }

    fn count(&self) -> Result<usize, QueryError> {
        Ok(self.execute()?.len())
    }

    fn ids(&self) -> Result<Vec<Value>, QueryError> {
        Ok(self.execute()?.iter().filter_map(Resource::key).collect())
    }

    fn aggregate(&self, function: Aggregate, field: &str) -> Result<Option<Value>, QueryError> {
        let values: Vec<Value> = self
            .execute()?
            .iter()
            .filter_map(|row| row.read(field))
            .filter(|value| !value.is_null())
            .collect();
        if values.is_empty() {
            return Ok(None);
        }
        Ok(match function {
            Aggregate::Maximum => values.into_iter().max_by(compare_values),
            Aggregate::Minimum => values.into_iter().min_by(compare_values),
            Aggregate::Sum => sum(&values),
        })
    }

    fn to_query_text(&self) -> String {
        let distinct = if self.pending.distinct { " DISTINCT" } else { "" };
        let mut text = format!("SELECT{distinct} * FROM {}", self.table);
        let mut clauses: Vec<String> = self
            .pending
            .conditions
            .iter()
            .map(ToString::to_string)
            .collect();
        for name in &self.pending.scopes {
            match self.scopes.get(name) {
                Some(scope) => clauses.extend(scope.iter().map(ToString::to_string)),
                None => clauses.push(format!("/* unknown scope {name} */")),
            }
        }
        if !clauses.is_empty() {
            text.push_str(" WHERE ");
            text.push_str(&clauses.join(" AND "));
        }
        if !self.pending.order.is_empty() {
            let terms: Vec<String> = self.pending.order.iter().map(ToString::to_string).collect();
            text.push_str(" ORDER BY ");
            text.push_str(&terms.join(", "));
        }
        if let Some(limit) = self.pending.limit {
            text.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.pending.offset {
            text.push_str(&format!(" OFFSET {offset}"));
        }
        text
    }

    fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Op;
    use serde_json::json;

    #[derive(Debug, Clone)]
    struct Row {
        id: u32,
        group: &'static str,
        score: f64,
    }

    impl Resource for Row {
        fn model_name(&self) -> &'static str {
            "Row"
        }

        fn key(&self) -> Option<Value> {
            Some(json!(self.id))
        }

        fn read(&self, attribute: &str) -> Option<Value> {
            match attribute {
                "id" => Some(json!(self.id)),
                "group" => Some(json!(self.group)),
                "score" => Some(json!(self.score)),
                _ => None,
            }
        }
    }

    fn query() -> MemoryQuery<Row> {
        MemoryQuery::new(
            "rows",
            vec![
                Row { id: 1, group: "a", score: 2.5 },
                Row { id: 2, group: "b", score: 1.0 },
                Row { id: 3, group: "a", score: 4.0 },
                Row { id: 4, group: "b", score: 3.5 },
            ],
        )
        .with_scope("top", Conditions::from(Condition::new("score", Op::Gte, 3)))
    }

    #[test]
    fn test_order_limit_offset() {
        let mut q = query();
        q.order(&OrderBy::parse_list("group desc, score"));
        q.offset(1);
        q.limit(2);
        let ids: Vec<u32> = q.load().unwrap().iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![4, 1]);
    }

    #[test]
    fn test_scopes_apply_on_execution() {
        let mut q = query();
        q.scope("top");
        assert_eq!(q.ids().unwrap(), vec![json!(3), json!(4)]);

        let mut unknown = query();
        unknown.scope("missing");
        assert_eq!(
            unknown.count(),
            Err(QueryError::UnknownScope("missing".into()))
        );
    }

    #[test]
    fn test_load_caches_until_builders_change_the_query() {
        let mut q = query();
        assert!(!q.is_loaded());
        q.load().unwrap();
        q.load().unwrap();
        assert!(q.is_loaded());
        assert_eq!(q.stats().executions(), 1);

        q.filter(Condition::eq("group", "a").into());
        assert!(!q.is_loaded());
        assert_eq!(q.load().unwrap().len(), 2);
        assert_eq!(q.stats().executions(), 2);
    }

    #[test]
    fn test_aggregates() {
        let q = query();
        assert_eq!(q.aggregate(Aggregate::Sum, "score").unwrap(), Some(json!(11.0)));
        assert_eq!(q.aggregate(Aggregate::Maximum, "score").unwrap(), Some(json!(4.0)));
        assert_eq!(q.aggregate(Aggregate::Sum, "id").unwrap(), Some(json!(10)));
        assert_eq!(q.aggregate(Aggregate::Minimum, "missing").unwrap(), None);
    }

    #[test]
    fn test_integer_sum_overflow_falls_back_to_float() {
        let total = sum(&[json!(i64::MAX), json!(1)]).unwrap();
        assert!(total.is_f64());
        assert_eq!(total.as_f64(), Some(i64::MAX as f64 + 1.0));
        assert_eq!(sum(&[json!(-3), json!(5)]), Some(json!(2)));
    }

    #[test]
    fn test_query_text() {
        let mut q = query().where_eq("group", "a");
        q.scope("top");
        q.order(&[OrderBy::desc("score")]);
        q.limit(5);
        assert_eq!(
            q.to_query_text(),
            "SELECT * FROM rows WHERE group = \"a\" AND score >= 3 ORDER BY score DESC LIMIT 5"
        );
    }
}

//! # Relations
//!
//! A [`Relation`] couples one live query handle with one serializer. It is the lazy proxy
//! handed out by `reference-many` accessors and by commands that return collections.
//!
//! Its methods fall into the same four disjoint groups as the underlying [`Query`]:
//!
//! - **Builders** consume and return the relation. They only extend the pending query and
//!   never execute anything.
//! - **Single materializers** execute once and return at most one [`View`].
//! - **Plural materializers** execute once and return every row as a [`View`], in query order.
//! - **Inspection** executes the query and returns scalars without serializing any row.
//!
//! `Relation` is not generic: the resource and query types are erased behind a private trait,
//! so views and results can carry relations of any model.

use crate::error::QueryError;
use crate::page::Page;
use crate::query::{Aggregate, Conditions, OrderBy, Query};
use crate::resource::Resource;
use crate::serializer::Serializer;
use crate::view::View;
use serde::ser::Error as _;
use serde::{Serialize, Serializer as SerdeSerializer};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Default page size used by [`Relation::paginate`] when `per` is zero.
pub const DEFAULT_PER_PAGE: usize = 25;

/// Number of rows rendered by `Debug` before eliding the rest.
const DEBUG_ROWS: usize = 10;

trait Rows: Send + Sync {
    fn clone_box(&self) -> Box<dyn Rows>;

    fn filter(&mut self, conditions: Conditions);
    fn includes(&mut self, relations: &[String]);
    fn order(&mut self, order: &[OrderBy]);
    fn limit(&mut self, limit: usize);
    fn offset(&mut self, offset: usize);
    fn scope(&mut self, name: &str);
    fn distinct(&mut self);
    fn reset(&mut self);

    fn load(&self) -> Result<Vec<View>, QueryError>;
    fn first(&self) -> Result<Option<View>, QueryError>;
    fn last(&self) -> Result<Option<View>, QueryError>;
    fn nth(&self, index: usize) -> Result<Option<View>, QueryError>;
    fn nth_back(&self, index: usize) -> Result<Option<View>, QueryError>;
    fn find(&self, key: &Value) -> Result<Option<View>, QueryError>;
    fn find_by(&self, conditions: Conditions) -> Result<Option<View>, QueryError>;

    fn count(&self) -> Result<usize, QueryError>;
    fn exists(&self) -> Result<bool, QueryError>;
    fn ids(&self) -> Result<Vec<Value>, QueryError>;
    fn aggregate(&self, function: Aggregate, field: &str) -> Result<Option<Value>, QueryError>;
    fn to_query_text(&self) -> String;
    fn is_loaded(&self) -> bool;
    fn serializer_name(&self) -> &'static str;
}

struct Bound<R, Q> {
    query: Q,
    serializer: Serializer<R>,
}

impl<R, Q> Bound<R, Q>
where
    R: Resource,
    Q: Query<R> + Send + Sync,
{
    fn view(&self, row: Option<R>) -> Option<View> {
        row.map(|resource| self.serializer.serialize(resource))
    }
}

impl<R, Q> Rows for Bound<R, Q>
where
    R: Resource,
    Q: Query<R> + Send + Sync,
{
    fn clone_box(&self) -> Box<dyn Rows> {
        Box::new(Bound {
            query: self.query.clone(),
            serializer: self.serializer.clone(),
        })
    }

    fn filter(&mut self, conditions: Conditions) {
        self.query.filter(conditions);
    }

    fn includes(&mut self, relations: &[String]) {
        self.query.includes(relations);
    }

    fn order(&mut self, order: &[OrderBy]) {
        self.query.order(order);
    }

    fn limit(&mut self, limit: usize) {
        self.query.limit(limit);
    }

    fn offset(&mut self, offset: usize) {
        self.query.offset(offset);
    }

    fn scope(&mut self, name: &str) {
        self.query.scope(name);
    }

    fn distinct(&mut self) {
        self.query.distinct();
    }

    fn reset(&mut self) {
        self.query.reset();
    }

    fn load(&self) -> Result<Vec<View>, QueryError> {
        Ok(self
            .query
            .load()?
            .into_iter()
            .map(|resource| self.serializer.serialize(resource))
            .collect())
    }

    fn first(&self) -> Result<Option<View>, QueryError> {
        Ok(self.view(self.query.first()?))
    }

    fn last(&self) -> Result<Option<View>, QueryError> {
        Ok(self.view(self.query.last()?))
    }

    fn nth(&self, index: usize) -> Result<Option<View>, QueryError> {
        Ok(self.view(self.query.nth(index)?))
    }

    fn nth_back(&self, index: usize) -> Result<Option<View>, QueryError> {
        Ok(self.view(self.query.nth_back(index)?))
    }

    fn find(&self, key: &Value) -> Result<Option<View>, QueryError> {
        Ok(self.view(self.query.find(key)?))
    }

    fn find_by(&self, conditions: Conditions) -> Result<Option<View>, QueryError> {
        Ok(self.view(self.query.find_by(conditions)?))
    }

    fn count(&self) -> Result<usize, QueryError> {
        self.query.count()
    }

    fn exists(&self) -> Result<bool, QueryError> {
        self.query.exists()
    }

    fn ids(&self) -> Result<Vec<Value>, QueryError> {
        self.query.ids()
    }

    fn aggregate(&self, function: Aggregate, field: &str) -> Result<Option<Value>, QueryError> {
        self.query.aggregate(function, field)
    }

    fn to_query_text(&self) -> String {
        self.query.to_query_text()
    }

    fn is_loaded(&self) -> bool {
        self.query.is_loaded()
    }

    fn serializer_name(&self) -> &'static str {
        self.serializer.name()
    }
}

/// A lazy, serializing proxy over a query.
pub struct Relation {
    rows: Box<dyn Rows>,
}

impl Relation {
    pub fn new<R, Q>(query: Q, serializer: Serializer<R>) -> Self
    where
        R: Resource,
        Q: Query<R> + Send + Sync,
    {
        Self {
            rows: Box::new(Bound { query, serializer }),
        }
    }

    // --- Builders ---

    pub fn filter(mut self, conditions: impl Into<Conditions>) -> Self {
        self.rows.filter(conditions.into());
        self
    }

    pub fn includes(mut self, relations: &[&str]) -> Self {
        let relations: Vec<String> = relations.iter().map(|name| name.to_string()).collect();
        self.rows.includes(&relations);
        self
    }

    /// Appends ordering terms parsed from a clause such as `"name desc, id"`.
    pub fn order(mut self, clause: &str) -> Self {
        self.rows.order(&OrderBy::parse_list(clause));
        self
    }

    pub fn order_by(mut self, order: &[OrderBy]) -> Self {
        self.rows.order(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.rows.limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.rows.offset(offset);
        self
    }

    pub fn scope(mut self, name: &str) -> Self {
        self.rows.scope(name);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.rows.distinct();
        self
    }

    pub fn reset(mut self) -> Self {
        self.rows.reset();
        self
    }

    // --- Single materializers ---

    pub fn first(&self) -> Result<Option<View>, QueryError> {
        self.rows.first()
    }

    pub fn last(&self) -> Result<Option<View>, QueryError> {
        self.rows.last()
    }

    pub fn find(&self, key: impl Into<Value>) -> Result<Option<View>, QueryError> {
        self.rows.find(&key.into())
    }

    pub fn find_by(&self, conditions: impl Into<Conditions>) -> Result<Option<View>, QueryError> {
        self.rows.find_by(conditions.into())
    }

    /// Zero-based positional access.
    pub fn nth(&self, index: usize) -> Result<Option<View>, QueryError> {
        self.rows.nth(index)
    }

    pub fn second(&self) -> Result<Option<View>, QueryError> {
        self.nth(1)
    }

    pub fn third(&self) -> Result<Option<View>, QueryError> {
        self.nth(2)
    }

    pub fn fourth(&self) -> Result<Option<View>, QueryError> {
        self.nth(3)
    }

    pub fn fifth(&self) -> Result<Option<View>, QueryError> {
        self.nth(4)
    }

    pub fn forty_two(&self) -> Result<Option<View>, QueryError> {
        self.nth(41)
    }

    pub fn second_to_last(&self) -> Result<Option<View>, QueryError> {
        self.rows.nth_back(1)
    }

    pub fn third_to_last(&self) -> Result<Option<View>, QueryError> {
        self.rows.nth_back(2)
    }

    // --- Plural materializers ---

    pub fn to_vec(&self) -> Result<Vec<View>, QueryError> {
        let views = self.rows.load()?;
        debug!(
            serializer = self.rows.serializer_name(),
            rows = views.len(),
            "Materialized relation"
        );
        Ok(views)
    }

    pub fn each<F>(&self, mut f: F) -> Result<(), QueryError>
    where
        F: FnMut(View),
    {
        for view in self.to_vec()? {
            f(view);
        }
        Ok(())
    }

    pub fn map<T, F>(&self, f: F) -> Result<Vec<T>, QueryError>
    where
        F: FnMut(View) -> T,
    {
        Ok(self.to_vec()?.into_iter().map(f).collect())
    }

    /// Executes once and hands the views to `f` in chunks of `size` (at least 1).
    pub fn each_batch<F>(&self, size: usize, mut f: F) -> Result<(), QueryError>
    where
        F: FnMut(Vec<View>),
    {
        let mut views = self.to_vec()?.into_iter().peekable();
        while views.peek().is_some() {
            f(views.by_ref().take(size.max(1)).collect());
        }
        Ok(())
    }

    // --- Inspection ---

    pub fn count(&self) -> Result<usize, QueryError> {
        self.rows.count()
    }

    pub fn size(&self) -> Result<usize, QueryError> {
        self.count()
    }

    pub fn exists(&self) -> Result<bool, QueryError> {
        self.rows.exists()
    }

    pub fn any(&self) -> Result<bool, QueryError> {
        self.exists()
    }

    pub fn none(&self) -> Result<bool, QueryError> {
        Ok(!self.exists()?)
    }

    pub fn is_empty(&self) -> Result<bool, QueryError> {
        self.none()
    }

    pub fn one(&self) -> Result<bool, QueryError> {
        Ok(self.count()? == 1)
    }

    pub fn many(&self) -> Result<bool, QueryError> {
        Ok(self.count()? > 1)
    }

    pub fn ids(&self) -> Result<Vec<Value>, QueryError> {
        self.rows.ids()
    }

    pub fn maximum(&self, field: &str) -> Result<Option<Value>, QueryError> {
        self.rows.aggregate(Aggregate::Maximum, field)
    }

    pub fn minimum(&self, field: &str) -> Result<Option<Value>, QueryError> {
        self.rows.aggregate(Aggregate::Minimum, field)
    }

    pub fn sum(&self, field: &str) -> Result<Option<Value>, QueryError> {
        self.rows.aggregate(Aggregate::Sum, field)
    }

    pub fn to_query_text(&self) -> String {
        self.rows.to_query_text()
    }

    pub fn is_loaded(&self) -> bool {
        self.rows.is_loaded()
    }

    // --- Pagination ---

    /// One page of views plus the pagination numbers. `page` is 1-based; `0` is read as `1`.
    pub fn paginate(&self, page: usize, per: usize) -> Result<Page, QueryError> {
        let page = page.max(1);
        let per = if per == 0 { DEFAULT_PER_PAGE } else { per };
        let total_count = self.count()?;
        let items = self
            .clone()
            .offset((page - 1).saturating_mul(per))
            .limit(per)
            .to_vec()?;
        Ok(Page::new(items, page, per, total_count))
    }
}

impl Clone for Relation {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone_box(),
        }
    }
}

struct Ellipsis;

impl fmt::Debug for Ellipsis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("...")
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relation<{}> ", self.rows.serializer_name())?;
        match self.rows.load() {
            Ok(views) => {
                let mut list = f.debug_list();
                list.entries(views.iter().take(DEBUG_ROWS));
                if views.len() > DEBUG_ROWS {
                    list.entry(&Ellipsis);
                }
                list.finish()
            }
            Err(error) => write!(f, "<{error}>"),
        }
    }
}

impl Serialize for Relation {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_vec()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryQuery;
    use crate::query::Condition;
    use serde_json::json;

    #[derive(Debug, Clone)]
    struct Item {
        id: u32,
        name: &'static str,
        price: i64,
    }

    impl Resource for Item {
        fn model_name(&self) -> &'static str {
            "Item"
        }

        fn key(&self) -> Option<Value> {
            Some(json!(self.id))
        }

        fn read(&self, attribute: &str) -> Option<Value> {
            match attribute {
                "id" => Some(json!(self.id)),
                "name" => Some(json!(self.name)),
                "price" => Some(json!(self.price)),
                _ => None,
            }
        }
    }

    fn items(count: u32) -> Vec<Item> {
        (1..=count)
            .map(|id| Item {
                id,
                name: if id % 2 == 0 { "even" } else { "odd" },
                price: i64::from(id) * 10,
            })
            .collect()
    }

    fn relation(count: u32) -> (Relation, MemoryQuery<Item>) {
        let query = MemoryQuery::new("items", items(count));
        let serializer = Serializer::<Item>::builder("ItemSerializer")
            .attribute("id")
            .attribute("name")
            .build()
            .unwrap();
        (Relation::new(query.clone(), serializer), query)
    }

    #[test]
    fn test_builders_do_not_execute() {
        let (relation, query) = relation(5);
        let relation = relation
            .filter(Condition::eq("name", "odd"))
            .order("id desc")
            .limit(2)
            .includes(&["tags"]);
        assert_eq!(query.stats().executions(), 0);
        assert!(!relation.is_loaded());

        let ids: Vec<Value> = relation.map(|view| view.get("id").cloned().unwrap()).unwrap();
        assert_eq!(ids, vec![json!(5), json!(3)]);
        assert_eq!(query.stats().executions(), 1);
    }

    #[test]
    fn test_positional_materializers() {
        let (relation, _) = relation(45);
        let id = |view: Option<View>| view.and_then(|v| v.get("id").cloned());
        assert_eq!(id(relation.first().unwrap()), Some(json!(1)));
        assert_eq!(id(relation.second().unwrap()), Some(json!(2)));
        assert_eq!(id(relation.fifth().unwrap()), Some(json!(5)));
        assert_eq!(id(relation.forty_two().unwrap()), Some(json!(42)));
        assert_eq!(id(relation.last().unwrap()), Some(json!(45)));
        assert_eq!(id(relation.second_to_last().unwrap()), Some(json!(44)));
        assert_eq!(id(relation.third_to_last().unwrap()), Some(json!(43)));
        assert_eq!(id(relation.find(7).unwrap()), Some(json!(7)));
        assert_eq!(relation.find(99).unwrap(), None);
    }

    #[test]
    fn test_inspection_does_not_serialize() {
        let (relation, _) = relation(4);
        assert_eq!(relation.count().unwrap(), 4);
        assert!(relation.many().unwrap());
        assert!(!relation.one().unwrap());
        assert_eq!(relation.maximum("price").unwrap(), Some(json!(40)));
        assert_eq!(relation.minimum("price").unwrap(), Some(json!(10)));
        assert_eq!(relation.sum("price").unwrap(), Some(json!(100)));
        assert_eq!(relation.ids().unwrap(), vec![json!(1), json!(2), json!(3), json!(4)]);

        let empty = relation.filter(Condition::eq("name", "none"));
        assert!(empty.none().unwrap());
        assert!(empty.is_empty().unwrap());
        assert_eq!(empty.maximum("price").unwrap(), None);
    }

    #[test]
    fn test_each_batch_executes_once() {
        let (relation, query) = relation(7);
        let mut sizes = Vec::new();
        relation.each_batch(3, |batch| sizes.push(batch.len())).unwrap();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(query.stats().executions(), 1);
    }

    #[test]
    fn test_paginate() {
        let (relation, _) = relation(12);
        let page = relation.order("id desc").paginate(2, 5).unwrap();
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_count, 12);
        assert_eq!(page.next_page, Some(3));
        assert!(!page.is_last_page);
        assert_eq!(page.items[0].get("id"), Some(&json!(7)));
    }

    #[test]
    fn test_paginate_past_the_end_is_empty() {
        let (relation, _) = relation(3);
        let page = relation.paginate(usize::MAX / 2, 25).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_count, 3);
        assert!(page.is_last_page);
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_debug_elides_after_ten_rows() {
        let (relation, _) = relation(12);
        let rendered = format!("{relation:?}");
        assert!(rendered.starts_with("Relation<ItemSerializer> ["));
        assert!(rendered.ends_with(", ...]"));
    }

    #[test]
    fn test_serialize_materializes_rows() {
        let (relation, _) = relation(2);
        assert_eq!(
            serde_json::to_value(&relation).unwrap(),
            json!([{ "id": 1, "name": "odd" }, { "id": 2, "name": "even" }])
        );
    }
}

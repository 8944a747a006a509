//! # Generic Commands
//!
//! Every model gets the same set of commands: find, add, update, remove, search, query and
//! transition. They are written once against [`Record`] and mounted per namespace with a
//! [`Mount`], which carries what differs between the backoffice and partner surfaces: the
//! namespace the command was defined under, whether it is internal, and the per-domain
//! serializers.
//!
//! | Command | Contract | Success value |
//! |---------|----------|---------------|
//! | [`Find`] | `id`, `limit?` | the resource |
//! | [`Add`] | the record's create contract | the stored resource |
//! | [`Update`] | `id` plus the record's update contract | the stored resource |
//! | [`Remove`] | `id` | `true` |
//! | [`Search`] | `query?`, `limit?`, `includes?`, `order?`, `page?`, `per?` | a [`Page`](domain_framework::Page) |
//! | [`QueryResources`] | `query?`, `limit?`, `includes?`, `order?` | a lazy [`Relation`] |
//! | [`Transition`] | `model_name`, `id`, `event`, `attrs?`, `limit?` | the resource |

mod commands;

pub use commands::{Add, Find, QueryResources, Remove, Search, Transition, Update};

use crate::store::{Record, StoreError, Table};
use domain_framework::mock::MemoryQuery;
use domain_framework::{
    Conditions, Context, DomainError, DomainKey, DomainSerializers, Fault, OrderBy, Params,
    Query, Relation, Serializer,
};

pub(crate) const NOT_FOUND: &str = "Not found";
pub(crate) const RESOURCE_NOT_FOUND: &str = "Resource not found";
pub(crate) const REVIEW_PROBLEMS: &str = "Please review the problems below:";
pub(crate) const UNABLE_TO_TRANSITION: &str = "Unable to transition";

/// Where a command is mounted: its namespace, its table and how it renders resources.
pub struct Mount<T> {
    namespace: &'static str,
    internal: bool,
    table: Table<T>,
    serializers: DomainSerializers<T>,
}

impl<T> Clone for Mount<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace,
            internal: self.internal,
            table: self.table.clone(),
            serializers: self.serializers.clone(),
        }
    }
}

impl<T: Record> Mount<T> {
    /// A mount callable from any domain.
    pub fn public(namespace: &'static str, table: Table<T>, serializers: DomainSerializers<T>) -> Self {
        Self {
            namespace,
            internal: false,
            table,
            serializers,
        }
    }

    /// A mount callable only from the domain owning `namespace`.
    pub fn internal(namespace: &'static str, table: Table<T>, serializers: DomainSerializers<T>) -> Self {
        Self {
            internal: true,
            ..Self::public(namespace, table, serializers)
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn table(&self) -> &Table<T> {
        &self.table
    }

    pub(crate) fn serializer(&self, domain: Option<&DomainKey>) -> Option<Serializer<T>> {
        Some(self.serializers.for_domain(domain))
    }

    /// A query over the table, narrowed by the optional `limit` hash of the params.
    pub(crate) fn limited_query(&self, params: &Params) -> Result<MemoryQuery<T>, Fault> {
        let mut query = self.table.query();
        let limit = params.object_or_empty("limit")?;
        if !limit.is_empty() {
            query.filter(Conditions::from_map(&limit));
        }
        Ok(query)
    }

    /// Looks a record up by the `id` param within the `limit` hash.
    pub(crate) fn find(&self, params: &Params) -> Result<Option<T>, Fault> {
        let id = params.integer("id")?;
        Ok(self.limited_query(params)?.find(&id.into())?)
    }

    /// A lazy relation shaped by the `query`, `limit`, `includes` and `order` params.
    pub(crate) fn relation(&self, ctx: &Context<'_, T>) -> Result<Relation, Fault> {
        let params = ctx.params();
        let mut relation = ctx.relation(self.limited_query(params)?)?;
        let conditions = params.object_or_empty("query")?;
        if !conditions.is_empty() {
            relation = relation.filter(Conditions::from_map(&conditions));
        }
        if params.contains_key("includes") {
            let includes: Vec<&str> = params
                .array("includes")?
                .iter()
                .filter_map(|name| name.as_str())
                .collect();
            relation = relation.includes(&includes);
        }
        if params.contains_key("order") {
            relation = relation.order_by(&OrderBy::parse_list(params.string("order")?));
        }
        Ok(relation)
    }
}

/// Turns a rejected write into the failure callers render, keeping other store errors as is.
///
/// Invalid saves and refused deletes both carry the record view so the caller can show it.
pub(crate) fn rejected<T: Record>(
    ctx: &Context<'_, T>,
    record: T,
    error: StoreError,
) -> Fault {
    match error {
        StoreError::Invalid { .. } | StoreError::Refused { .. } => match ctx.serialize(record) {
            Ok(view) => DomainError::rejected(REVIEW_PROBLEMS).with_data(view).into(),
            Err(e) => e.into(),
        },
        StoreError::NotFound { .. } => DomainError::not_found(RESOURCE_NOT_FOUND).into(),
        other => other.into(),
    }
}

/// Reads an id param as a table key. Ids that can't be keys can't match a row.
pub(crate) fn table_id(id: i64) -> Option<u32> {
    u32::try_from(id).ok()
}

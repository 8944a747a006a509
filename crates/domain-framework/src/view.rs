//! # Views
//!
//! A [`View`] is the immutable, read-only projection of one resource produced by a
//! [`Serializer`](crate::serializer::Serializer). There is a single view type for every
//! serializer; what differs is the field map and the set of reference resolvers it carries.
//!
//! - Scalar fields are computed once, when the view is built, and never change afterwards.
//! - References are resolved on every call to [`View::one`] / [`View::many`]. A
//!   `reference-one` fetches and serializes the related resource; a `reference-many` hands out
//!   a fresh lazy [`Relation`] without executing anything.
//!
//! Apart from its fields, a view exposes only the identity and validity of the wrapped
//! resource.

use crate::error::{QueryError, ViewError};
use crate::relation::Relation;
use crate::resource::Resource;
use crate::validator::FieldErrors;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub(crate) type FetchOne = Arc<dyn Fn() -> Result<Option<View>, QueryError> + Send + Sync>;
pub(crate) type FetchMany = Arc<dyn Fn() -> Relation + Send + Sync>;

/// How a reference is resolved once the view exists.
#[derive(Clone)]
pub(crate) enum Resolver {
    One {
        fetch: FetchOne,
        foreign_key: Option<Value>,
    },
    Many(FetchMany),
}

#[derive(Clone)]
pub(crate) struct Reference {
    pub(crate) name: String,
    pub(crate) resolver: Resolver,
}

impl Reference {
    fn kind(&self) -> &'static str {
        match self.resolver {
            Resolver::One { .. } => "one",
            Resolver::Many(_) => "many",
        }
    }
}

/// Read-only projection of a resource.
#[derive(Clone)]
pub struct View {
    model: &'static str,
    fields: Map<String, Value>,
    resource: Arc<dyn Resource>,
    references: Arc<[Reference]>,
}

impl View {
    pub(crate) fn build(
        resource: Arc<dyn Resource>,
        fields: Map<String, Value>,
        references: Vec<Reference>,
    ) -> Self {
        Self {
            model: resource.model_name(),
            fields,
            resource,
            references: references.into(),
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model
    }

    /// A scalar field. Dotted attributes are stored nested, so `get("contact")` returns the
    /// whole sub-mapping.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Follows a dotted path through nested mappings, e.g. `"contact.email"`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All scalar fields, in declaration order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn reference_names(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|reference| reference.name.as_str())
    }

    fn reference(&self, name: &str) -> Result<&Reference, ViewError> {
        self.references
            .iter()
            .find(|reference| reference.name == name)
            .ok_or_else(|| ViewError::UnknownReference {
                model: self.model,
                name: name.to_string(),
            })
    }

    /// Resolves a `reference-one`. Each call fetches again and builds a fresh view.
    pub fn one(&self, name: &str) -> Result<Option<View>, ViewError> {
        match &self.reference(name)?.resolver {
            Resolver::One { fetch, .. } => Ok(fetch()?),
            Resolver::Many(_) => Err(self.wrong_kind(name, "one")),
        }
    }

    /// Resolves a `reference-many` into a lazy relation. Nothing is executed here.
    pub fn many(&self, name: &str) -> Result<Relation, ViewError> {
        match &self.reference(name)?.resolver {
            Resolver::Many(fetch) => Ok(fetch()),
            Resolver::One { .. } => Err(self.wrong_kind(name, "many")),
        }
    }

    /// The key a `reference-one` points at, read without fetching the related resource.
    pub fn foreign_key(&self, name: &str) -> Result<Option<&Value>, ViewError> {
        match &self.reference(name)?.resolver {
            Resolver::One { foreign_key, .. } => Ok(foreign_key.as_ref()),
            Resolver::Many(_) => Err(self.wrong_kind(name, "one")),
        }
    }

    fn wrong_kind(&self, name: &str, expected: &'static str) -> ViewError {
        ViewError::WrongKind {
            model: self.model,
            name: name.to_string(),
            expected,
        }
    }

    pub fn key(&self) -> Option<Value> {
        self.resource.key()
    }

    /// The key rendered for URLs: strings as-is, other values as JSON.
    pub fn to_param(&self) -> Option<String> {
        self.key().map(|key| match key {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.resource.is_valid()
    }

    pub fn errors(&self) -> FieldErrors {
        self.resource.errors()
    }

    pub fn is_persisted(&self) -> bool {
        self.resource.is_persisted()
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.fields == other.fields && self.key() == other.key()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let references: Vec<String> = self
            .references
            .iter()
            .map(|reference| format!("{}({})", reference.name, reference.kind()))
            .collect();
        f.debug_struct(self.model)
            .field("key", &self.key())
            .field("fields", &self.fields)
            .field("references", &references)
            .finish()
    }
}

impl Serialize for View {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

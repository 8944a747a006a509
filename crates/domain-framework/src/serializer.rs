//! # Serializers
//!
//! A [`Serializer`] declares, per view type, which attributes are scalars and which are
//! references, and turns a resource into a [`View`].
//!
//! ```rust
//! use domain_framework::{Resource, Serializer};
//! use serde_json::{json, Value};
//!
//! #[derive(Debug)]
//! struct Contact { id: u32, email: String }
//!
//! impl Resource for Contact {
//!     fn model_name(&self) -> &'static str { "Contact" }
//!     fn key(&self) -> Option<Value> { Some(json!(self.id)) }
//!     fn read(&self, attribute: &str) -> Option<Value> {
//!         match attribute {
//!             "id" => Some(json!(self.id)),
//!             "email" => Some(json!(self.email)),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let serializer = Serializer::<Contact>::builder("ContactSerializer")
//!     .attribute("id")
//!     .attribute_from("details.email", "email")
//!     .attribute_if("email", |contact: &Contact| !contact.email.is_empty())
//!     .build()
//!     .unwrap();
//!
//! let view = serializer.serialize(Contact { id: 1, email: String::new() });
//! assert_eq!(view.to_json(), json!({ "id": 1, "details": { "email": "" } }));
//! assert!(!view.has_field("email"));
//! ```
//!
//! Declaration order is output order. The split into regular and reference attributes is
//! computed once, in [`SerializerBuilder::build`], and shared by every clone of the
//! serializer.

use crate::error::{QueryError, SerializerError};
use crate::query::Query;
use crate::registry::DomainKey;
use crate::relation::Relation;
use crate::resource::Resource;
use crate::view::{Reference, Resolver, View};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type ReadFn<R> = Arc<dyn Fn(&R) -> Value + Send + Sync>;
type Predicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;
type BindFn<R> = Arc<dyn Fn(&Arc<R>) -> Resolver + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Scalar,
    ReferenceOne,
    ReferenceMany,
}

enum Source<R> {
    Read,
    Computed(ReadFn<R>),
}

struct Attribute<R> {
    hash_attribute: String,
    resource_attribute: String,
    source: Source<R>,
    predicate: Option<Predicate<R>>,
}

impl<R: Resource> Attribute<R> {
    fn included(&self, resource: &R) -> bool {
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate(resource))
    }

    fn value(&self, resource: &R) -> Value {
        match &self.source {
            Source::Read => resource
                .read(&self.resource_attribute)
                .unwrap_or(Value::Null),
            Source::Computed(compute) => compute(resource),
        }
    }
}

struct ReferenceAttribute<R> {
    name: String,
    kind: AttributeKind,
    bind: BindFn<R>,
}

enum Declaration<R> {
    Scalar(Attribute<R>),
    Reference(ReferenceAttribute<R>),
}

impl<R> Declaration<R> {
    fn name(&self) -> &str {
        match self {
            Declaration::Scalar(attribute) => &attribute.hash_attribute,
            Declaration::Reference(reference) => &reference.name,
        }
    }

    fn kind(&self) -> AttributeKind {
        match self {
            Declaration::Scalar(_) => AttributeKind::Scalar,
            Declaration::Reference(reference) => reference.kind,
        }
    }
}

struct Inner<R> {
    name: &'static str,
    declared: Vec<(String, AttributeKind)>,
    regular: Vec<Attribute<R>>,
    references: Vec<ReferenceAttribute<R>>,
}

/// Converts resources of type `R` into [`View`]s. Cloning is cheap.
pub struct Serializer<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Serializer<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for Serializer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("name", &self.inner.name)
            .field("attributes", &self.inner.declared)
            .finish()
    }
}

impl<R: Resource> Serializer<R> {
    pub fn builder(name: &'static str) -> SerializerBuilder<R> {
        SerializerBuilder {
            name,
            declarations: Vec::new(),
            unattached_condition: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Declared attribute names and kinds, in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttributeKind)> {
        self.inner
            .declared
            .iter()
            .map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Builds a fresh view of the resource.
    pub fn serialize(&self, resource: impl Into<Arc<R>>) -> View {
        let resource = resource.into();
        let fields = self.fields(&resource, |_| true);
        self.view(resource, fields)
    }

    /// Like [`Serializer::serialize`], keeping only scalars whose source attribute has
    /// unsaved changes.
    pub fn serialize_changes(&self, resource: impl Into<Arc<R>>) -> View {
        let resource = resource.into();
        let fields = self.fields(&resource, |attribute| {
            resource.attribute_changed(&attribute.resource_attribute)
        });
        self.view(resource, fields)
    }

    fn fields(&self, resource: &R, keep: impl Fn(&Attribute<R>) -> bool) -> Map<String, Value> {
        let mut fields = Map::new();
        for attribute in &self.inner.regular {
            if !attribute.included(resource) || !keep(attribute) {
                continue;
            }
            insert_path(&mut fields, &attribute.hash_attribute, attribute.value(resource));
        }
        fields
    }

    fn view(&self, resource: Arc<R>, fields: Map<String, Value>) -> View {
        let references = self
            .inner
            .references
            .iter()
            .map(|reference| Reference {
                name: reference.name.clone(),
                resolver: (reference.bind)(&resource),
            })
            .collect();
        View::build(resource, fields, references)
    }
}

/// Stores `value` under a possibly dotted path, merging into existing nested mappings.
fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.rsplit('.');
    let leaf = segments.next().unwrap_or(path);
    let nested = segments.fold((leaf.to_string(), value), |(key, value), parent| {
        let mut wrapper = Map::new();
        wrapper.insert(key, value);
        (parent.to_string(), Value::Object(wrapper))
    });
    deep_merge(target, nested.0, nested.1);
}

fn deep_merge(target: &mut Map<String, Value>, key: String, value: Value) {
    match value {
        Value::Object(incoming) => {
            if let Some(Value::Object(existing)) = target.get_mut(&key) {
                for (child_key, child_value) in incoming {
                    deep_merge(existing, child_key, child_value);
                }
                return;
            }
            target.insert(key, Value::Object(incoming));
        }
        leaf => {
            target.insert(key, leaf);
        }
    }
}

/// Declares the attributes of a [`Serializer`].
pub struct SerializerBuilder<R> {
    name: &'static str,
    declarations: Vec<Declaration<R>>,
    unattached_condition: bool,
}

impl<R: Resource> SerializerBuilder<R> {
    fn scalar(mut self, attribute: Attribute<R>) -> Self {
        self.declarations.push(Declaration::Scalar(attribute));
        self
    }

    /// A scalar read from the resource attribute of the same name.
    pub fn attribute(self, name: &str) -> Self {
        self.attribute_from(name, name)
    }

    /// A scalar stored under `hash_attribute` (dotted names nest) and read from
    /// `resource_attribute`.
    pub fn attribute_from(self, hash_attribute: &str, resource_attribute: &str) -> Self {
        self.scalar(Attribute {
            hash_attribute: hash_attribute.to_string(),
            resource_attribute: resource_attribute.to_string(),
            source: Source::Read,
            predicate: None,
        })
    }

    /// A scalar computed by a closure.
    pub fn attribute_with<F>(self, name: &str, compute: F) -> Self
    where
        F: Fn(&R) -> Value + Send + Sync + 'static,
    {
        self.scalar(Attribute {
            hash_attribute: name.to_string(),
            resource_attribute: name.to_string(),
            source: Source::Computed(Arc::new(compute)),
            predicate: None,
        })
    }

    /// A scalar present only when `predicate` holds; otherwise the key is absent.
    pub fn attribute_if<P>(self, name: &str, predicate: P) -> Self
    where
        P: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.scalar(Attribute {
            hash_attribute: name.to_string(),
            resource_attribute: name.to_string(),
            source: Source::Read,
            predicate: Some(Arc::new(predicate)),
        })
    }

    /// Gates the scalar declared just before on `predicate`, whatever its source:
    ///
    /// ```ignore
    /// builder.attribute_from("contact.email", "email").only_if(|user| user.email_present())
    /// ```
    ///
    /// A reference, or nothing, before it makes [`SerializerBuilder::build`] fail.
    pub fn only_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&R) -> bool + Send + Sync + 'static,
    {
        match self.declarations.last_mut() {
            Some(Declaration::Scalar(attribute)) => {
                attribute.predicate = Some(Arc::new(predicate));
            }
            _ => self.unattached_condition = true,
        }
        self
    }

    /// A single related resource, fetched and serialized with `serializer` on each
    /// [`View::one`] call. The foreign key is read from `<name>_id`.
    pub fn references_one<T, F>(mut self, name: &str, fetch: F, serializer: Serializer<T>) -> Self
    where
        T: Resource,
        F: Fn(&R) -> Result<Option<T>, QueryError> + Send + Sync + 'static,
    {
        let fetch = Arc::new(fetch);
        let foreign_key = format!("{name}_id");
        let bind: BindFn<R> = Arc::new(move |resource: &Arc<R>| {
            let owner = Arc::clone(resource);
            let fetch = Arc::clone(&fetch);
            let serializer = serializer.clone();
            Resolver::One {
                foreign_key: resource.read(&foreign_key).filter(|key| !key.is_null()),
                fetch: Arc::new(move || {
                    Ok(fetch(&owner)?.map(|target| serializer.serialize(target)))
                }),
            }
        });
        self.declarations
            .push(Declaration::Reference(ReferenceAttribute {
                name: name.to_string(),
                kind: AttributeKind::ReferenceOne,
                bind,
            }));
        self
    }

    /// A related collection, exposed as a lazy [`Relation`] over the query built by `query`.
    pub fn references_many<T, Q, F>(mut self, name: &str, query: F, serializer: Serializer<T>) -> Self
    where
        T: Resource,
        Q: Query<T> + Send + Sync,
        F: Fn(&R) -> Q + Send + Sync + 'static,
    {
        let query = Arc::new(query);
        let bind: BindFn<R> = Arc::new(move |resource: &Arc<R>| {
            let owner = Arc::clone(resource);
            let query = Arc::clone(&query);
            let serializer = serializer.clone();
            Resolver::Many(Arc::new(move || {
                Relation::new(query(&owner), serializer.clone())
            }))
        });
        self.declarations
            .push(Declaration::Reference(ReferenceAttribute {
                name: name.to_string(),
                kind: AttributeKind::ReferenceMany,
                bind,
            }));
        self
    }

    /// Checks the declarations and splits them into regular and reference attributes.
    pub fn build(self) -> Result<Serializer<R>, SerializerError> {
        if self.unattached_condition {
            return Err(SerializerError::UnattachedCondition {
                serializer: self.name,
            });
        }
        let mut seen = HashSet::new();
        for declaration in &self.declarations {
            let name = declaration.name();
            if name.is_empty() || name.split('.').any(str::is_empty) {
                return Err(SerializerError::EmptyAttribute {
                    serializer: self.name,
                });
            }
            if !seen.insert(name.to_string()) {
                return Err(SerializerError::DuplicateAttribute {
                    serializer: self.name,
                    attribute: name.to_string(),
                });
            }
        }

        let declared = self
            .declarations
            .iter()
            .map(|declaration| (declaration.name().to_string(), declaration.kind()))
            .collect();
        let mut regular = Vec::new();
        let mut references = Vec::new();
        for declaration in self.declarations {
            match declaration {
                Declaration::Scalar(attribute) => regular.push(attribute),
                Declaration::Reference(reference) => references.push(reference),
            }
        }
        debug!(
            serializer = self.name,
            regular = regular.len(),
            references = references.len(),
            "Built serializer"
        );
        Ok(Serializer {
            inner: Arc::new(Inner {
                name: self.name,
                declared,
                regular,
                references,
            }),
        })
    }
}

/// Serializers chosen by calling domain, with a fallback for unlisted domains.
pub struct DomainSerializers<R> {
    fallback: Serializer<R>,
    by_domain: HashMap<DomainKey, Serializer<R>>,
}

impl<R> Clone for DomainSerializers<R> {
    fn clone(&self) -> Self {
        Self {
            fallback: self.fallback.clone(),
            by_domain: self.by_domain.clone(),
        }
    }
}

impl<R: Resource> DomainSerializers<R> {
    pub fn new(fallback: Serializer<R>) -> Self {
        Self {
            fallback,
            by_domain: HashMap::new(),
        }
    }

    pub fn with(mut self, domain: impl Into<DomainKey>, serializer: Serializer<R>) -> Self {
        self.by_domain.insert(domain.into(), serializer);
        self
    }

    pub fn for_domain(&self, domain: Option<&DomainKey>) -> Serializer<R> {
        domain
            .and_then(|key| self.by_domain.get(key))
            .unwrap_or(&self.fallback)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryQuery;
    use serde_json::json;

    #[derive(Debug, Clone)]
    struct Author {
        id: u32,
        name: String,
        email: String,
        mentor_id: Option<u32>,
        dirty: Vec<&'static str>,
    }

    impl Resource for Author {
        fn model_name(&self) -> &'static str {
            "Author"
        }

        fn key(&self) -> Option<Value> {
            Some(json!(self.id))
        }

        fn read(&self, attribute: &str) -> Option<Value> {
            match attribute {
                "id" => Some(json!(self.id)),
                "name" => Some(json!(self.name)),
                "email" => Some(json!(self.email)),
                "mentor_id" => Some(json!(self.mentor_id)),
                _ => None,
            }
        }

        fn attribute_changed(&self, attribute: &str) -> bool {
            self.dirty.contains(&attribute)
        }
    }

    fn author(id: u32, name: &str, email: &str) -> Author {
        Author {
            id,
            name: name.into(),
            email: email.into(),
            mentor_id: None,
            dirty: Vec::new(),
        }
    }

    fn plain() -> Serializer<Author> {
        Serializer::builder("AuthorSerializer")
            .attribute("id")
            .attribute("name")
            .build()
            .unwrap()
    }

    #[test]
    fn test_declaration_order_is_output_order() {
        let serializer = Serializer::<Author>::builder("AuthorSerializer")
            .attribute("name")
            .attribute("id")
            .attribute_with("initial", |a: &Author| json!(a.name.chars().next()))
            .build()
            .unwrap();
        for _ in 0..3 {
            let view = serializer.serialize(author(1, "Ada", "ada@example.com"));
            let keys: Vec<&String> = view.fields().keys().collect();
            assert_eq!(keys, ["name", "id", "initial"]);
        }
    }

    #[test]
    fn test_dotted_attributes_deep_merge() {
        let serializer = Serializer::<Author>::builder("AuthorSerializer")
            .attribute_from("contact.email", "email")
            .attribute_from("contact.name.full", "name")
            .attribute_from("contact.name.id", "id")
            .build()
            .unwrap();
        let view = serializer.serialize(author(4, "Ada", "ada@example.com"));
        assert_eq!(
            view.to_json(),
            json!({ "contact": { "email": "ada@example.com", "name": { "full": "Ada", "id": 4 } } })
        );
        assert_eq!(view.get_path("contact.name.full"), Some(&json!("Ada")));
    }

    #[test]
    fn test_unknown_attribute_reads_as_null() {
        let serializer = Serializer::<Author>::builder("AuthorSerializer")
            .attribute("nickname")
            .build()
            .unwrap();
        let view = serializer.serialize(author(1, "Ada", ""));
        assert_eq!(view.get("nickname"), Some(&Value::Null));
    }

    #[test]
    fn test_duplicate_and_empty_declarations_are_rejected() {
        let duplicate = Serializer::<Author>::builder("AuthorSerializer")
            .attribute("name")
            .attribute_from("name", "email")
            .build();
        assert_eq!(
            duplicate.unwrap_err(),
            SerializerError::DuplicateAttribute {
                serializer: "AuthorSerializer",
                attribute: "name".into()
            }
        );
        let empty = Serializer::<Author>::builder("AuthorSerializer")
            .attribute_from("contact.", "email")
            .build();
        assert!(matches!(empty, Err(SerializerError::EmptyAttribute { .. })));
    }

    #[test]
    fn test_only_if_gates_renamed_and_computed_scalars() {
        let serializer = Serializer::<Author>::builder("AuthorSerializer")
            .attribute("id")
            .attribute_from("contact.email", "email")
            .only_if(|a: &Author| !a.email.is_empty())
            .attribute_with("mentored", |a: &Author| json!(a.mentor_id.is_some()))
            .only_if(|a: &Author| a.mentor_id.is_some())
            .build()
            .unwrap();

        let mut mentored = author(1, "Ada", "ada@example.com");
        mentored.mentor_id = Some(2);
        assert_eq!(
            serializer.serialize(mentored).to_json(),
            json!({ "id": 1, "contact": { "email": "ada@example.com" }, "mentored": true })
        );
        assert_eq!(
            serializer.serialize(author(3, "Bob", "")).to_json(),
            json!({ "id": 3 })
        );

        let dangling = Serializer::<Author>::builder("AuthorSerializer")
            .only_if(|_: &Author| true)
            .attribute("id")
            .build();
        assert_eq!(
            dangling.unwrap_err(),
            SerializerError::UnattachedCondition {
                serializer: "AuthorSerializer"
            }
        );
    }

    #[test]
    fn test_serialize_changes_keeps_dirty_attributes_only() {
        let mut resource = author(1, "Ada", "ada@example.com");
        resource.dirty = vec!["email"];
        let view = plain().serialize_changes(resource);
        assert!(view.fields().is_empty());

        let serializer = Serializer::<Author>::builder("AuthorSerializer")
            .attribute("name")
            .attribute("email")
            .build()
            .unwrap();
        let mut resource = author(1, "Ada", "ada@example.com");
        resource.dirty = vec!["email"];
        assert_eq!(
            serializer.serialize_changes(resource).to_json(),
            json!({ "email": "ada@example.com" })
        );
    }

    #[test]
    fn test_references_resolve_through_nested_serializers() {
        let people = vec![
            author(1, "Grace", "grace@example.com"),
            Author {
                mentor_id: Some(1),
                ..author(2, "Ada", "ada@example.com")
            },
        ];
        let lookup = people.clone();
        let serializer = Serializer::<Author>::builder("AuthorSerializer")
            .attribute("name")
            .references_one(
                "mentor",
                move |a: &Author| {
                    Ok(a.mentor_id
                        .and_then(|id| lookup.iter().find(|p| p.id == id).cloned()))
                },
                plain(),
            )
            .references_many(
                "peers",
                {
                    let people = people.clone();
                    move |_: &Author| MemoryQuery::new("authors", people.clone())
                },
                plain(),
            )
            .build()
            .unwrap();

        let ada = serializer.serialize(people[1].clone());
        assert_eq!(ada.foreign_key("mentor").unwrap(), Some(&json!(1)));
        let mentor = ada.one("mentor").unwrap().expect("mentor exists");
        assert_eq!(mentor.get("name"), Some(&json!("Grace")));
        assert_eq!(ada.many("peers").unwrap().count().unwrap(), 2);

        let grace = serializer.serialize(people[0].clone());
        assert_eq!(grace.foreign_key("mentor").unwrap(), None);
        assert_eq!(grace.one("mentor").unwrap(), None);
        assert!(grace.many("mentor").is_err());
        assert!(grace.one("unknown").is_err());
    }

    #[test]
    fn test_domain_serializers_fall_back() {
        let partner = Serializer::<Author>::builder("PartnerAuthorSerializer")
            .attribute("name")
            .build()
            .unwrap();
        let serializers = DomainSerializers::new(plain()).with("partner", partner);
        assert_eq!(
            serializers.for_domain(Some(&DomainKey::from("partner"))).name(),
            "PartnerAuthorSerializer"
        );
        assert_eq!(serializers.for_domain(None).name(), "AuthorSerializer");
        assert_eq!(
            serializers.for_domain(Some(&DomainKey::main())).name(),
            "AuthorSerializer"
        );
    }
}

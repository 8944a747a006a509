//! # Domain Framework
//!
//! This crate runs validated commands on behalf of independently configured *domains* and
//! turns the resources they return into read-only views whose relations load lazily.
//!
//! ## Architecture Overview
//!
//! The framework is split into two engines sharing a small set of leaf types:
//!
//! 1. **Operation Engine** ([`Operation`], [`Command`]) - authorization, at-most-once
//!    execution, validation and a uniform [`OperationResult`].
//! 2. **Lazy Serialization Engine** ([`Serializer`], [`View`], [`Relation`]) - scalar fields
//!    computed eagerly, references resolved on demand through nested serializers.
//!
//! Storage is consumed through the [`Query`] and [`Resource`] traits and validation through
//! the [`Contract`] trait. The framework never persists anything itself.
//!
//! ## Domains
//!
//! A [`DomainRegistry`] maps domain keys (`main`, `partner`, ...) to the namespace their
//! commands live under. It is built once at bootstrap and shared as an `Arc` with every
//! operation. Internal commands refuse to run from a domain that does not own their
//! namespace:
//!
//! ```rust
//! use domain_framework::{DomainConfig, DomainKey, DomainRegistry};
//!
//! let registry = DomainRegistry::new()
//!     .with(DomainConfig::new("main", Some("shop::backoffice")))
//!     .with(DomainConfig::new("partner", Some("shop::partner")));
//!
//! assert_eq!(registry.domain_for("shop::partner"), Some(&DomainKey::from("partner")));
//! assert_eq!(registry.domain_for("shop::reports"), Some(&DomainKey::main()));
//! ```
//!
//! ## Writing a Command
//!
//! A command declares its resource type, its contract and its serializer, and implements
//! `operate`. Any error can be returned with `?`; the engine turns it into a failure.
//! [`DomainError`]s keep their kind, everything else becomes `unspecified-error`.
//!
//! ```rust
//! use domain_framework::mock::MemoryQuery;
//! use domain_framework::{
//!     Command, Context, Contract, DomainError, DomainKey, DomainRegistry, Fault, Operation,
//!     Outcome, Params, Query, Resource, Schema, Serializer, Shape,
//! };
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone)]
//! struct Book { id: u32, title: String }
//!
//! impl Resource for Book {
//!     fn model_name(&self) -> &'static str { "Book" }
//!     fn key(&self) -> Option<Value> { Some(json!(self.id)) }
//!     fn read(&self, attribute: &str) -> Option<Value> {
//!         match attribute {
//!             "id" => Some(json!(self.id)),
//!             "title" => Some(json!(self.title)),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! struct FindBook { books: MemoryQuery<Book>, contract: Schema }
//!
//! impl Command for FindBook {
//!     type Resource = Book;
//!     const NAME: &'static str = "FindBook";
//!
//!     fn namespace(&self) -> &str { module_path!() }
//!     fn contract(&self) -> &dyn Contract { &self.contract }
//!     fn serializer(&self, _: Option<&DomainKey>) -> Option<Serializer<Book>> {
//!         Serializer::builder("BookSerializer").attribute("title").build().ok()
//!     }
//!     fn operate(&mut self, ctx: &Context<'_, Book>) -> Result<Outcome<Book>, Fault> {
//!         let id = ctx.params().integer("id")?;
//!         match self.books.find(&json!(id))? {
//!             Some(book) => Ok(Outcome::resource(book)),
//!             None => Err(DomainError::not_found("Not found").into()),
//!         }
//!     }
//! }
//!
//! let books = MemoryQuery::new("books", vec![Book { id: 1, title: "Dune".into() }]);
//! let command = FindBook {
//!     books,
//!     contract: Schema::new().required("id", Shape::integer().filled()),
//! };
//! let mut operation = Operation::new(
//!     command,
//!     Arc::new(DomainRegistry::new()),
//!     None,
//!     Params::new().with("id", 1),
//! );
//!
//! let result = operation.perform();
//! let view = result.value().and_then(|payload| payload.as_view()).unwrap();
//! assert_eq!(view.get("title"), Some(&json!("Dune")));
//! assert!(operation.perform().is_failure()); // already performed
//! ```
//!
//! ## Laziness
//!
//! A `reference-many` accessor returns a [`Relation`]: builders (`filter`, `order`,
//! `limit`, ...) only extend the pending query, and nothing runs until a materializer
//! (`first`, `to_vec`, ...) or an inspection call (`count`, `exists`, ...) is made. The
//! [`mock`] module counts executions so tests can assert it.
//!
//! ## Logging
//!
//! Every `perform()` runs inside a `perform` span. Call [`tracing::setup_tracing`] once at
//! startup and control verbosity with `RUST_LOG`.

pub mod error;
pub mod mock;
pub mod operation;
pub mod page;
pub mod params;
pub mod query;
pub mod registry;
pub mod relation;
pub mod resource;
pub mod result;
pub mod serializer;
pub mod tracing;
pub mod validator;
pub mod view;

// Re-export core types for convenience
pub use error::{
    DomainError, DomainErrorKind, ErrorKind, Fault, OperationError, ParamError, QueryError,
    SerializerError, ViewError,
};
pub use operation::{Command, Context, Operation, Outcome, Output};
pub use page::Page;
pub use params::Params;
pub use query::{Aggregate, Condition, Conditions, Direction, Op, OrderBy, Query};
pub use registry::{DomainConfig, DomainKey, DomainRegistry, MAIN_DOMAIN};
pub use relation::Relation;
pub use resource::Resource;
pub use result::{Meta, OperationRef, OperationResult, Payload};
pub use serializer::{AttributeKind, DomainSerializers, Serializer, SerializerBuilder};
pub use validator::{Contract, FieldErrors, Schema, Shape, Validation, Validator, ValueKind};
pub use view::View;

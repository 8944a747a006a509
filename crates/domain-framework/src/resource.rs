//! # Resource Trait
//!
//! The contract a persistent resource must satisfy to be serialized into a
//! [`View`](crate::view::View). Resources are owned by the storage layer; the framework only
//! reads named fields and the identity/validity passthroughs below.
//!
//! Relations are not part of this trait. They are wired explicitly on the
//! [`Serializer`](crate::serializer::Serializer) with closures, which keeps the target type
//! and its serializer statically known.

use crate::validator::FieldErrors;
use serde_json::Value;
use std::fmt::Debug;

pub trait Resource: Debug + Send + Sync + 'static {
    /// Name used in logs and views (e.g. `"User"`).
    fn model_name(&self) -> &'static str;

    /// Stable identity, `None` until the resource has been persisted.
    fn key(&self) -> Option<Value>;

    /// Reads a named field or computed attribute. `None` for unknown names.
    fn read(&self, attribute: &str) -> Option<Value>;

    /// Current validation errors of the resource.
    fn errors(&self) -> FieldErrors {
        FieldErrors::default()
    }

    fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    fn is_persisted(&self) -> bool {
        self.key().is_some()
    }

    /// Whether the attribute has unsaved changes. Resources without change tracking
    /// report every attribute as changed.
    fn attribute_changed(&self, _attribute: &str) -> bool {
        true
    }
}

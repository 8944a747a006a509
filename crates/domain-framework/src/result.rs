//! # Operation Results
//!
//! Every `perform()` ends in an [`OperationResult`]: either `Success` with a fully
//! serialized [`Payload`] or `Failure` with an [`OperationError`]. Both variants carry
//! optional metadata and a reference to the operation that produced them.

use crate::error::OperationError;
use crate::page::Page;
use crate::params::Params;
use crate::registry::DomainKey;
use crate::relation::Relation;
use crate::validator::FieldErrors;
use crate::view::View;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Free-form metadata attached to a result.
pub type Meta = Map<String, Value>;

/// The serialized value of a successful operation.
#[derive(Debug, Clone)]
pub enum Payload {
    Value(Value),
    View(View),
    Relation(Relation),
    Page(Page),
    Map(Vec<(String, Payload)>),
    List(Vec<Payload>),
}

impl Payload {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&View> {
        match self {
            Payload::View(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Option<&Relation> {
        match self {
            Payload::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<&Page> {
        match self {
            Payload::Page(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Payload]> {
        match self {
            Payload::List(items) => Some(items),
            _ => None,
        }
    }

    /// Entry of a `Map` payload.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        match self {
            Payload::Map(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, payload)| payload),
            _ => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

impl From<View> for Payload {
    fn from(view: View) -> Self {
        Payload::View(view)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Value(value) => value.serialize(serializer),
            Payload::View(view) => view.serialize(serializer),
            Payload::Relation(relation) => relation.serialize(serializer),
            Payload::Page(page) => page.serialize(serializer),
            Payload::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Payload::List(items) => items.serialize(serializer),
        }
    }
}

/// Identifies the operation that produced a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRef {
    pub name: &'static str,
    pub params: Params,
    #[serde(skip)]
    pub domain: Option<DomainKey>,
}

#[derive(Debug, Clone)]
pub enum OperationResult {
    Success {
        value: Payload,
        meta: Option<Meta>,
        operation: OperationRef,
    },
    Failure {
        error: OperationError,
        meta: Option<Meta>,
        operation: OperationRef,
    },
}

impl OperationResult {
    pub fn success(value: impl Into<Payload>, meta: Option<Meta>, operation: OperationRef) -> Self {
        OperationResult::Success {
            value: value.into(),
            meta,
            operation,
        }
    }

    pub fn failure(
        error: impl Into<OperationError>,
        meta: Option<Meta>,
        operation: OperationRef,
    ) -> Self {
        OperationResult::Failure {
            error: error.into(),
            meta,
            operation,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn value(&self) -> Option<&Payload> {
        match self {
            OperationResult::Success { value, .. } => Some(value),
            OperationResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&OperationError> {
        match self {
            OperationResult::Failure { error, .. } => Some(error),
            OperationResult::Success { .. } => None,
        }
    }

    pub fn meta(&self) -> Option<&Meta> {
        match self {
            OperationResult::Success { meta, .. } | OperationResult::Failure { meta, .. } => {
                meta.as_ref()
            }
        }
    }

    pub fn operation(&self) -> &OperationRef {
        match self {
            OperationResult::Success { operation, .. }
            | OperationResult::Failure { operation, .. } => operation,
        }
    }

    pub fn into_result(self) -> Result<Payload, OperationError> {
        match self {
            OperationResult::Success { value, .. } => Ok(value),
            OperationResult::Failure { error, .. } => Err(error),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_errors: Option<&'a FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a View>,
}

impl<'a> From<&'a OperationError> for ErrorBody<'a> {
    fn from(error: &'a OperationError) -> Self {
        let data = match error {
            OperationError::Domain(domain_error) => domain_error.data(),
            _ => None,
        };
        Self {
            kind: error.kind().tag(),
            message: error.to_string(),
            field_errors: error.field_errors(),
            data,
        }
    }
}

impl Serialize for OperationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        match self {
            OperationResult::Success { value, .. } => {
                map.serialize_entry("result", "success")?;
                map.serialize_entry("value", value)?;
            }
            OperationResult::Failure { error, .. } => {
                map.serialize_entry("result", "failure")?;
                map.serialize_entry("error", &ErrorBody::from(error))?;
            }
        }
        map.serialize_entry("meta", &self.meta())?;
        map.serialize_entry("operation", self.operation())?;
        map.end()
    }
}

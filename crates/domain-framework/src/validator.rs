//! # Validator Adapter
//!
//! The engine does not define how validation rules are expressed. It consumes a
//! [`Contract`] (the external validation capability) through the [`Validator`] adapter,
//! which turns the contract's answer into a [`Validation`] verdict and logs it.
//!
//! [`Schema`] is a small contract implementation covering what the bundled commands need:
//! required/optional keys, value shapes, `filled`, `maybe` and `strict`.
//!
//! ```rust
//! use domain_framework::{Params, Schema, Shape, Validator};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .required("id", Shape::integer().filled())
//!     .required("query", Shape::hash());
//!
//! let params = Params::try_from(json!({ "query": {} })).unwrap();
//! let validation = Validator::new(&schema).validate(&params);
//! assert!(!validation.ok);
//! assert_eq!(validation.field_errors.get("id"), ["is missing"]);
//! ```

use crate::params::Params;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

/// Field-level validation errors, in the order they were reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((field, vec![message])),
        }
    }

    /// Builder-style [`FieldErrors::add`].
    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Messages for one field; empty when the field has none.
    pub fn get(&self, field: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.entries {
            for message in messages {
                self.add(field.clone(), message);
            }
        }
    }

    /// "Phone number must be filled", one entry per message.
    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(field, messages)| {
                let label = humanize(field);
                messages
                    .iter()
                    .map(move |message| format!("{label} {message}"))
            })
            .collect()
    }

    /// All full messages joined into one sentence.
    pub fn to_sentence(&self) -> String {
        let messages = self.full_messages();
        match messages.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, second] => format!("{first} and {second}"),
            [init @ .., last] => format!("{}, and {last}", init.join(", ")),
        }
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, messages) in &self.entries {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

/// The external validation capability: checks params against declared rules.
pub trait Contract: Send + Sync {
    fn validate(&self, params: &Params) -> FieldErrors;
}

/// Outcome of running a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub ok: bool,
    pub field_errors: FieldErrors,
}

impl Validation {
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.ok {
            Ok(())
        } else {
            Err(self.field_errors)
        }
    }
}

/// Adapter between the engine and a [`Contract`].
pub struct Validator<'a> {
    contract: &'a dyn Contract,
}

impl<'a> Validator<'a> {
    pub fn new(contract: &'a dyn Contract) -> Self {
        Self { contract }
    }

    pub fn validate(&self, params: &Params) -> Validation {
        let field_errors = self.contract.validate(params);
        let ok = field_errors.is_empty();
        debug!(ok, errors = field_errors.len(), "Validated params");
        Validation { ok, field_errors }
    }
}

/// JSON value categories a [`Shape`] can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Number,
    String,
    Bool,
    Hash,
    Array,
}

impl ValueKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            // Integers are read back as i64, so larger values are rejected here.
            ValueKind::Integer => value.is_i64(),
            ValueKind::Number => value.is_number(),
            ValueKind::String => value.is_string(),
            ValueKind::Bool => value.is_boolean(),
            ValueKind::Hash => value.is_object(),
            ValueKind::Array => value.is_array(),
        }
    }

    fn article(&self) -> &'static str {
        match self {
            ValueKind::Integer => "an integer",
            ValueKind::Number => "a number",
            ValueKind::String => "a string",
            ValueKind::Bool => "a boolean",
            ValueKind::Hash => "a hash",
            ValueKind::Array => "an array",
        }
    }
}

/// Accepted shape of one parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    kinds: Vec<ValueKind>,
    filled: bool,
    nullable: bool,
}

impl Shape {
    /// Accepts any value.
    pub fn any() -> Self {
        Self::of(&[])
    }

    /// Accepts a value of any of the given kinds.
    pub fn of(kinds: &[ValueKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
            filled: false,
            nullable: false,
        }
    }

    pub fn integer() -> Self {
        Self::of(&[ValueKind::Integer])
    }

    pub fn number() -> Self {
        Self::of(&[ValueKind::Number])
    }

    pub fn string() -> Self {
        Self::of(&[ValueKind::String])
    }

    pub fn bool() -> Self {
        Self::of(&[ValueKind::Bool])
    }

    pub fn hash() -> Self {
        Self::of(&[ValueKind::Hash])
    }

    pub fn array() -> Self {
        Self::of(&[ValueKind::Array])
    }

    /// Rejects null, empty strings and empty collections.
    pub fn filled(mut self) -> Self {
        self.filled = true;
        self
    }

    /// Accepts null in addition to the declared kinds.
    pub fn maybe(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn check(&self, value: &Value) -> Option<String> {
        if value.is_null() {
            return match (self.nullable, self.filled) {
                (true, _) => None,
                (false, true) => Some("must be filled".to_string()),
                (false, false) if self.kinds.is_empty() => None,
                (false, false) => Some(self.expected()),
            };
        }
        if self.filled && is_blank(value) {
            return Some("must be filled".to_string());
        }
        if !self.kinds.is_empty() && !self.kinds.iter().any(|kind| kind.matches(value)) {
            return Some(self.expected());
        }
        None
    }

    fn expected(&self) -> String {
        let kinds: Vec<&str> = self.kinds.iter().map(ValueKind::article).collect();
        format!("must be {}", kinds.join(" or "))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    key: String,
    required: bool,
    shape: Shape,
}

/// A declarative [`Contract`]: ordered key rules plus an optional strict mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    rules: Vec<Rule>,
    strict: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, key: impl Into<String>, shape: Shape) -> Self {
        self.rules.push(Rule {
            key: key.into(),
            required: true,
            shape,
        });
        self
    }

    pub fn optional(mut self, key: impl Into<String>, shape: Shape) -> Self {
        self.rules.push(Rule {
            key: key.into(),
            required: false,
            shape,
        });
        self
    }

    /// Reports keys that no rule declares.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Appends the rules of `other`. The result is strict if either side is.
    pub fn merge(mut self, other: Schema) -> Self {
        self.rules.extend(other.rules);
        self.strict |= other.strict;
        self
    }
}

impl Contract for Schema {
    fn validate(&self, params: &Params) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for rule in &self.rules {
            match params.get(&rule.key) {
                None if rule.required => errors.add(&rule.key, "is missing"),
                None => {}
                Some(value) => {
                    if let Some(message) = rule.shape.check(value) {
                        errors.add(&rule.key, message);
                    }
                }
            }
        }
        if self.strict {
            for key in params.keys() {
                if !self.rules.iter().any(|rule| rule.key == key) {
                    errors.add(key, "is not allowed");
                }
            }
        }
        errors
    }
}

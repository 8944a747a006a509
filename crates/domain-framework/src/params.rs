//! # Operation Parameters
//!
//! [`Params`] is the immutable mapping handed to an operation at construction. It keeps
//! insertion order (serde_json is built with `preserve_order`) so debug output and
//! serialized results list keys the way the caller wrote them.

use crate::error::ParamError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named parameters of one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used when assembling params in code.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// A copy of the params without the given keys.
    pub fn without(&self, keys: &[&str]) -> Params {
        Params(
            self.0
                .iter()
                .filter(|(key, _)| !keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    fn required(&self, key: &str) -> Result<&Value, ParamError> {
        self.0
            .get(key)
            .ok_or_else(|| ParamError::Missing(key.to_string()))
    }

    pub fn integer(&self, key: &str) -> Result<i64, ParamError> {
        self.required(key)?
            .as_i64()
            .ok_or_else(|| wrong_type(key, "an integer"))
    }

    pub fn string(&self, key: &str) -> Result<&str, ParamError> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| wrong_type(key, "a string"))
    }

    pub fn object(&self, key: &str) -> Result<&Map<String, Value>, ParamError> {
        self.required(key)?
            .as_object()
            .ok_or_else(|| wrong_type(key, "a hash"))
    }

    pub fn array(&self, key: &str) -> Result<&Vec<Value>, ParamError> {
        self.required(key)?
            .as_array()
            .ok_or_else(|| wrong_type(key, "an array"))
    }

    /// Like [`Params::object`], but an absent key yields an empty mapping.
    pub fn object_or_empty(&self, key: &str) -> Result<Map<String, Value>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(_) => self.object(key).cloned(),
        }
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ParamError {
    ParamError::WrongType {
        key: key.to_string(),
        expected,
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params(map)
    }
}

impl TryFrom<Value> for Params {
    type Error = ParamError;

    /// Accepts JSON objects only; `null` becomes empty params.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Params(map)),
            Value::Null => Ok(Params::default()),
            _ => Err(wrong_type("<root>", "a hash")),
        }
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}

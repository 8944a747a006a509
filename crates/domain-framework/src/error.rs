//! # Framework Errors
//!
//! This module defines the error types used throughout the framework. By centralizing
//! error definitions, every layer (engine, serializer, relation, params) reports failures
//! through the same closed set of types.
//!
//! ## The Failure Taxonomy
//!
//! [`OperationError`] is the error carried by every `Failure` result. Its variants are a
//! closed set:
//!
//! | Tag | Raised by |
//! |-----|-----------|
//! | `cross-domain-not-allowed` | authorization check of internal commands |
//! | `already-performed` | a second `perform()` on the same operation |
//! | `validation-error` | the command contract rejected the params |
//! | `unspecified-error` | any fault the engine does not recognize (including panics) |
//! | `not-found`, `rejected`, `refused` | command-declared [`DomainError`]s |

use crate::registry::DomainKey;
use crate::validator::FieldErrors;
use crate::view::View;
use std::fmt;
use std::sync::Arc;

/// Error type returned by command actions.
///
/// Any error converts into a `Fault` through `?`. The engine downcasts it back to
/// [`OperationError`] or [`DomainError`] when it recognizes the type, and wraps
/// everything else as [`OperationError::Unspecified`].
pub type Fault = Box<dyn std::error::Error + Send + Sync>;

/// Kinds of errors a command may declare itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainErrorKind {
    NotFound,
    Rejected,
    Refused,
}

impl DomainErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainErrorKind::NotFound => "not-found",
            DomainErrorKind::Rejected => "rejected",
            DomainErrorKind::Refused => "refused",
        }
    }
}

/// A failure declared by a concrete command (e.g. "Not found", a rejected save).
///
/// A rejected save usually attaches the [`View`] of the resource that failed to persist,
/// so callers can render its validation errors.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DomainError {
    kind: DomainErrorKind,
    message: String,
    data: Option<View>,
}

impl DomainError {
    pub fn new(kind: DomainErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(DomainErrorKind::NotFound, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(DomainErrorKind::Rejected, message)
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::new(DomainErrorKind::Refused, message)
    }

    /// Attaches the view of the resource the error refers to.
    pub fn with_data(mut self, view: View) -> Self {
        self.data = Some(view);
        self
    }

    pub fn kind(&self) -> DomainErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&View> {
        self.data.as_ref()
    }
}

/// Discriminant of an [`OperationError`], usable for matching and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CrossDomainNotAllowed,
    AlreadyPerformed,
    Validation,
    Unspecified,
    Domain(DomainErrorKind),
}

impl ErrorKind {
    /// The stable tag used in logs and serialized results.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::CrossDomainNotAllowed => "cross-domain-not-allowed",
            ErrorKind::AlreadyPerformed => "already-performed",
            ErrorKind::Validation => "validation-error",
            ErrorKind::Unspecified => "unspecified-error",
            ErrorKind::Domain(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The error carried by every `Failure` result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OperationError {
    #[error(
        "{operation} cannot be performed from domain {}: it belongs to domain {}",
        domain_label(.domain),
        domain_label(.expected)
    )]
    CrossDomainNotAllowed {
        operation: &'static str,
        domain: Option<DomainKey>,
        expected: Option<DomainKey>,
    },

    #[error("{operation} has already been performed")]
    AlreadyPerformed { operation: &'static str },

    #[error("{}", .0.to_sentence())]
    Validation(FieldErrors),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("unspecified error: {message}")]
    Unspecified {
        message: String,
        #[source]
        cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
}

fn domain_label(domain: &Option<DomainKey>) -> String {
    match domain {
        Some(key) => key.to_string(),
        None => "<none>".to_string(),
    }
}

impl OperationError {
    /// Wraps an unrecognized fault, keeping it as the error source.
    pub fn unspecified(cause: Fault) -> Self {
        OperationError::Unspecified {
            message: cause.to_string(),
            cause: Some(Arc::from(cause)),
        }
    }

    /// An unspecified error with no underlying cause (e.g. a panic payload).
    pub fn unspecified_message(message: impl Into<String>) -> Self {
        OperationError::Unspecified {
            message: message.into(),
            cause: None,
        }
    }

    /// Converts a fault returned by an action, recognizing the framework's own types.
    pub fn from_fault(fault: Fault) -> Self {
        let fault = match fault.downcast::<OperationError>() {
            Ok(error) => return *error,
            Err(other) => other,
        };
        match fault.downcast::<DomainError>() {
            Ok(error) => OperationError::Domain(*error),
            Err(other) => OperationError::unspecified(other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::CrossDomainNotAllowed { .. } => ErrorKind::CrossDomainNotAllowed,
            OperationError::AlreadyPerformed { .. } => ErrorKind::AlreadyPerformed,
            OperationError::Validation(_) => ErrorKind::Validation,
            OperationError::Domain(error) => ErrorKind::Domain(error.kind()),
            OperationError::Unspecified { .. } => ErrorKind::Unspecified,
        }
    }

    /// Field-level errors, present only for validation failures.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            OperationError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Errors raised by a query handle when it is executed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown scope: {0}")]
    UnknownScope(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors raised while resolving a reference accessor on a [`View`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    #[error("{model} has no reference named {name}")]
    UnknownReference { model: &'static str, name: String },
    #[error("reference {name} on {model} is not a {expected} reference")]
    WrongKind {
        model: &'static str,
        name: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Errors raised while declaring a serializer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializerError {
    #[error("{serializer} declares attribute {attribute} more than once")]
    DuplicateAttribute {
        serializer: &'static str,
        attribute: String,
    },
    #[error("{serializer} declares an attribute with an empty name")]
    EmptyAttribute { serializer: &'static str },
    #[error("{serializer} declares a condition with no scalar attribute before it")]
    UnattachedCondition { serializer: &'static str },
}

/// Errors raised by the typed getters on [`Params`](crate::params::Params).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("param {0} is missing")]
    Missing(String),
    #[error("param {key} must be {expected}")]
    WrongType { key: String, expected: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct DiskError;

    #[test]
    fn test_from_fault_recognizes_domain_errors() {
        let fault: Fault = Box::new(DomainError::not_found("Not found"));
        let error = OperationError::from_fault(fault);
        assert_eq!(error.kind(), ErrorKind::Domain(DomainErrorKind::NotFound));
        assert_eq!(error.to_string(), "Not found");
    }

    #[test]
    fn test_from_fault_keeps_operation_errors() {
        let fault: Fault = Box::new(OperationError::AlreadyPerformed { operation: "Find" });
        let error = OperationError::from_fault(fault);
        assert_eq!(error.kind(), ErrorKind::AlreadyPerformed);
    }

    #[test]
    fn test_from_fault_wraps_unknown_errors() {
        let fault: Fault = Box::new(DiskError);
        let error = OperationError::from_fault(fault);
        assert_eq!(error.kind().tag(), "unspecified-error");
        assert_eq!(error.to_string(), "unspecified error: disk on fire");
        let source = std::error::Error::source(&error).expect("cause is kept");
        assert_eq!(source.to_string(), "disk on fire");
    }

    #[test]
    fn test_cross_domain_message_names_both_domains() {
        let error = OperationError::CrossDomainNotAllowed {
            operation: "FindUser",
            domain: Some(DomainKey::from("partner")),
            expected: Some(DomainKey::from("main")),
        };
        assert_eq!(
            error.to_string(),
            "FindUser cannot be performed from domain partner: it belongs to domain main"
        );
    }
}

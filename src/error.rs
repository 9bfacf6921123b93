use splists_util::{QualifiedName, XmlError};
use thiserror::Error;

use crate::{
    fault::Fault,
    field::{FieldError, FieldKind},
    transport::TransportError,
};

fn describe(found: &Option<QualifiedName>) -> String {
    match found {
        Some(name) => format!("element {}", name),
        None => "end of element".to_owned(),
    }
}

/// Everything `invoke` and the envelope codec can fail with. Each variant names
/// the operation, and field-level variants name the field.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown operation `{operation}`")]
    UnknownOperation { operation: String },

    #[error("{operation}: field `{field}` is not declared by the operation")]
    UnknownField { operation: String, field: String },

    #[error("{operation}: required field `{field}` has no value")]
    MissingField { operation: String, field: String },

    #[error("{operation}: field `{field}` expects {expected} but was given {found}")]
    FieldKind {
        operation: String,
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("{operation}: invalid value for field `{field}`")]
    InvalidFieldValue {
        operation: String,
        field: String,
        #[source]
        source: FieldError,
    },

    #[error("{operation}: malformed XML")]
    MalformedXml {
        operation: String,
        #[source]
        source: XmlError,
    },

    #[error("{operation}: expected element {expected}, found {}", describe(.found))]
    UnexpectedElement {
        operation: String,
        expected: QualifiedName,
        found: Option<QualifiedName>,
    },

    #[error("{operation}: unexpected trailing element {found}")]
    TrailingElement {
        operation: String,
        found: QualifiedName,
    },

    #[error("{operation}: {fault}")]
    SoapFault { operation: String, fault: Fault },

    #[error("{operation}: transport failed")]
    TransportFailed {
        operation: String,
        #[source]
        cause: TransportError,
    },
}

impl Error {
    pub fn operation(&self) -> &str {
        match self {
            Error::UnknownOperation { operation }
            | Error::UnknownField { operation, .. }
            | Error::MissingField { operation, .. }
            | Error::FieldKind { operation, .. }
            | Error::InvalidFieldValue { operation, .. }
            | Error::MalformedXml { operation, .. }
            | Error::UnexpectedElement { operation, .. }
            | Error::TrailingElement { operation, .. }
            | Error::SoapFault { operation, .. }
            | Error::TransportFailed { operation, .. } => operation,
        }
    }

    /// Maps a reader/writer failure onto the shape errors callers match on.
    pub(crate) fn from_xml(operation: &str, error: XmlError) -> Self {
        match error {
            XmlError::UnexpectedElement { expected, found } => Error::UnexpectedElement {
                operation: operation.to_owned(),
                expected,
                found,
            },
            XmlError::ExpectedEnd { found } => Error::TrailingElement {
                operation: operation.to_owned(),
                found,
            },
            source => Error::MalformedXml {
                operation: operation.to_owned(),
                source,
            },
        }
    }

    pub(crate) fn from_field(operation: &str, field: &str, error: FieldError) -> Self {
        match error {
            FieldError::Kind { expected, found } => Error::FieldKind {
                operation: operation.to_owned(),
                field: field.to_owned(),
                expected,
                found,
            },
            FieldError::Xml(XmlError::ExpectedEnd { found }) => Error::InvalidFieldValue {
                operation: operation.to_owned(),
                field: field.to_owned(),
                source: FieldError::UnexpectedChild(found),
            },
            FieldError::Xml(source) => Error::MalformedXml {
                operation: operation.to_owned(),
                source,
            },
            source => Error::InvalidFieldValue {
                operation: operation.to_owned(),
                field: field.to_owned(),
                source,
            },
        }
    }
}

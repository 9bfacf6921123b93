use thiserror::Error;

use crate::xml::QualifiedName;

fn describe(found: &Option<QualifiedName>) -> String {
    match found {
        Some(name) => format!("element {}", name),
        None => "end of element".to_owned(),
    }
}

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error(
        "unexpected end of input inside {}",
        .within.as_ref().map_or_else(|| "document".to_owned(), ToString::to_string)
    )]
    UnexpectedEof { within: Option<QualifiedName> },

    #[error("expected element {expected}, found {}", describe(.found))]
    UnexpectedElement {
        expected: QualifiedName,
        found: Option<QualifiedName>,
    },

    #[error("expected end of element, found element {found}")]
    ExpectedEnd { found: QualifiedName },

    #[error("expected a start tag")]
    ExpectedStart,

    #[error("unexpected text content")]
    TrailingContent,

    #[error("no element is open")]
    Unbalanced,
}

//! XML plumbing shared by the SharePoint Lists SOAP engine: an owned XML value
//! model, a namespace-aware pull reader, a writer with deterministic prefixes,
//! and SOAP 1.1 envelope framing.

pub mod error;
pub mod reader;
pub mod soap;
pub mod writer;
pub mod xml;

pub use error::XmlError;
pub use reader::{Token, XmlReader};
pub use writer::XmlWriter;
pub use xml::{parse_opaque, serialize, Attribute, QualifiedName, XmlElement, XmlValue};

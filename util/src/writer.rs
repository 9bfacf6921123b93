use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use std::io::Cursor;

use crate::{
    error::XmlError,
    xml::{Attribute, QualifiedName, XML_NAMESPACE},
};

struct Scope {
    tag: String,
    // `Some(None)` records an explicit `xmlns=""`.
    default_namespace: Option<Option<String>>,
    prefixes: Vec<(String, String)>,
}

/// Streaming XML writer that owns namespace declarations.
///
/// Elements are written unprefixed, redeclaring the default namespace only
/// where it changes. Namespaced attributes get prefixes from a per-document
/// counter (`ns0`, `ns1`, ...), so equal input always gives equal bytes.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
    scopes: Vec<Scope>,
    next_prefix: usize,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
            scopes: Vec::new(),
            next_prefix: 0,
        }
    }

    pub fn declaration(&mut self) -> Result<(), XmlError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new(b"1.0", Some(b"utf-8".as_ref()), None)))?;
        Ok(())
    }

    /// Starts an element under a fixed prefix, declaring it unless an
    /// enclosing element already bound it to the same namespace.
    pub fn start_prefixed(&mut self, prefix: &str, name: &QualifiedName) -> Result<(), XmlError> {
        let tag = format!("{}:{}", prefix, name.local_name());
        let mut start = BytesStart::owned_name(tag.clone());
        let mut scope = Scope {
            tag,
            default_namespace: None,
            prefixes: Vec::new(),
        };

        let namespace = name.namespace().unwrap_or_default();
        if self.bound_prefix(namespace).as_deref() != Some(prefix) {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), namespace));
            scope.prefixes.push((prefix.to_owned(), namespace.to_owned()));
        }

        self.writer.write_event(Event::Start(start))?;
        self.scopes.push(scope);
        Ok(())
    }

    pub fn start(
        &mut self,
        name: &QualifiedName,
        attributes: &[Attribute],
    ) -> Result<(), XmlError> {
        let tag = name.local_name().to_owned();
        let mut start = BytesStart::owned_name(tag.clone());
        let mut scope = Scope {
            tag,
            default_namespace: None,
            prefixes: Vec::new(),
        };

        if name.namespace() != self.default_namespace() {
            start.push_attribute(("xmlns", name.namespace().unwrap_or_default()));
            scope.default_namespace = Some(name.namespace().map(ToOwned::to_owned));
        }

        for attribute in attributes {
            let local_name = attribute.name.local_name();
            let key = match attribute.name.namespace() {
                None => local_name.to_owned(),
                Some(XML_NAMESPACE) => format!("xml:{}", local_name),
                Some(namespace) => {
                    let prefix = match self.bound_prefix(namespace).or_else(|| {
                        scope
                            .prefixes
                            .iter()
                            .find(|(_, bound)| bound == namespace)
                            .map(|(prefix, _)| prefix.clone())
                    }) {
                        Some(prefix) => prefix,
                        None => {
                            let prefix = format!("ns{}", self.next_prefix);
                            self.next_prefix += 1;
                            start.push_attribute((format!("xmlns:{}", prefix).as_str(), namespace));
                            scope.prefixes.push((prefix.clone(), namespace.to_owned()));
                            prefix
                        }
                    };

                    format!("{}:{}", prefix, local_name)
                }
            };

            start.push_attribute((key.as_str(), attribute.value.as_str()));
        }

        self.writer.write_event(Event::Start(start))?;
        self.scopes.push(scope);
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> Result<(), XmlError> {
        if !text.is_empty() {
            self.writer
                .write_event(Event::Text(BytesText::from_plain_str(text)))?;
        }

        Ok(())
    }

    pub fn end(&mut self) -> Result<(), XmlError> {
        let scope = self.scopes.pop().ok_or(XmlError::Unbalanced)?;
        self.writer
            .write_event(Event::End(BytesEnd::owned(scope.tag.into_bytes())))?;
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }

    fn default_namespace(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.default_namespace.as_ref())
            .and_then(|namespace| namespace.as_deref())
    }

    fn bound_prefix(&self, namespace: &str) -> Option<String> {
        self.scopes.iter().rev().find_map(|scope| {
            scope
                .prefixes
                .iter()
                .find(|(_, bound)| bound == namespace)
                .map(|(prefix, _)| prefix.clone())
        })
    }
}

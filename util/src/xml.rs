use std::{fmt, io::BufRead, str::FromStr};

use crate::{
    error::XmlError,
    reader::{Token, XmlReader},
    writer::XmlWriter,
};

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// A `(namespace URI, local name)` pair.
///
/// Prefixes never take part in identity. An empty namespace URI is the same as
/// no namespace, matching what `xmlns=""` means on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    namespace: Option<String>,
    local_name: String,
}

impl QualifiedName {
    pub fn new<N: Into<String>, L: Into<String>>(namespace: N, local_name: L) -> Self {
        Self::from_parts(Some(namespace.into()), local_name)
    }

    pub fn unqualified<L: Into<String>>(local_name: L) -> Self {
        Self::from_parts(None, local_name)
    }

    pub fn from_parts<L: Into<String>>(namespace: Option<String>, local_name: L) -> Self {
        Self {
            namespace: namespace.filter(|namespace| !namespace.is_empty()),
            local_name: local_name.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// A name in the same namespace as `self`.
    pub fn sibling<L: Into<String>>(&self, local_name: L) -> Self {
        Self {
            namespace: self.namespace.clone(),
            local_name: local_name.into(),
        }
    }
}

impl From<&str> for QualifiedName {
    fn from(local_name: &str) -> Self {
        Self::unqualified(local_name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{{{}}}{}", namespace, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QualifiedName,
    pub value: String,
}

impl Attribute {
    pub fn new<V: Into<String>>(name: QualifiedName, value: V) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Owned XML content, used for every field whose schema type is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlValue {
    Text(String),
    Element(XmlElement),
}

impl XmlValue {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlValue::Element(element) => Some(element),
            XmlValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlValue::Text(text) => Some(text),
            XmlValue::Element(_) => None,
        }
    }
}

impl From<XmlElement> for XmlValue {
    fn from(element: XmlElement) -> Self {
        XmlValue::Element(element)
    }
}

impl From<String> for XmlValue {
    fn from(text: String) -> Self {
        XmlValue::Text(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<XmlValue>,
}

impl XmlElement {
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute<V: Into<String>>(mut self, name: QualifiedName, value: V) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlValue::Element(child));
        self
    }

    pub fn with_text<T: Into<String>>(mut self, text: T) -> Self {
        self.push_text(text.into());
        self
    }

    fn push_text(&mut self, text: String) {
        if let Some(XmlValue::Text(last)) = self.children.last_mut() {
            last.push_str(&text);
        } else {
            self.children.push(XmlValue::Text(text));
        }
    }

    // Whitespace-only text between child elements is layout, not content.
    fn drop_indentation(&mut self) {
        if self.elements().next().is_some() {
            self.children.retain(|child| match child {
                XmlValue::Text(text) => !text.trim().is_empty(),
                XmlValue::Element(_) => true,
            });
        }
    }

    pub fn attribute(&self, name: &QualifiedName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| &attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlValue::as_element)
    }

    pub fn children_named<'a>(
        &'a self,
        name: &QualifiedName,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        let name = name.clone();
        self.elements().filter(move |child| child.name == name)
    }

    pub fn child(&self, name: &QualifiedName) -> Option<&XmlElement> {
        self.children_named(name).next()
    }

    pub fn first_element(&self) -> Option<&XmlElement> {
        self.elements().next()
    }

    pub fn into_first_element(self) -> Option<XmlElement> {
        self.children.into_iter().find_map(|child| match child {
            XmlValue::Element(element) => Some(element),
            XmlValue::Text(_) => None,
        })
    }

    /// Concatenation of the direct text children.
    pub fn text(&self) -> String {
        self.children.iter().filter_map(XmlValue::as_text).collect()
    }

    /// True when the element carries `xsi:nil="true"`.
    pub fn is_nil(&self) -> bool {
        matches!(
            self.attribute(&QualifiedName::new(XSI_NAMESPACE, "nil")),
            Some("true") | Some("1")
        )
    }

    pub fn write_to(&self, writer: &mut XmlWriter) -> Result<(), XmlError> {
        writer.start(&self.name, &self.attributes)?;
        for child in &self.children {
            serialize(child, writer)?;
        }
        writer.end()
    }

    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = XmlWriter::new();
        self.write_to(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

impl FromStr for XmlElement {
    type Err = XmlError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut reader = XmlReader::from_bytes(source.as_bytes());
        let element = parse_opaque(&mut reader)?;
        reader.finish()?;
        Ok(element)
    }
}

/// Materializes the element starting at the next start tag, leaving the reader
/// just past its matching end tag. Whitespace-only text is kept in leaf
/// elements and dropped between child elements.
pub fn parse_opaque<R: BufRead>(reader: &mut XmlReader<R>) -> Result<XmlElement, XmlError> {
    let (name, attributes) = reader.expect_any_start()?;
    let mut stack = vec![XmlElement {
        name,
        attributes,
        children: Vec::new(),
    }];

    loop {
        match reader.next_token()? {
            Token::Start { name, attributes } => stack.push(XmlElement {
                name,
                attributes,
                children: Vec::new(),
            }),

            Token::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(text);
                }
            }

            Token::End(_) => {
                let mut finished = match stack.pop() {
                    Some(finished) => finished,
                    None => return Err(XmlError::Unbalanced),
                };
                finished.drop_indentation();

                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlValue::Element(finished)),
                    None => return Ok(finished),
                }
            }

            Token::Eof => {
                return Err(XmlError::UnexpectedEof {
                    within: stack.last().map(|element| element.name.clone()),
                })
            }
        }
    }
}

pub fn serialize(value: &XmlValue, writer: &mut XmlWriter) -> Result<(), XmlError> {
    match value {
        XmlValue::Text(text) => writer.text(text),
        XmlValue::Element(element) => element.write_to(writer),
    }
}

use base64::{engine::general_purpose::STANDARD, Engine};
use splists_util::{parse_opaque, QualifiedName, XmlElement, XmlError, XmlReader, XmlWriter};
use std::{collections::BTreeMap, collections::HashMap, fmt, io::BufRead, num::ParseIntError};
use thiserror::Error;

const XOP_NAMESPACE: &str = "http://www.w3.org/2004/08/xop/include";

/// MTOM parts keyed by content id (without the `cid:` scheme).
pub type Attachments = HashMap<String, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Base64Binary,
    OpaqueXml,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::String => "a string",
            FieldKind::Int => "an int",
            FieldKind::Base64Binary => "binary data",
            FieldKind::OpaqueXml => "an XML element",
        })
    }
}

/// One element of a request or response sequence.
///
/// `trailing` is a sibling that is written right after this field, and only
/// when this field is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: QualifiedName,
    kind: FieldKind,
    optional: bool,
    trailing: Option<Box<FieldDescriptor>>,
}

impl FieldDescriptor {
    pub fn new(name: QualifiedName, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            optional: false,
            trailing: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_trailing(mut self, trailing: FieldDescriptor) -> Self {
        self.trailing = Some(Box::new(trailing));
        self
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        self.name.local_name()
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn trailing(&self) -> Option<&FieldDescriptor> {
        self.trailing.as_deref()
    }
}

/// A decoded or to-be-encoded field value. `Xml` holds the field element
/// itself, including its own tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Int(i32),
    Binary(Vec<u8>),
    Xml(XmlElement),
}

impl FieldValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "a string",
            FieldValue::Int(_) => "an int",
            FieldValue::Binary(_) => "binary data",
            FieldValue::Xml(_) => "an XML element",
        }
    }

    fn matches(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Text(_), FieldKind::String)
                | (FieldValue::Int(_), FieldKind::Int)
                | (FieldValue::Binary(_), FieldKind::Base64Binary)
                | (FieldValue::Xml(_), FieldKind::OpaqueXml)
        )
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Binary(value)
    }
}

impl From<XmlElement> for FieldValue {
    fn from(value: XmlElement) -> Self {
        FieldValue::Xml(value)
    }
}

/// Field values of one request or response, keyed by local name. A missing
/// key means "not present", which is distinct from an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<N: Into<String>, V: Into<FieldValue>>(mut self, name: N, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<N: Into<String>, V: Into<FieldValue>>(
        &mut self,
        name: N,
        value: V,
    ) -> Option<FieldValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name) {
            Some(FieldValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn binary(&self, name: &str) -> Option<&[u8]> {
        match self.get(name) {
            Some(FieldValue::Binary(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn xml(&self, name: &str) -> Option<&XmlElement> {
        match self.get(name) {
            Some(FieldValue::Xml(element)) => Some(element),
            _ => None,
        }
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        match self.remove(name) {
            Some(FieldValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn take_xml(&mut self, name: &str) -> Option<XmlElement> {
        match self.remove(name) {
            Some(FieldValue::Xml(element)) => Some(element),
            _ => None,
        }
    }
}

impl<N: Into<String>, V: Into<FieldValue>> FromIterator<(N, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("expected {expected}, found {found}")]
    Kind {
        expected: FieldKind,
        found: &'static str,
    },

    #[error("not a valid int")]
    InvalidInt(#[from] ParseIntError),

    #[error("not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("unresolved attachment reference `{0}`")]
    UnresolvedAttachment(String),

    #[error("unexpected child element {0} in simple content")]
    UnexpectedChild(QualifiedName),

    #[error(transparent)]
    Xml(#[from] XmlError),
}

pub fn encode_field(
    field: &FieldDescriptor,
    value: &FieldValue,
    writer: &mut XmlWriter,
) -> Result<(), FieldError> {
    if !value.matches(field.kind) {
        return Err(FieldError::Kind {
            expected: field.kind,
            found: value.kind_name(),
        });
    }

    match value {
        FieldValue::Xml(element) if element.name == field.name => element.write_to(writer)?,

        FieldValue::Xml(element) => {
            writer.start(&field.name, &[])?;
            element.write_to(writer)?;
            writer.end()?;
        }

        FieldValue::Text(text) => write_text(writer, &field.name, text)?,
        FieldValue::Int(value) => write_text(writer, &field.name, &value.to_string())?,
        FieldValue::Binary(bytes) => write_text(writer, &field.name, &STANDARD.encode(bytes))?,
    }

    Ok(())
}

fn write_text(writer: &mut XmlWriter, name: &QualifiedName, text: &str) -> Result<(), XmlError> {
    writer.start(name, &[])?;
    writer.text(text)?;
    writer.end()
}

/// Decodes the field whose start tag is next in `reader`. `None` means the
/// element was present but `xsi:nil`.
pub fn decode_field<R: BufRead>(
    field: &FieldDescriptor,
    reader: &mut XmlReader<R>,
    attachments: &Attachments,
) -> Result<Option<FieldValue>, FieldError> {
    match field.kind {
        FieldKind::OpaqueXml => {
            let element = parse_opaque(reader)?;
            Ok((!element.is_nil()).then(|| FieldValue::Xml(element)))
        }

        FieldKind::Base64Binary => {
            let element = parse_opaque(reader)?;
            if element.is_nil() {
                return Ok(None);
            }

            let include = QualifiedName::new(XOP_NAMESPACE, "Include");
            if let Some(include) = element.child(&include) {
                let href = include.attribute(&"href".into()).unwrap_or_default();
                let id = href.strip_prefix("cid:").unwrap_or(href);
                return match attachments.get(id) {
                    Some(bytes) => Ok(Some(FieldValue::Binary(bytes.clone()))),
                    None => Err(FieldError::UnresolvedAttachment(href.to_owned())),
                };
            }

            if let Some(child) = element.first_element() {
                return Err(FieldError::UnexpectedChild(child.name.clone()));
            }

            let text: String = element
                .text()
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            Ok(Some(FieldValue::Binary(STANDARD.decode(text)?)))
        }

        FieldKind::String | FieldKind::Int => {
            let attributes = reader.expect_start(&field.name)?;
            let nil = attributes.iter().any(|attribute| {
                attribute.name.local_name() == "nil"
                    && attribute.name.namespace() == Some(splists_util::xml::XSI_NAMESPACE)
                    && matches!(attribute.value.as_str(), "true" | "1")
            });

            if nil {
                reader.skip_element()?;
                return Ok(None);
            }

            let text = reader.read_text()?;
            if field.kind == FieldKind::Int {
                Ok(Some(FieldValue::Int(text.trim().parse()?)))
            } else {
                Ok(Some(FieldValue::Text(text)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://schemas.microsoft.com/sharepoint/soap/";

    fn descriptor(name: &str, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor::new(QualifiedName::new(NS, name), kind)
    }

    fn encoded(field: &FieldDescriptor, value: FieldValue) -> String {
        let mut writer = XmlWriter::new();
        encode_field(field, &value, &mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    fn decoded(field: &FieldDescriptor, xml: &str) -> Result<Option<FieldValue>, FieldError> {
        let mut reader = XmlReader::from_bytes(xml.as_bytes());
        decode_field(field, &mut reader, &Attachments::new())
    }

    #[test]
    fn ints_use_plain_decimal() {
        let field = descriptor("templateID", FieldKind::Int);
        assert_eq!(
            encoded(&field, FieldValue::Int(-100)),
            r#"<templateID xmlns="http://schemas.microsoft.com/sharepoint/soap/">-100</templateID>"#
        );
        assert_eq!(
            decoded(&field, &format!(r#"<templateID xmlns="{}"> 42 </templateID>"#, NS)).unwrap(),
            Some(FieldValue::Int(42))
        );
        assert!(matches!(
            decoded(&field, &format!(r#"<templateID xmlns="{}">4.2</templateID>"#, NS)),
            Err(FieldError::InvalidInt(_))
        ));
    }

    #[test]
    fn strings_keep_whitespace_and_escapes() {
        let field = descriptor("listName", FieldKind::String);
        let xml = format!(r#"<listName xmlns="{}"> a &amp; b </listName>"#, NS);
        assert_eq!(
            decoded(&field, &xml).unwrap(),
            Some(FieldValue::Text(" a & b ".to_owned()))
        );
        assert_eq!(
            decoded(&field, &format!(r#"<listName xmlns="{}"/>"#, NS)).unwrap(),
            Some(FieldValue::Text(String::new()))
        );
    }

    #[test]
    fn strings_reject_child_elements() {
        let field = descriptor("listName", FieldKind::String);
        let xml = format!(r#"<listName xmlns="{}"><b/></listName>"#, NS);
        assert!(matches!(
            decoded(&field, &xml),
            Err(FieldError::Xml(XmlError::ExpectedEnd { .. }))
        ));
    }

    #[test]
    fn binary_is_base64_with_line_breaks() {
        let field = descriptor("attachment", FieldKind::Base64Binary);
        assert_eq!(
            encoded(&field, FieldValue::Binary(b"hello".to_vec())),
            r#"<attachment xmlns="http://schemas.microsoft.com/sharepoint/soap/">aGVsbG8=</attachment>"#
        );

        let xml = format!("<attachment xmlns=\"{}\">aGVs\n  bG8=</attachment>", NS);
        assert_eq!(
            decoded(&field, &xml).unwrap(),
            Some(FieldValue::Binary(b"hello".to_vec()))
        );
    }

    #[test]
    fn binary_resolves_xop_includes() {
        let field = descriptor("attachment", FieldKind::Base64Binary);
        let xml = format!(
            r#"<attachment xmlns="{}"><xop:Include xmlns:xop="http://www.w3.org/2004/08/xop/include" href="cid:part1@example"/></attachment>"#,
            NS
        );

        let mut attachments = Attachments::new();
        attachments.insert("part1@example".to_owned(), vec![1, 2, 3]);
        let mut reader = XmlReader::from_bytes(xml.as_bytes());
        assert_eq!(
            decode_field(&field, &mut reader, &attachments).unwrap(),
            Some(FieldValue::Binary(vec![1, 2, 3]))
        );

        assert!(matches!(
            decoded(&field, &xml),
            Err(FieldError::UnresolvedAttachment(href)) if href == "cid:part1@example"
        ));
    }

    #[test]
    fn opaque_values_are_wrapped_in_the_field_element() {
        let field = descriptor("query", FieldKind::OpaqueXml);
        let query = XmlElement::new(QualifiedName::new(NS, "Query")).with_child(
            XmlElement::new(QualifiedName::new(NS, "Where")),
        );

        let xml = encoded(&field, FieldValue::Xml(query.clone()));
        assert_eq!(
            xml,
            r#"<query xmlns="http://schemas.microsoft.com/sharepoint/soap/"><Query><Where></Where></Query></query>"#
        );

        let wrapper = match decoded(&field, &xml).unwrap() {
            Some(FieldValue::Xml(wrapper)) => wrapper,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(wrapper.name, *field.name());
        assert_eq!(wrapper.first_element(), Some(&query));

        // An element already named after the field is written as-is.
        assert_eq!(encoded(&field, FieldValue::Xml(wrapper)), xml);
    }

    #[test]
    fn nil_is_not_present() {
        let field = descriptor("rowLimit", FieldKind::String);
        let xml = format!(
            r#"<rowLimit xmlns="{}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:nil="true"/>"#,
            NS
        );
        assert_eq!(decoded(&field, &xml).unwrap(), None);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let field = descriptor("templateID", FieldKind::Int);
        let mut writer = XmlWriter::new();
        assert!(matches!(
            encode_field(&field, &FieldValue::from("100"), &mut writer),
            Err(FieldError::Kind { expected: FieldKind::Int, .. })
        ));
    }

    #[test]
    fn fields_distinguish_absent_from_empty() {
        let fields = Fields::new().with("description", "");
        assert_eq!(fields.text("description"), Some(""));
        assert_eq!(fields.text("listName"), None);
        assert!(!fields.contains("listName"));
    }
}

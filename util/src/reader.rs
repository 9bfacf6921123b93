use quick_xml::{events::Event, Reader};
use std::io::BufRead;

use crate::{
    error::XmlError,
    xml::{Attribute, QualifiedName, XML_NAMESPACE},
};

/// One owned pull-parser event. Empty elements arrive as `Start` + `End`,
/// CDATA sections as `Text`; comments and processing instructions are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Start {
        name: QualifiedName,
        attributes: Vec<Attribute>,
    },
    End(QualifiedName),
    Text(String),
    Eof,
}

pub struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
    namespace_buffer: Vec<u8>,
    peeked: Option<Token>,
    open: Vec<QualifiedName>,
}

impl<'a> XmlReader<&'a [u8]> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(Reader::from_reader(bytes))
    }
}

impl<R: BufRead> XmlReader<R> {
    pub fn new(mut reader: Reader<R>) -> Self {
        reader.trim_text(false);
        reader.expand_empty_elements(true);
        reader.check_end_names(true);

        Self {
            reader,
            buffer: Vec::new(),
            namespace_buffer: Vec::new(),
            peeked: None,
            open: Vec::new(),
        }
    }

    pub fn next_token(&mut self) -> Result<Token, XmlError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.read_token(),
        }
    }

    pub fn peek_token(&mut self) -> Result<&Token, XmlError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.read_token()?,
        };

        Ok(self.peeked.insert(token))
    }

    /// Name of the next start tag, skipping text. `None` when the enclosing
    /// element (or the document) ends first.
    pub fn peek_element(&mut self) -> Result<Option<&QualifiedName>, XmlError> {
        self.skip_text()?;

        match self.peek_token()? {
            Token::Start { name, .. } => Ok(Some(name)),
            _ => Ok(None),
        }
    }

    pub fn skip_text(&mut self) -> Result<(), XmlError> {
        while let Token::Text(_) = self.peek_token()? {
            self.next_token()?;
        }

        Ok(())
    }

    pub fn expect_any_start(&mut self) -> Result<(QualifiedName, Vec<Attribute>), XmlError> {
        self.skip_text()?;

        match self.next_token()? {
            Token::Start { name, attributes } => Ok((name, attributes)),
            Token::End(_) => Err(XmlError::ExpectedStart),
            Token::Eof => Err(XmlError::UnexpectedEof { within: None }),
            Token::Text(_) => Err(XmlError::ExpectedStart),
        }
    }

    pub fn expect_start(&mut self, expected: &QualifiedName) -> Result<Vec<Attribute>, XmlError> {
        self.skip_text()?;

        match self.next_token()? {
            Token::Start { name, attributes } if &name == expected => Ok(attributes),
            Token::Start { name, .. } => Err(XmlError::UnexpectedElement {
                expected: expected.clone(),
                found: Some(name),
            }),
            Token::Eof => Err(XmlError::UnexpectedEof { within: None }),
            _ => Err(XmlError::UnexpectedElement {
                expected: expected.clone(),
                found: None,
            }),
        }
    }

    pub fn expect_end(&mut self) -> Result<QualifiedName, XmlError> {
        self.skip_text()?;

        match self.next_token()? {
            Token::End(name) => Ok(name),
            Token::Start { name, .. } => Err(XmlError::ExpectedEnd { found: name }),
            Token::Eof => Err(XmlError::UnexpectedEof { within: None }),
            Token::Text(_) => Err(XmlError::TrailingContent),
        }
    }

    /// Text content of an element whose start tag was just consumed, up to and
    /// including its end tag. Child elements are rejected.
    pub fn read_text(&mut self) -> Result<String, XmlError> {
        let mut text = String::new();

        loop {
            match self.next_token()? {
                Token::Text(chunk) => text.push_str(&chunk),
                Token::End(_) => return Ok(text),
                Token::Start { name, .. } => return Err(XmlError::ExpectedEnd { found: name }),
                Token::Eof => return Err(XmlError::UnexpectedEof { within: None }),
            }
        }
    }

    /// Skips the rest of an element whose start tag was just consumed.
    pub fn skip_element(&mut self) -> Result<(), XmlError> {
        let mut depth = 1usize;

        loop {
            match self.next_token()? {
                Token::Start { .. } => depth += 1,
                Token::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Token::Text(_) => (),
                Token::Eof => return Err(XmlError::UnexpectedEof { within: None }),
            }
        }
    }

    /// Checks that nothing but whitespace follows.
    pub fn finish(&mut self) -> Result<(), XmlError> {
        loop {
            match self.next_token()? {
                Token::Eof => return Ok(()),
                Token::Text(text) if text.trim().is_empty() => (),
                Token::Start { name, .. } => return Err(XmlError::ExpectedEnd { found: name }),
                _ => return Err(XmlError::TrailingContent),
            }
        }
    }

    fn read_token(&mut self) -> Result<Token, XmlError> {
        loop {
            self.buffer.clear();
            let (namespace, event) = self
                .reader
                .read_namespaced_event(&mut self.buffer, &mut self.namespace_buffer)?;

            let namespace = match namespace {
                Some(namespace) => Some(self.reader.decode(namespace)?.to_owned()),
                None => None,
            };

            match event {
                Event::Start(start) => {
                    let local_name = self.reader.decode(start.local_name())?;
                    let name = QualifiedName::from_parts(namespace, local_name);
                    let mut attributes = Vec::new();

                    for attribute in start.attributes() {
                        let attribute = attribute?;
                        if attribute.key == b"xmlns" || attribute.key.starts_with(b"xmlns:") {
                            continue;
                        }

                        let (attribute_namespace, local_name) = self
                            .reader
                            .attribute_namespace(attribute.key, &self.namespace_buffer);

                        let attribute_namespace = if attribute.key.starts_with(b"xml:") {
                            Some(XML_NAMESPACE.to_owned())
                        } else {
                            match attribute_namespace {
                                Some(namespace) => Some(self.reader.decode(namespace)?.to_owned()),
                                None => None,
                            }
                        };

                        let local_name = self.reader.decode(local_name)?;
                        let value = attribute.unescape_and_decode_value(&self.reader)?;
                        attributes.push(Attribute::new(
                            QualifiedName::from_parts(attribute_namespace, local_name),
                            value,
                        ));
                    }

                    self.open.push(name.clone());
                    return Ok(Token::Start { name, attributes });
                }

                Event::End(_) => {
                    let name = self.open.pop().ok_or(XmlError::Unbalanced)?;
                    return Ok(Token::End(name));
                }

                Event::Text(text) => {
                    return Ok(Token::Text(text.unescape_and_decode(&self.reader)?));
                }

                Event::CData(data) => {
                    return Ok(Token::Text(data.unescape_and_decode(&self.reader)?));
                }

                Event::Eof => {
                    if let Some(open) = self.open.last() {
                        return Err(XmlError::UnexpectedEof {
                            within: Some(open.clone()),
                        });
                    }

                    return Ok(Token::Eof);
                }

                event => log::trace!("skipping {:?}", event),
            }
        }
    }
}

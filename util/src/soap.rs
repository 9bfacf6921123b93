use std::io::BufRead;

use super::{
    error::XmlError,
    reader::XmlReader,
    writer::XmlWriter,
    xml::{parse_opaque, QualifiedName, XmlElement},
};

pub const SOAP11_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";

const PREFIX: &str = "soapenv";

/// A SOAP fault as it came off the wire. SOAP 1.2 faults are folded into the
/// same shape (`Code/Value`, `Reason/Text`, `Role`, `Detail`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    pub code: String,
    pub message: String,
    pub actor: Option<String>,
    pub detail: Option<XmlElement>,
}

impl SoapFault {
    pub fn new<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            actor: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: XmlElement) -> Self {
        self.detail = Some(detail);
        self
    }

    /// First element inside `detail`, which names the fault type.
    pub fn detail_root(&self) -> Option<&XmlElement> {
        self.detail.as_ref().and_then(XmlElement::first_element)
    }
}

#[derive(Debug)]
pub enum Body {
    /// The reader is positioned before the payload's start tag.
    Payload,
    Fault(SoapFault),
    Empty,
}

pub struct EnvelopeWriter {
    writer: XmlWriter,
}

impl EnvelopeWriter {
    /// Writes the declaration and opens `Envelope` and `Body`.
    pub fn new() -> Result<Self, XmlError> {
        let mut writer = XmlWriter::new();
        writer.declaration()?;
        writer.start_prefixed(PREFIX, &QualifiedName::new(SOAP11_NAMESPACE, "Envelope"))?;
        writer.start_prefixed(PREFIX, &QualifiedName::new(SOAP11_NAMESPACE, "Body"))?;
        Ok(Self { writer })
    }

    pub fn body(&mut self) -> &mut XmlWriter {
        &mut self.writer
    }

    pub fn fault(&mut self, fault: &SoapFault) -> Result<(), XmlError> {
        let writer = &mut self.writer;
        writer.start_prefixed(PREFIX, &QualifiedName::new(SOAP11_NAMESPACE, "Fault"))?;

        write_simple(writer, "faultcode", &fault.code)?;
        write_simple(writer, "faultstring", &fault.message)?;
        if let Some(actor) = &fault.actor {
            write_simple(writer, "faultactor", actor)?;
        }

        if let Some(detail) = &fault.detail {
            detail.write_to(writer)?;
        }

        writer.end()
    }

    pub fn finish(mut self) -> Result<Vec<u8>, XmlError> {
        self.writer.end()?;
        self.writer.end()?;
        Ok(self.writer.into_inner())
    }
}

fn write_simple(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), XmlError> {
    writer.start(&QualifiedName::unqualified(name), &[])?;
    writer.text(text)?;
    writer.end()
}

/// Reads up to the content of `Body`, skipping any `Header`. Both SOAP 1.1 and
/// SOAP 1.2 envelopes are accepted.
pub fn open_body<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Body, XmlError> {
    let namespace = match reader.peek_element()? {
        Some(name)
            if name.local_name() == "Envelope" && name.namespace() == Some(SOAP12_NAMESPACE) =>
        {
            SOAP12_NAMESPACE
        }
        _ => SOAP11_NAMESPACE,
    };

    let envelope = QualifiedName::new(namespace, "Envelope");
    let header = envelope.sibling("Header");
    let body = envelope.sibling("Body");
    let fault = envelope.sibling("Fault");

    reader.expect_start(&envelope)?;
    if reader.peek_element()? == Some(&header) {
        reader.expect_start(&header)?;
        reader.skip_element()?;
    }
    reader.expect_start(&body)?;

    match reader.peek_element()?.cloned() {
        None => Ok(Body::Empty),
        Some(name) if name == fault => {
            reader.expect_start(&fault)?;
            Ok(Body::Fault(read_fault(reader)?))
        }
        Some(_) => Ok(Body::Payload),
    }
}

/// Closes `Body` and `Envelope`; anything else left in the body is reported as
/// [`XmlError::ExpectedEnd`].
pub fn close_body<R: BufRead>(reader: &mut XmlReader<R>) -> Result<(), XmlError> {
    reader.expect_end()?;
    reader.expect_end()?;
    reader.finish()
}

fn read_fault<R: BufRead>(reader: &mut XmlReader<R>) -> Result<SoapFault, XmlError> {
    let mut fault = SoapFault::new("", "");

    while let Some(name) = reader.peek_element()?.cloned() {
        match name.local_name() {
            "faultcode" | "faultstring" | "faultactor" => {
                reader.expect_start(&name)?;
                let text = reader.read_text()?.trim().to_owned();
                match name.local_name() {
                    "faultcode" => fault.code = text,
                    "faultstring" => fault.message = text,
                    _ => fault.actor = Some(text),
                }
            }

            "detail" | "Detail" => fault.detail = Some(parse_opaque(reader)?),

            "Code" => {
                let code = parse_opaque(reader)?;
                if let Some(value) = code.child(&name.sibling("Value")) {
                    fault.code = value.text().trim().to_owned();
                }
            }

            "Reason" => {
                let reason = parse_opaque(reader)?;
                if let Some(text) = reason.child(&name.sibling("Text")) {
                    fault.message = text.text().trim().to_owned();
                }
            }

            "Role" => fault.actor = Some(parse_opaque(reader)?.text().trim().to_owned()),

            _ => {
                log::debug!("ignoring {} inside a SOAP fault", name);
                reader.expect_start(&name)?;
                reader.skip_element()?;
            }
        }
    }

    reader.expect_end()?;
    Ok(fault)
}

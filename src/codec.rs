//! Envelope codec: field values to SOAP envelopes and back, driven by a
//! [`MessageDescriptor`].
//!
//! Sequences are written in declared order. An optional field without a value
//! is left out entirely, while a required `Int` without a value is written as
//! `0`. On the way in, the reader walks the declared order and lets absent
//! optional fields be skipped, so `<a/><c/>` matches `a?, b?, c?`.

use splists_util::{
    soap::{self, Body, EnvelopeWriter, SoapFault},
    QualifiedName, XmlError, XmlReader, XmlWriter,
};
use std::io::BufRead;

use crate::{
    descriptor::{find_field, MessageDescriptor},
    error::Error,
    field::{
        decode_field, encode_field, Attachments, FieldDescriptor, FieldKind, FieldValue, Fields,
    },
};

/// A decoded response envelope: either the result fields or the fault the
/// service sent instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Completed(Fields),
    Faulted(SoapFault),
}

pub fn encode_request(descriptor: &MessageDescriptor, fields: &Fields) -> Result<Vec<u8>, Error> {
    encode_message(
        descriptor.operation(),
        descriptor.request_root(),
        descriptor.request_fields(),
        fields,
    )
}

pub fn encode_response(descriptor: &MessageDescriptor, fields: &Fields) -> Result<Vec<u8>, Error> {
    encode_message(
        descriptor.operation(),
        descriptor.response_root(),
        descriptor.response_fields(),
        fields,
    )
}

pub fn encode_fault(descriptor: &MessageDescriptor, fault: &SoapFault) -> Result<Vec<u8>, Error> {
    let xml = |error| Error::from_xml(descriptor.operation(), error);

    let mut envelope = EnvelopeWriter::new().map_err(xml)?;
    envelope.fault(fault).map_err(xml)?;
    envelope.finish().map_err(xml)
}

pub fn decode_request(descriptor: &MessageDescriptor, bytes: &[u8]) -> Result<Fields, Error> {
    let operation = descriptor.operation();
    let xml = |error| Error::from_xml(operation, error);
    let mut reader = XmlReader::from_bytes(bytes);

    match soap::open_body(&mut reader).map_err(xml)? {
        Body::Payload => (),
        Body::Empty => {
            return Err(Error::UnexpectedElement {
                operation: operation.to_owned(),
                expected: descriptor.request_root().clone(),
                found: None,
            })
        }
        Body::Fault(_) => {
            return Err(Error::UnexpectedElement {
                operation: operation.to_owned(),
                expected: descriptor.request_root().clone(),
                found: Some(QualifiedName::new(soap::SOAP11_NAMESPACE, "Fault")),
            })
        }
    }

    decode_message(
        operation,
        descriptor.request_root(),
        descriptor.request_fields(),
        &mut reader,
        &Attachments::new(),
    )
}

pub fn decode_response(descriptor: &MessageDescriptor, bytes: &[u8]) -> Result<Reply, Error> {
    decode_response_with_attachments(descriptor, bytes, &Attachments::new())
}

/// Like [`decode_response`], resolving `xop:Include` references in binary
/// fields against the MIME parts of an MTOM message.
pub fn decode_response_with_attachments(
    descriptor: &MessageDescriptor,
    bytes: &[u8],
    attachments: &Attachments,
) -> Result<Reply, Error> {
    let operation = descriptor.operation();
    let mut reader = XmlReader::from_bytes(bytes);

    match soap::open_body(&mut reader).map_err(|error| Error::from_xml(operation, error))? {
        Body::Payload => (),
        Body::Fault(fault) => return Ok(Reply::Faulted(fault)),
        Body::Empty => {
            return Err(Error::UnexpectedElement {
                operation: operation.to_owned(),
                expected: descriptor.response_root().clone(),
                found: None,
            })
        }
    }

    let fields = decode_message(
        operation,
        descriptor.response_root(),
        descriptor.response_fields(),
        &mut reader,
        attachments,
    )?;

    Ok(Reply::Completed(fields))
}

fn encode_message(
    operation: &str,
    root: &QualifiedName,
    declared: &[FieldDescriptor],
    fields: &Fields,
) -> Result<Vec<u8>, Error> {
    if let Some(unknown) = fields.names().find(|name| find_field(declared, name).is_none()) {
        return Err(Error::UnknownField {
            operation: operation.to_owned(),
            field: unknown.to_owned(),
        });
    }

    let xml = |error| Error::from_xml(operation, error);

    let mut envelope = EnvelopeWriter::new().map_err(xml)?;
    let writer = envelope.body();
    writer.start(root, &[]).map_err(xml)?;

    for field in declared {
        let written = encode_one(operation, field, fields, writer)?;

        if let Some(trailing) = field.trailing() {
            if written {
                encode_one(operation, trailing, fields, writer)?;
            } else if fields.contains(trailing.local_name()) {
                log::debug!(
                    "{}: dropping `{}` because `{}` is not set",
                    operation,
                    trailing.local_name(),
                    field.local_name()
                );
            }
        }
    }

    writer.end().map_err(xml)?;
    envelope.finish().map_err(xml)
}

/// Returns whether an element was written.
fn encode_one(
    operation: &str,
    field: &FieldDescriptor,
    fields: &Fields,
    writer: &mut XmlWriter,
) -> Result<bool, Error> {
    let default;
    let value = match fields.get(field.local_name()) {
        Some(value) => value,
        None if field.is_optional() => return Ok(false),
        None if field.kind() == FieldKind::Int => {
            default = FieldValue::Int(0);
            &default
        }
        None => {
            return Err(Error::MissingField {
                operation: operation.to_owned(),
                field: field.local_name().to_owned(),
            })
        }
    };

    encode_field(field, value, writer)
        .map_err(|error| Error::from_field(operation, field.local_name(), error))?;
    Ok(true)
}

fn decode_message<R: BufRead>(
    operation: &str,
    root: &QualifiedName,
    declared: &[FieldDescriptor],
    reader: &mut XmlReader<R>,
    attachments: &Attachments,
) -> Result<Fields, Error> {
    let xml = |error| Error::from_xml(operation, error);

    reader.expect_start(root).map_err(xml)?;
    let fields = decode_sequence(operation, declared, reader, attachments)?;
    reader.expect_end().map_err(xml)?;
    soap::close_body(reader).map_err(xml)?;

    log::trace!("{}: decoded {} field(s)", operation, fields.len());
    Ok(fields)
}

fn decode_sequence<R: BufRead>(
    operation: &str,
    declared: &[FieldDescriptor],
    reader: &mut XmlReader<R>,
    attachments: &Attachments,
) -> Result<Fields, Error> {
    let mut fields = Fields::new();
    let mut position = 0;

    loop {
        let found = match peek(operation, reader)? {
            Some(found) => found,
            None => {
                return match declared[position..].iter().find(|field| !field.is_optional()) {
                    Some(missing) => Err(Error::UnexpectedElement {
                        operation: operation.to_owned(),
                        expected: missing.name().clone(),
                        found: None,
                    }),
                    None => Ok(fields),
                };
            }
        };

        let remaining = &declared[position..];
        let offset = match remaining.iter().position(|field| field.name() == &found) {
            Some(offset) => offset,
            None => {
                return Err(match remaining.first() {
                    Some(next) => Error::UnexpectedElement {
                        operation: operation.to_owned(),
                        expected: next.name().clone(),
                        found: Some(found),
                    },
                    None => Error::TrailingElement {
                        operation: operation.to_owned(),
                        found,
                    },
                });
            }
        };

        if let Some(skipped) = remaining[..offset].iter().find(|field| !field.is_optional()) {
            return Err(Error::UnexpectedElement {
                operation: operation.to_owned(),
                expected: skipped.name().clone(),
                found: Some(found),
            });
        }

        let field = &remaining[offset];
        decode_one(operation, field, reader, attachments, &mut fields)?;

        if let Some(trailing) = field.trailing() {
            if peek(operation, reader)?.as_ref() == Some(trailing.name()) {
                decode_one(operation, trailing, reader, attachments, &mut fields)?;
            }
        }

        position += offset + 1;
    }
}

fn peek<R: BufRead>(
    operation: &str,
    reader: &mut XmlReader<R>,
) -> Result<Option<QualifiedName>, Error> {
    reader
        .peek_element()
        .map(|name| name.cloned())
        .map_err(|error: XmlError| Error::from_xml(operation, error))
}

fn decode_one<R: BufRead>(
    operation: &str,
    field: &FieldDescriptor,
    reader: &mut XmlReader<R>,
    attachments: &Attachments,
    fields: &mut Fields,
) -> Result<(), Error> {
    let value = decode_field(field, reader, attachments)
        .map_err(|error| Error::from_field(operation, field.local_name(), error))?;

    match value {
        Some(value) => {
            fields.insert(field.local_name(), value);
        }
        None => log::trace!("{}: `{}` is nil", operation, field.local_name()),
    }

    Ok(())
}

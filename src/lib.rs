//! A descriptor-driven SOAP client for the SharePoint Lists web service.
//!
//! Operations are plain data ([`MessageDescriptor`]s in an
//! [`OperationRegistry`]); a single [`Client::invoke`] encodes the request
//! envelope, posts it, and decodes the reply or maps the SOAP fault to an
//! [`Error`]. [`ListsClient`] layers typed methods over the Lists table.

pub mod client;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod fault;
pub mod field;
pub mod lists;
pub mod transport;

pub use client::{CallState, Client, ClientBuilder};
pub use codec::Reply;
pub use descriptor::{MessageDescriptor, OperationRegistry};
pub use error::Error;
pub use fault::{Fault, FaultDecoder, FaultPayload, FaultRegistry, TypedFault};
pub use field::{Attachments, FieldDescriptor, FieldKind, FieldValue, Fields};
pub use lists::{GetListItemsRequest, ListsClient, UpdateListRequest};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};

pub use splists_util::{soap::SoapFault, QualifiedName, XmlElement, XmlValue};
pub use url::Url;

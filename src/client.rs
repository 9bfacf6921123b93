use splists_util::QualifiedName;
use std::{fmt, time::Duration};
use url::Url;

use crate::{
    codec::{self, Reply},
    descriptor::{MessageDescriptor, OperationRegistry},
    error::Error,
    fault::{FaultDecoder, FaultRegistry},
    field::Fields,
    lists,
    transport::{HttpRequest, HttpTransport, Transport, TransportError},
};

const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Progress of a single `invoke`. Every call starts at `Idle`; the last three
/// states are terminal. A response that does not decode ends the call in
/// `Decoding` and `invoke` returns the decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Encoding,
    Sending,
    AwaitingResponse,
    Decoding,
    Completed,
    Faulted,
    TransportFailed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::Faulted | CallState::TransportFailed
        )
    }

    pub fn can_advance_to(self, next: CallState) -> bool {
        use CallState::*;

        matches!(
            (self, next),
            (Idle, Encoding)
                | (Encoding, Sending)
                | (Sending, AwaitingResponse)
                | (Sending, TransportFailed)
                | (AwaitingResponse, Decoding)
                | (AwaitingResponse, TransportFailed)
                | (Decoding, Completed)
                | (Decoding, Faulted)
                | (Decoding, TransportFailed)
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Call<'a> {
    operation: &'a str,
    state: CallState,
}

impl<'a> Call<'a> {
    fn new(operation: &'a str) -> Self {
        Self {
            operation,
            state: CallState::Idle,
        }
    }

    fn advance(&mut self, next: CallState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "{}: invalid transition {} -> {}",
            self.operation,
            self.state,
            next
        );

        log::debug!("{}: {} -> {}", self.operation, self.state, next);
        self.state = next;
    }

    /// Ends the call where it stands.
    fn fail(&self, error: Error) -> Error {
        log::warn!("{}: failed in {}: {}", self.operation, self.state, error);
        error
    }
}

/// Sends registered operations to one endpoint. Holds no per-call state, so a
/// shared reference can be used from many threads at once.
#[derive(Debug, Clone)]
pub struct Client<T = HttpTransport> {
    endpoint: Url,
    timeout: Option<Duration>,
    operations: OperationRegistry,
    faults: FaultRegistry,
    transport: T,
}

impl Client {
    pub fn builder(endpoint: Url) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }
}

impl<T: Transport> Client<T> {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    pub fn descriptor(&self, operation: &str) -> Result<&MessageDescriptor, Error> {
        self.operations.lookup(operation)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs one request/response exchange. Nothing is sent when the operation
    /// is unknown or the fields do not encode.
    pub fn invoke(&self, operation: &str, fields: &Fields) -> Result<Fields, Error> {
        let mut call = Call::new(operation);
        let descriptor = self.operations.lookup(operation)?;

        call.advance(CallState::Encoding);
        let body = codec::encode_request(descriptor, fields)?;
        log::trace!("{}: request envelope is {} bytes", operation, body.len());

        call.advance(CallState::Sending);
        log::debug!(
            "{}: POST {} with action {}",
            operation,
            self.endpoint,
            descriptor.soap_action()
        );

        let request = HttpRequest {
            url: &self.endpoint,
            headers: vec![
                ("Content-Type", CONTENT_TYPE.to_owned()),
                ("SOAPAction", format!("\"{}\"", descriptor.soap_action())),
            ],
            body,
            timeout: self.timeout,
        };

        call.advance(CallState::AwaitingResponse);
        let response = match self.transport.send(request) {
            Ok(response) => response,
            Err(cause) => return Err(self.transport_failed(&mut call, cause)),
        };

        call.advance(CallState::Decoding);
        log::trace!(
            "{}: HTTP {} with {} byte body",
            operation,
            response.status,
            response.body.len()
        );

        if !response.is_success() {
            // SOAP 1.1 services report faults with status 500.
            return match codec::decode_response(descriptor, &response.body) {
                Ok(Reply::Faulted(fault)) => Err(self.faulted(&mut call, fault)),
                _ => Err(self.transport_failed(
                    &mut call,
                    TransportError::Status {
                        status: response.status,
                        body: response.body,
                    },
                )),
            };
        }

        match codec::decode_response(descriptor, &response.body) {
            Ok(Reply::Completed(fields)) => {
                call.advance(CallState::Completed);
                Ok(fields)
            }
            Ok(Reply::Faulted(fault)) => Err(self.faulted(&mut call, fault)),
            Err(error) => Err(call.fail(error)),
        }
    }

    fn faulted(&self, call: &mut Call<'_>, raw: splists_util::soap::SoapFault) -> Error {
        call.advance(CallState::Faulted);
        let fault = self.faults.dispatch(raw);
        log::warn!("{}: {}", call.operation, fault);

        Error::SoapFault {
            operation: call.operation.to_owned(),
            fault,
        }
    }

    fn transport_failed(&self, call: &mut Call<'_>, cause: TransportError) -> Error {
        call.advance(CallState::TransportFailed);
        log::warn!("{}: transport failed: {}", call.operation, cause);

        Error::TransportFailed {
            operation: call.operation.to_owned(),
            cause,
        }
    }
}

/// Endpoint, timeout, operations and fault decoders for a [`Client`]. The
/// operation table starts out as the SharePoint Lists service.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    endpoint: Url,
    timeout: Option<Duration>,
    operations: OperationRegistry,
    faults: FaultRegistry,
}

impl ClientBuilder {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: None,
            operations: lists::registry(),
            faults: FaultRegistry::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the whole operation table.
    pub fn operations(mut self, operations: OperationRegistry) -> Self {
        self.operations = operations;
        self
    }

    pub fn operation(mut self, descriptor: MessageDescriptor) -> Self {
        self.operations.register(descriptor);
        self
    }

    pub fn fault(mut self, name: QualifiedName, decoder: FaultDecoder) -> Self {
        self.faults.register(name, decoder);
        self
    }

    pub fn build(self) -> Client {
        self.build_with_transport(HttpTransport::new())
    }

    pub fn build_with_transport<T: Transport>(self, transport: T) -> Client<T> {
        log::debug!(
            "client for {} with {} operation(s) and {} fault decoder(s)",
            self.endpoint,
            self.operations.len(),
            self.faults.len()
        );

        Client {
            endpoint: self.endpoint,
            timeout: self.timeout,
            operations: self.operations,
            faults: self.faults,
            transport,
        }
    }
}

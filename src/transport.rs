use bytes::Bytes;
use reqwest::blocking::Client as Reqwest;
use std::{error::Error as StdError, sync::Arc, time::Duration};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The exchange did not finish within the per-call timeout.
    #[error("timed out")]
    Timeout,

    /// Non-success HTTP status whose body was not a SOAP fault.
    #[error("HTTP status {status}")]
    Status { status: u16, body: Bytes },

    #[error(transparent)]
    Http(reqwest::Error),

    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(error)
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    pub url: &'a Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One synchronous request/response exchange. Implementations shared between
/// threads must be safe for concurrent `send` calls.
pub trait Transport {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking `reqwest` transport. Connection reuse is whatever `reqwest` does.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Reqwest,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Reqwest) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.post(request.url.clone()).body(request.body);

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?;

        Ok(HttpResponse { status, body })
    }
}

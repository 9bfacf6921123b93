#![allow(dead_code)]

use bytes::Bytes;
use splists::{HttpRequest, HttpResponse, Transport, TransportError, Url};
use std::{collections::VecDeque, sync::Mutex};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub enum Canned {
    Reply(u16, String),
    Fail(fn() -> TransportError),
}

/// Replays canned responses in order and records what was sent.
#[derive(Default)]
pub struct RecordingTransport {
    replies: Mutex<VecDeque<Canned>>,
    sent: Mutex<Vec<Recorded>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Canned::Reply(status, body.into()));
        self
    }

    pub fn fail(self, error: fn() -> TransportError) -> Self {
        self.replies.lock().unwrap().push_back(Canned::Fail(error));
        self
    }

    pub fn sent(&self) -> Vec<Recorded> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> String {
        self.sent().last().expect("nothing was sent").body.clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(Recorded {
            url: request.url.to_string(),
            headers: request.headers,
            body: String::from_utf8(request.body).unwrap(),
        });

        match self.replies.lock().unwrap().pop_front() {
            Some(Canned::Reply(status, body)) => Ok(HttpResponse {
                status,
                body: Bytes::from(body),
            }),
            Some(Canned::Fail(error)) => Err(error()),
            None => panic!("no canned reply left"),
        }
    }
}

pub fn endpoint() -> Url {
    Url::parse("http://sharepoint.example/_vti_bin/Lists.asmx").unwrap()
}

pub fn envelope(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">"#,
            "<soap:Body>{}</soap:Body></soap:Envelope>"
        ),
        body
    )
}

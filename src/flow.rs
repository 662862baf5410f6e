//! Exchange model handed to the filter by the interception host.
//!
//! The host owns TLS, parsing and connection lifecycle. It builds a [`Flow`]
//! for each intercepted request, passes it to `FilterEngine::on_request`, and
//! later to `FilterEngine::on_response` once a response (real or synthetic)
//! is attached.

use std::net::IpAddr;
use url::Url;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    /// Host as seen by the interception engine (may differ from the URL authority).
    pub host: String,
    /// Full, printable URL of the request.
    pub url: String,
}

impl Request {
    pub fn new(method: impl Into<String>, host: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            host: host.into(),
            url: url.into(),
        }
    }

    /// Builds a request from an absolute URL, taking the host from its authority.
    pub fn from_url(method: impl Into<String>, raw: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(raw)?;
        let host = parsed
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .to_string();
        Ok(Self::new(method, host, parsed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// 403 with an HTML body, used for synthetic block pages.
    pub fn forbidden_html(body: String) -> Self {
        Self::new(403, Some("text/html; charset=utf-8"), body)
    }

    /// Shape of a synthetic block page: 403 with an HTML content type.
    pub fn looks_like_block_page(&self) -> bool {
        self.status == 403
            && self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("text/html"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked { rule: Box<str> },
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Blocked { .. })
    }
}

/// Per-exchange lifecycle: `Pending -> Decided -> Logged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    Pending,
    Decided(Verdict),
    Logged { blocked: bool },
}

#[derive(Debug, Clone)]
pub struct Flow {
    pub client_ip: IpAddr,
    pub request: Request,
    pub response: Option<Response>,
    state: ExchangeState,
}

impl Flow {
    pub fn new(client_ip: IpAddr, request: Request) -> Self {
        Self {
            client_ip,
            request,
            response: None,
            state: ExchangeState::Pending,
        }
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match &self.state {
            ExchangeState::Decided(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn set_state(&mut self, state: ExchangeState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_url_extracts_host() {
        let req = Request::from_url("GET", "https://WWW.Example.com/path?q=1").unwrap();
        assert_eq!(req.host, "www.example.com");
        assert_eq!(req.url, "https://www.example.com/path?q=1");
        assert!(Request::from_url("GET", "not a url").is_err());
    }

    #[test]
    fn test_block_page_shape() {
        assert!(Response::forbidden_html("x".into()).looks_like_block_page());
        assert!(!Response::new(403, Some("application/json"), "").looks_like_block_page());
        assert!(!Response::new(200, Some("text/html"), "").looks_like_block_page());
        assert!(!Response::new(403, None, "").looks_like_block_page());
    }
}

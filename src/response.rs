use std::fmt;

use http::{StatusCode, Version};

use crate::headers::Headers;
use crate::target::Target;

/// A fully received response.
///
/// Only produced once the whole body has been read according to its framing, so a `Response`
/// is never partial.
#[derive(Clone)]
pub struct Response {
    version: Version,
    status: StatusCode,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
    url: Target,
    redirects: u32,
}

impl Response {
    pub(crate) fn new(
        version: Version,
        status: StatusCode,
        reason: String,
        headers: Headers,
        url: Target,
    ) -> Self {
        Response {
            version,
            status,
            reason,
            headers,
            body: Vec::new(),
            url,
            redirects: 0,
        }
    }

    pub(crate) fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    pub(crate) fn set_redirects(&mut self, redirects: u32) {
        self.redirects = redirects;
    }

    /// HTTP version of the status line.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase as sent by the server, possibly empty.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Response headers in the order received.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of header `name` as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_str(name)
    }

    /// All values of header `name` that are valid strings, in order.
    pub fn headers_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.get_all(name).filter_map(|v| v.to_str().ok())
    }

    /// The body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Take the body bytes.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// The body as utf-8.
    pub fn body_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Deserialize the body as json.
    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The URL that produced this response, after following redirects.
    pub fn url(&self) -> &Target {
        &self.url
    }

    /// How many redirects were followed to get here.
    pub fn redirects(&self) -> u32 {
        self.redirects
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 3xx
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status.as_u16())
            .field("reason", &self.reason)
            .field("url", &self.url.to_string())
            .field("redirects", &self.redirects)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

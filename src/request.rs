use std::fmt;
use std::time::Duration;

use http::{header, HeaderName, HeaderValue, Method};

use crate::client::Client;
use crate::headers::Headers;
use crate::target::Target;
use crate::{Error, Response};

/// A request to perform.
///
/// Built once via [`RequestBuilder`], where the URL, headers and body are validated. After that
/// it is immutable. Following a redirect produces a new `Request`.
#[derive(Clone)]
pub struct Request {
    method: Method,
    target: Target,
    headers: Headers,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl Request {
    /// Start building a request with any method.
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url.into())
    }

    /// Start building a `GET` request.
    pub fn get(url: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::GET, url)
    }

    /// Start building a `HEAD` request.
    pub fn head(url: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::HEAD, url)
    }

    /// Start building a `POST` request.
    pub fn post(url: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::POST, url)
    }

    /// Start building a `PUT` request.
    pub fn put(url: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::PUT, url)
    }

    /// Start building a `PATCH` request.
    pub fn patch(url: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::PATCH, url)
    }

    /// Start building a `DELETE` request.
    pub fn delete(url: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::DELETE, url)
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Where the request goes.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Headers as set by the caller, in order.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The body, if one was set.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Per request timeout, overriding the client config.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The follow-up request for a redirect.
    ///
    /// `keep_body` false drops the body together with the headers describing it. A caller set
    /// `host` is dropped when the follow-up goes to another host.
    pub(crate) fn redirect_to(&self, target: Target, method: Method, keep_body: bool) -> Request {
        let mut headers = self.headers.clone();
        let body = if keep_body { self.body.clone() } else { None };

        if body.is_none() {
            headers.remove(&header::CONTENT_TYPE);
        }

        if target.host_header() != self.target.host_header() {
            headers.remove(&header::HOST);
        }

        Request {
            method,
            target,
            headers,
            body,
            timeout: self.timeout,
        }
    }

    pub(crate) fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.target.to_string())
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(|b| b.len()))
            .finish()
    }
}

/// Builder for [`Request`].
///
/// Errors (bad headers, bad json) are held back until [`RequestBuilder::build`], so calls can
/// be chained.
pub struct RequestBuilder {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Headers,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
    error: Option<Error>,
    client: Option<Client>,
}

impl RequestBuilder {
    fn new(method: Method, url: String) -> Self {
        RequestBuilder {
            method,
            url,
            query: Vec::new(),
            headers: Headers::new(),
            body: None,
            timeout: None,
            error: None,
            client: None,
        }
    }

    pub(crate) fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Append a header. Duplicates are kept.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if self.error.is_none() {
            if let Err(e) = self.headers.append(key, value) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Append a query parameter. It is url encoded when the request is built.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Append many query parameters.
    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.query.push((k.into(), v.into()));
        }
        self
    }

    /// Set the body bytes.
    ///
    /// A body is sent for any method it is set on, `Content-Length` is always computed from it.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the body to `value` serialized as json.
    ///
    /// Adds `content-type: application/json` unless the request already has a content type.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(v) => {
                self.body = Some(v);
                if !self.headers.contains("content-type") {
                    self.headers.push(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                }
            }
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e.into());
                }
            }
        }
        self
    }

    /// Timeout for the entire call, including redirects.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate and build the request.
    pub fn build(self) -> Result<Request, Error> {
        let (request, _) = self.build_with_client()?;
        Ok(request)
    }

    fn build_with_client(self) -> Result<(Request, Option<Client>), Error> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let mut target = Target::parse(&self.url)?;

        if !self.query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            target.append_query(&encoded);
        }

        let request = Request {
            method: self.method,
            target,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
        };

        Ok((request, self.client))
    }

    /// Build the request and perform it.
    ///
    /// Uses the client this builder came from, or a default client.
    pub fn call(self) -> Result<Response, Error> {
        let (request, client) = self.build_with_client()?;
        let client = client.unwrap_or_default();
        client.perform(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_simple() {
        let req = Request::get("http://example.test/page")
            .header("x-foo", "bar")
            .build()
            .unwrap();

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.target().path_and_query(), "/page");
        assert_eq!(req.headers().get_str("X-Foo"), Some("bar"));
        assert!(req.body().is_none());
    }

    #[test]
    fn build_bad_url() {
        let err = Request::get("nope").build().unwrap_err();
        assert!(matches!(err, Error::MalformedUrl(_)));
    }

    #[test]
    fn build_holds_back_header_error() {
        let err = Request::get("http://example.test/")
            .header("bad header", "x")
            .header("x-fine", "y")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }

    #[test]
    fn query_encoded() {
        let req = Request::get("http://example.test/echo?keep=1")
            .query("param", "value")
            .query("a b", "c&d")
            .build()
            .unwrap();
        assert_eq!(
            req.target().path_and_query(),
            "/echo?keep=1&param=value&a+b=c%26d"
        );
    }

    #[test]
    fn query_pairs_encoded() {
        let req = Request::get("http://example.test/")
            .query_pairs([("x", "1"), ("y", "å")])
            .build()
            .unwrap();
        assert_eq!(req.target().path_and_query(), "/?x=1&y=%C3%A5");
    }

    #[test]
    fn body_on_get_when_explicit() {
        let req = Request::get("http://example.test/")
            .body("hi")
            .build()
            .unwrap();
        assert_eq!(req.body(), Some(&b"hi"[..]));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_body() {
        #[derive(serde::Serialize)]
        struct Data {
            a: u32,
        }

        let req = Request::post("http://example.test/echo")
            .json(&Data { a: 1 })
            .build()
            .unwrap();

        assert_eq!(req.body(), Some(&br#"{"a":1}"#[..]));
        assert_eq!(req.headers().get_str("content-type"), Some("application/json"));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_keeps_content_type() {
        let req = Request::post("http://example.test/echo")
            .header("Content-Type", "application/vnd.x+json")
            .json(&[1, 2, 3])
            .build()
            .unwrap();

        let all: Vec<_> = req.headers().get_all("content-type").collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], "application/vnd.x+json");
    }

    #[test]
    fn redirect_drops_body_and_content_type() {
        let req = Request::post("http://example.test/a")
            .header("content-type", "text/plain")
            .header("x-keep", "1")
            .body("data")
            .build()
            .unwrap();

        let target = req.target().join("/b").unwrap();
        let next = req.redirect_to(target, Method::GET, false);

        assert_eq!(next.method(), Method::GET);
        assert!(next.body().is_none());
        assert!(!next.headers().contains("content-type"));
        assert!(next.headers().contains("x-keep"));
        assert_eq!(next.target().path(), "/b");
    }
}

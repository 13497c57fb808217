//! Where a request goes.
//!
//! Turns a URL into scheme, host, port and request target (path plus query), and resolves
//! `Location` headers against the URL of the request that got redirected.

use std::fmt;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http::Uri;
use url::Url;

use crate::Error;

/// The two supported URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain TCP.
    Http,
    /// TLS over TCP.
    Https,
}

impl Scheme {
    /// Port used when the URL has none.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Whether connections must be TLS wrapped.
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A parsed request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: Scheme,
    host: String,
    port: u16,
    path_and_query: String,
    userinfo: Option<String>,
}

impl Target {
    /// Parse an absolute `http` or `https` URL.
    ///
    /// Any `#fragment` is dropped since it is never sent.
    pub fn parse(url: &str) -> Result<Target, Error> {
        let url = url.trim();
        let url = url.split('#').next().unwrap_or(url);

        let uri: Uri = url
            .parse()
            .map_err(|e| Error::MalformedUrl(format!("{}: {}", url, e)))?;

        let scheme = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("http") => Scheme::Http,
            Some(s) if s.eq_ignore_ascii_case("https") => Scheme::Https,
            Some(s) => {
                return Err(Error::MalformedUrl(format!(
                    "{}: unsupported scheme {}",
                    url, s
                )))
            }
            None => return Err(Error::MalformedUrl(format!("{}: missing scheme", url))),
        };

        let authority = uri
            .authority()
            .ok_or_else(|| Error::MalformedUrl(format!("{}: missing host", url)))?;

        let host = authority.host();
        if host.is_empty() {
            return Err(Error::MalformedUrl(format!("{}: empty host", url)));
        }

        let userinfo = authority
            .as_str()
            .rsplit_once('@')
            .map(|(info, _)| info.to_string());

        let port = authority.port_u16().unwrap_or(scheme.default_port());

        let path_and_query = match uri.path_and_query().map(|p| p.as_str()) {
            None | Some("") => "/".to_string(),
            Some(p) if p.starts_with('?') => format!("/{}", p),
            Some(p) => p.to_string(),
        };

        Ok(Target {
            scheme,
            host: host.to_ascii_lowercase(),
            port,
            path_and_query,
            userinfo,
        })
    }

    /// The URL scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host as written in the URL. IPv6 literals keep their brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host without IPv6 brackets, for socket address lookup and TLS server names.
    pub fn connect_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    /// Explicit or default port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The request target, i.e. path plus query. Never empty.
    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    /// Just the path part.
    pub fn path(&self) -> &str {
        match self.path_and_query.split_once('?') {
            Some((p, _)) => p,
            None => &self.path_and_query,
        }
    }

    /// Value for the `Host` header. The port is only included when it isn't the scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// `Basic` authorization value from `user:pass@` in the URL, if there is one.
    pub fn basic_auth(&self) -> Option<String> {
        let info = self.userinfo.as_ref()?;
        let (user, pass) = info.split_once(':').unwrap_or((info, ""));
        let creds = BASE64_STANDARD.encode(format!("{}:{}", user, pass));
        Some(format!("Basic {}", creds))
    }

    /// Tell if `other` is the same host and port, with same or more secure scheme.
    pub(crate) fn is_same_host(&self, other: &Target) -> bool {
        self.host == other.host
            && self.port_or_upgrade(other)
            && (self.scheme == other.scheme || other.scheme == Scheme::Https)
    }

    fn port_or_upgrade(&self, other: &Target) -> bool {
        self.port == other.port
            || (self.port == self.scheme.default_port() && other.port == other.scheme.default_port())
    }

    /// Append an already encoded `name=value&..` query string.
    pub(crate) fn append_query(&mut self, encoded: &str) {
        if encoded.is_empty() {
            return;
        }
        if self.path_and_query.contains('?') {
            if !self.path_and_query.ends_with('?') && !self.path_and_query.ends_with('&') {
                self.path_and_query.push('&');
            }
        } else {
            self.path_and_query.push('?');
        }
        self.path_and_query.push_str(encoded);
    }

    /// Resolve a `Location` header value against this target.
    ///
    /// Relative references are resolved per RFC 3986, dot segments included. The result never
    /// carries this target's `user:pass@`, see [`Target::inherit_userinfo`].
    pub fn join(&self, location: &str) -> Result<Target, Error> {
        let location = location.trim();

        let bad = |reason: &str| Error::BadLocationHeader(format!("{}: {}", location, reason));

        if location.is_empty() {
            return Err(bad("empty"));
        }

        let base = Url::parse(&self.to_string()).map_err(|e| bad(&e.to_string()))?;
        let joined = base.join(location).map_err(|e| bad(&e.to_string()))?;

        Target::parse(joined.as_str()).map_err(|e| bad(&e.to_string()))
    }

    /// Take over the `user:pass@` of `previous` unless this target has its own.
    pub(crate) fn inherit_userinfo(&mut self, previous: &Target) {
        if self.userinfo.is_none() {
            self.userinfo = previous.userinfo.clone();
        }
    }

    /// Forget any `user:pass@`, so no `authorization` is derived from it.
    pub(crate) fn clear_userinfo(&mut self) {
        self.userinfo = None;
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}{}",
            self.scheme.as_str(),
            self.host_header(),
            self.path_and_query
        )
    }
}

use std::collections::HashSet;

use http::{header, Method, StatusCode};

use crate::client::config::RedirectAuthHeaders;
use crate::ext::StatusExt;
use crate::headers::Headers;
use crate::request::Request;
use crate::target::Target;
use crate::Error;

/// Tell if `status` is followed as a redirect.
///
/// Only 301, 302, 303, 307 and 308. Other 3xx are returned to the caller as is.
pub(crate) fn is_followed(status: StatusCode) -> bool {
    status.is_redirect_rewriting_method() || status.is_redirect_retaining_method()
}

/// State of one redirect chain.
///
/// Counts the hops taken and remembers every URL requested, starting with the first.
#[derive(Debug)]
pub(crate) struct RedirectPolicy {
    max: u32,
    count: u32,
    visited: HashSet<String>,
    auth_headers: RedirectAuthHeaders,
}

impl RedirectPolicy {
    pub fn new(max: u32, auth_headers: RedirectAuthHeaders, first: &Target) -> Self {
        let mut visited = HashSet::new();
        visited.insert(first.to_string());

        RedirectPolicy {
            max,
            count: 0,
            visited,
            auth_headers,
        }
    }

    /// Redirects followed so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The follow-up request for a redirect response to `previous`.
    ///
    /// For 301, 302 and 303 a `POST` becomes a `GET` without body, other methods are kept as
    /// they were. For 307 and 308 method and body are always kept.
    pub fn next(
        &mut self,
        previous: &Request,
        status: StatusCode,
        headers: &Headers,
    ) -> Result<Request, Error> {
        let location = match headers.get("location") {
            Some(v) => v,
            None => return Err(Error::MissingLocation),
        };

        let location = location.to_str().map_err(|_| {
            Error::BadLocationHeader(String::from_utf8_lossy(location.as_bytes()).to_string())
        })?;

        let mut target = previous.target().join(location)?;

        if self.count >= self.max {
            return Err(Error::TooManyRedirects(self.max));
        }

        let key = target.to_string();
        if !self.visited.insert(key.clone()) {
            return Err(Error::RedirectLoop(key));
        }

        self.count += 1;

        let method = previous.method();
        let (new_method, keep_body) =
            if status.is_redirect_rewriting_method() && *method == Method::POST {
                (Method::GET, false)
            } else {
                (method.clone(), true)
            };

        let keep_auth_header = match self.auth_headers {
            RedirectAuthHeaders::Never => false,
            RedirectAuthHeaders::SameHost => previous.target().is_same_host(&target),
        };

        debug!(
            "Redirect {} ({}/{}): {} {} -> {} {}",
            status,
            self.count,
            self.max,
            method,
            previous.target(),
            new_method,
            target
        );

        // Credentials from the URL become an authorization header when encoded, so they
        // follow the same rule as the header itself.
        if keep_auth_header {
            target.inherit_userinfo(previous.target());
        } else {
            target.clear_userinfo();
        }

        let mut next = previous.redirect_to(target, new_method, keep_body);

        let next_headers = next.headers_mut();
        if !keep_auth_header {
            next_headers.remove(&header::AUTHORIZATION);
        }
        next_headers.remove(&header::COOKIE);

        Ok(next)
    }
}

//! HTTP/1.1 client
//!
//! A [`Client`] performs one call at a time on the calling thread. Each hop of a call opens a
//! fresh connection, which is closed once the response is read. Nothing is pooled.
//!
//! The stages of one call are:
//!
//! * **Connect** - Resolve the host and open a TCP connection, wrapped in TLS for `https`
//! * **SendRequest** - Write the request line, headers and body, see [`encode`]
//! * **RecvResponse** - Read the status line and headers, skipping interim `1xx`
//! * **Redirect** - For 301, 302, 303, 307 and 308 build the follow-up request and start over
//! * **RecvBody** - Read the body framed by content-length, chunked or connection close
//!
//! ```text
//!            ┌──────────────────┐
//! ┌ ─ ─ ─ ─ ▶│     Connect      │
//!            └──────────────────┘
//! │                   │
//!                     ▼
//! │          ┌──────────────────┐
//!            │   SendRequest    │
//! │          └──────────────────┘
//!                     │
//! │                   ▼
//!            ┌──────────────────┐
//! │          │   RecvResponse   │──────────────┐
//!            └──────────────────┘              │
//! │                   │                        │
//!                     ▼                        ▼
//! │          ┌──────────────────┐    ┌──────────────────┐
//!  ─ ─ ─ ─ ─ │     Redirect     │    │     RecvBody     │
//!            └──────────────────┘    └──────────────────┘
//! ```
//!
//! One [`Deadline`] is started when the call begins and bounds every stage of every hop.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use sockhttp::{Client, Config};
//!
//! let config = Config::builder()
//!     .timeout(Duration::from_secs(10))
//!     .max_redirects(3)
//!     .build()
//!     .unwrap();
//!
//! let client = Client::with_config(config);
//!
//! let response = client
//!     .post("https://example.test/my-path")
//!     .header("x-foo", "bar")
//!     .body("hello")
//!     .call()
//!     .unwrap();
//!
//! assert!(response.is_success());
//! println!("{} after {} redirects", response.url(), response.redirects());
//! ```

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::body::FramingMode;
use crate::error::Stage;
use crate::parser::ResponseReader;
use crate::request::{Request, RequestBuilder};
use crate::timeout::{Deadline, TimeoutGuard};
use crate::transport::{Connection, TlsConnector};
use crate::{Error, Response};

mod config;
mod redirect;
mod sendreq;

pub use self::config::{Config, ConfigBuilder, RedirectAuthHeaders};
pub use self::config::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT};
pub use self::sendreq::encode;

use self::redirect::RedirectPolicy;

#[cfg(test)]
mod test;

/// Performs requests.
///
/// Cheap to clone, clones share the config and TLS setup.
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    tls: TlsConnector,
}

/// Outcome of one hop in a call.
enum Hop {
    Done(Response),
    Redirect(Request),
}

impl Client {
    /// Client with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Client with `config`. The TLS setup is built here, once.
    pub fn with_config(config: Config) -> Self {
        let tls = TlsConnector::new(config.verify_tls());
        Client {
            config: Arc::new(config),
            tls,
        }
    }

    /// The config this client was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a request with any method, performed by this client.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        Request::builder(method, url).with_client(self.clone())
    }

    /// Start a `GET` request, performed by this client.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start a `HEAD` request, performed by this client.
    pub fn head(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Start a `POST` request, performed by this client.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start a `PUT` request, performed by this client.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start a `PATCH` request, performed by this client.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Start a `DELETE` request, performed by this client.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Perform `request`, following redirects, and read the whole response.
    ///
    /// The timeout (the request's own, or the config's) covers the entire call including
    /// every redirect hop. It is never reset.
    ///
    /// Errors come as [`Error::Call`] with the URL of the failing hop and the stage it failed
    /// in. Use [`Error::root_cause`] to match on the kind of failure.
    pub fn perform(&self, request: Request) -> Result<Response, Error> {
        let method = request.method().clone();
        let url = request.target().to_string();

        self.run(request).map_err(|e| {
            warn!("{} {} failed: {}", method, url, e);
            e
        })
    }

    fn run(&self, request: Request) -> Result<Response, Error> {
        let timeout = request.timeout().unwrap_or(self.config.timeout());
        let deadline = Deadline::after(timeout);

        let mut request = self.with_default_headers(request);

        let mut redirects = RedirectPolicy::new(
            self.config.max_redirects(),
            self.config.redirect_auth_headers(),
            request.target(),
        );

        debug!("Perform {:?} (timeout {:?})", request, timeout);

        loop {
            match self.call_once(&request, deadline, &mut redirects)? {
                Hop::Done(mut response) => {
                    response.set_redirects(redirects.count());
                    debug!(
                        "Done {} {} after {} redirects",
                        response.status(),
                        response.url(),
                        response.redirects()
                    );
                    return Ok(response);
                }
                Hop::Redirect(next) => request = next,
            }
        }
    }

    fn call_once(
        &self,
        request: &Request,
        deadline: Deadline,
        redirects: &mut RedirectPolicy,
    ) -> Result<Hop, Error> {
        debug!("{} {}", request.method(), request.target());

        let target = request.target();

        let mut connection = Connection::open(target, &deadline, &self.tls)
            .map_err(|e| e.at(target, Stage::Connect))?;

        let output = encode(request);
        TimeoutGuard::new(&mut connection, deadline, Stage::SendRequest)
            .write_all(&output)
            .map_err(|e| e.at(target, Stage::SendRequest))?;
        debug!("Sent request of {} bytes", output.len());

        let mut reader = ResponseReader::new(&mut connection, deadline);
        let head = reader
            .read_head()
            .map_err(|e| e.at(target, Stage::RecvResponse))?;

        debug!("Response {} {}", head.status, head.reason);

        if self.config.follow_redirects() && redirect::is_followed(head.status) {
            // The redirect body is not read, the connection is closed on return.
            let next = redirects
                .next(request, head.status, &head.headers)
                .map_err(|e| e.at(target, Stage::Redirect))?;
            return Ok(Hop::Redirect(next));
        }

        let mode = FramingMode::for_response(request.method(), head.status, &head.headers)
            .map_err(|e| e.at(target, Stage::RecvResponse))?;
        debug!("Body framing {:?}", mode);

        let body = reader
            .read_body(mode)
            .map_err(|e| e.at(target, Stage::RecvBody))?;

        let mut response = head.into_response(target.clone());
        response.set_body(body);

        Ok(Hop::Done(response))
    }

    fn with_default_headers(&self, mut request: Request) -> Request {
        let defaults = self.config.default_headers();

        let missing: Vec<_> = defaults
            .iter()
            .filter(|(k, _)| !request.headers().contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let headers = request.headers_mut();
        for (k, v) in missing {
            headers.push(k, v);
        }

        request
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("tls", &self.tls)
            .finish()
    }
}

//! Minimal blocking HTTP/1.1 client on raw sockets.
//!
//! sockhttp opens a TCP connection per request (TLS wrapped for `https` using rustls), writes
//! the request bytes itself and parses the response itself. It does not hide the protocol
//! mechanics: request serialization ([`encode`]), response parsing ([`parse`]) and body
//! framing ([`FramingMode`]) are all public.
//!
//! * One connection per request, closed after the response is read. No pooling, no keep-alive.
//! * Responses are read whole into memory.
//! * One end-to-end [`Deadline`] bounds connect, TLS handshake, every write and every read of
//!   a call, including all redirect hops.
//! * 301, 302, 303, 307 and 308 are followed, up to [`Config::max_redirects`].
//!
//! ```no_run
//! let response = sockhttp::get("http://example.test/")
//!     .header("accept", "text/html")
//!     .call()
//!     .unwrap();
//!
//! println!("{} {}", response.status(), response.body_str().unwrap());
//! ```
//!
//! For more control, build a [`Client`] from a [`Config`].
//!
//! ```no_run
//! use std::time::Duration;
//! use sockhttp::{Client, Config};
//!
//! let client = Client::with_config(
//!     Config::builder()
//!         .timeout(Duration::from_secs(5))
//!         .follow_redirects(false)
//!         .build()
//!         .unwrap(),
//! );
//!
//! let response = client.head("https://example.test/").call().unwrap();
//! assert!(response.body().is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod body;
mod error;
mod ext;
mod headers;
mod parser;
mod request;
mod response;
mod target;
mod timeout;
mod transport;
mod util;

pub mod client;

pub use body::FramingMode;
pub use client::{encode, Client, Config, ConfigBuilder, RedirectAuthHeaders};
pub use error::{Error, Stage};
pub use headers::Headers;
pub use parser::parse;
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use target::{Scheme, Target};
pub use timeout::{Deadline, TimeoutGuard};
pub use transport::{Connection, TlsConnector, Transport};

pub use http;

/// Start a `GET` request with a default [`Client`].
pub fn get(url: impl Into<String>) -> RequestBuilder {
    Request::get(url)
}

/// Start a `HEAD` request with a default [`Client`].
pub fn head(url: impl Into<String>) -> RequestBuilder {
    Request::head(url)
}

/// Start a `POST` request with a default [`Client`].
pub fn post(url: impl Into<String>) -> RequestBuilder {
    Request::post(url)
}

/// Start a `PUT` request with a default [`Client`].
pub fn put(url: impl Into<String>) -> RequestBuilder {
    Request::put(url)
}

/// Start a `PATCH` request with a default [`Client`].
pub fn patch(url: impl Into<String>) -> RequestBuilder {
    Request::patch(url)
}

/// Start a `DELETE` request with a default [`Client`].
pub fn delete(url: impl Into<String>) -> RequestBuilder {
    Request::delete(url)
}

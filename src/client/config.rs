use std::fmt;
use std::time::Duration;

use http::{HeaderName, HeaderValue};

use crate::headers::Headers;
use crate::Error;

/// Default timeout for an entire call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default max number of redirects followed per call.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Strategy for keeping `authorization` headers during redirects.
///
/// `cookie` headers are always removed on redirect, regardless of this setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum RedirectAuthHeaders {
    /// Never preserve the `authorization` header on redirect. This is the default.
    #[default]
    Never,
    /// Preserve the `authorization` header when the redirect is to the same host and port. The
    /// scheme must stay the same or go from `http` to `https`, never the reverse.
    SameHost,
}

/// Client configuration.
///
/// Immutable once built. Create with [`Config::builder`].
#[derive(Clone)]
pub struct Config {
    timeout: Duration,
    max_redirects: u32,
    follow_redirects: bool,
    verify_tls: bool,
    redirect_auth_headers: RedirectAuthHeaders,
    default_headers: Headers,
}

impl Config {
    /// Start from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Timeout for an entire call, redirects included.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Max redirects followed in one call.
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Tell if 3xx responses with `location` are followed.
    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// Tell if TLS certificates are verified.
    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    /// When `authorization` survives a redirect.
    pub fn redirect_auth_headers(&self) -> RedirectAuthHeaders {
        self.redirect_auth_headers
    }

    /// The `user-agent` default header, if one is set.
    pub fn user_agent(&self) -> Option<&str> {
        self.default_headers.get_str("user-agent")
    }

    /// Headers added to each request unless the request sets the same name.
    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new().inner
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("timeout", &self.timeout)
            .field("max_redirects", &self.max_redirects)
            .field("follow_redirects", &self.follow_redirects)
            .field("verify_tls", &self.verify_tls)
            .field("redirect_auth_headers", &self.redirect_auth_headers)
            .field("default_headers", &self.default_headers)
            .finish()
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
    error: Option<Error>,
}

impl ConfigBuilder {
    fn new() -> Self {
        let mut default_headers = Headers::new();
        default_headers.push(http::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.push(
            http::header::USER_AGENT,
            HeaderValue::from_static(concat!("sockhttp/", env!("CARGO_PKG_VERSION"))),
        );
        default_headers.push(http::header::CONNECTION, HeaderValue::from_static("close"));

        ConfigBuilder {
            inner: Config {
                timeout: DEFAULT_TIMEOUT,
                max_redirects: DEFAULT_MAX_REDIRECTS,
                follow_redirects: true,
                verify_tls: true,
                redirect_auth_headers: RedirectAuthHeaders::Never,
                default_headers,
            },
            error: None,
        }
    }

    /// Timeout for an entire call. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = timeout;
        self
    }

    /// Max redirects followed per call. Defaults to 5, 0 fails on the first redirect.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.inner.max_redirects = max;
        self
    }

    /// Whether to follow redirects at all. When off, 3xx responses are returned as is.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.inner.follow_redirects = follow;
        self
    }

    /// Turning this off accepts any certificate. Only for testing.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.inner.verify_tls = verify;
        self
    }

    /// When to keep `authorization` on redirect. Defaults to [`RedirectAuthHeaders::Never`].
    pub fn redirect_auth_headers(mut self, v: RedirectAuthHeaders) -> Self {
        self.inner.redirect_auth_headers = v;
        self
    }

    /// Set the `user-agent` default header.
    pub fn user_agent(self, agent: &str) -> Self {
        self.default_header(http::header::USER_AGENT, agent)
    }

    /// Set a default header, replacing an earlier default with the same name.
    pub fn default_header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if self.error.is_some() {
            return self;
        }

        let mut single = Headers::new();
        if let Err(e) = single.append(key, value) {
            self.error = Some(e);
            return self;
        }

        for (k, v) in single.iter() {
            self.inner.default_headers.remove(k);
            self.inner.default_headers.push(k.clone(), v.clone());
        }

        self
    }

    /// Remove a default header, e.g. to not send `user-agent` at all.
    pub fn remove_default_header(mut self, key: HeaderName) -> Self {
        self.inner.default_headers.remove(&key);
        self
    }

    /// Finish the config. Fails if a default header was invalid.
    pub fn build(self) -> Result<Config, Error> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(self.inner)
    }
}

use std::fmt;
use std::io;

/// The part of a call an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Resolving the host name to socket addresses.
    Resolve,
    /// Opening the TCP connection.
    Connect,
    /// TLS handshake on top of the TCP connection.
    Handshake,
    /// Writing the request.
    SendRequest,
    /// Reading the status line and headers.
    RecvResponse,
    /// Reading the response body.
    RecvBody,
    /// Building the follow-up request for a redirect.
    Redirect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Resolve => "resolve",
            Stage::Connect => "connect",
            Stage::Handshake => "tls handshake",
            Stage::SendRequest => "send request",
            Stage::RecvResponse => "receive response",
            Stage::RecvBody => "receive body",
            Stage::Redirect => "redirect",
        };
        f.write_str(s)
    }
}

/// Error type for sockhttp
#[derive(Debug, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    MalformedUrl(String),
    ConnectFailed(String),
    TlsHandshakeFailed(String),
    Timeout(Stage),
    MalformedStatusLine(String),
    MalformedHeader(String),
    MalformedContentLength(String),
    TruncatedBody { expected: u64, received: u64 },
    MalformedChunk(String),
    MissingLocation,
    BadLocationHeader(String),
    TooManyRedirects(u32),
    RedirectLoop(String),
    BadHeader(String),
    Io(Stage, String),
    Json(String),
    /// A failed call, with the URL of the hop and the stage it failed in.
    ///
    /// Every error out of [`Client::perform`](crate::Client::perform) after the request was
    /// built is wrapped like this. [`Error::root_cause`] gets at the underlying error.
    Call {
        url: String,
        stage: Stage,
        cause: Box<Error>,
    },
}

impl Error {
    /// Map an io error from a blocking socket operation.
    ///
    /// Socket timeouts surface as `WouldBlock` or `TimedOut` depending on platform.
    pub(crate) fn from_io(e: io::Error, stage: Stage) -> Error {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout(stage),
            _ => Error::Io(stage, e.to_string()),
        }
    }

    /// Attach the URL of the hop and the stage the error happened in.
    ///
    /// Errors that know their own stage keep it.
    pub(crate) fn at(self, url: &impl fmt::Display, stage: Stage) -> Error {
        if let Error::Call { .. } = self {
            return self;
        }
        let stage = self.own_stage().unwrap_or(stage);
        Error::Call {
            url: url.to_string(),
            stage,
            cause: Box::new(self),
        }
    }

    fn own_stage(&self) -> Option<Stage> {
        match self {
            Error::Timeout(s) | Error::Io(s, _) => Some(*s),
            Error::ConnectFailed(_) => Some(Stage::Connect),
            Error::TlsHandshakeFailed(_) => Some(Stage::Handshake),
            _ => None,
        }
    }

    /// The error without the call context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Call { cause, .. } => cause.root_cause(),
            e => e,
        }
    }

    /// URL of the hop that failed, if known.
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Call { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Stage the error happened in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Call { stage, .. } => Some(*stage),
            e => e.own_stage(),
        }
    }

    /// Tell if this is a timeout, regardless of stage.
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Error::Timeout(_))
    }
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        match value {
            httparse::Error::Status | httparse::Error::Version | httparse::Error::Token => {
                Error::MalformedStatusLine(value.to_string())
            }
            _ => Error::MalformedHeader(value.to_string()),
        }
    }
}

impl From<http::Error> for Error {
    fn from(value: http::Error) -> Self {
        Error::BadHeader(value.to_string())
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value.to_string())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Call { cause, .. } => Some(&**cause),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedUrl(v) => write!(f, "malformed url: {}", v),
            Error::ConnectFailed(v) => write!(f, "connect failed: {}", v),
            Error::TlsHandshakeFailed(v) => write!(f, "tls handshake failed: {}", v),
            Error::Timeout(s) => write!(f, "timeout during {}", s),
            Error::MalformedStatusLine(v) => write!(f, "malformed status line: {}", v),
            Error::MalformedHeader(v) => write!(f, "malformed header: {}", v),
            Error::MalformedContentLength(v) => write!(f, "malformed content-length: {}", v),
            Error::TruncatedBody { expected, received } => write!(
                f,
                "body truncated: expected {} bytes, got {}",
                expected, received
            ),
            Error::MalformedChunk(v) => write!(f, "malformed chunk: {}", v),
            Error::MissingLocation => write!(f, "redirect without a location header"),
            Error::BadLocationHeader(v) => write!(f, "location header is malformed: {}", v),
            Error::TooManyRedirects(n) => write!(f, "more than {} redirects", n),
            Error::RedirectLoop(v) => write!(f, "redirect loop at {}", v),
            Error::BadHeader(v) => write!(f, "bad header: {}", v),
            Error::Io(s, v) => write!(f, "io error during {}: {}", s, v),
            Error::Json(v) => write!(f, "json: {}", v),
            Error::Call { url, stage, cause } => write!(f, "{} ({}): {}", url, stage, cause),
        }
    }
}

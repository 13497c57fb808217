//! Reading responses off a connection.
//!
//! The status line and header block are parsed with `httparse` once the whole block is
//! buffered. Body framing and the body itself are handled in [`crate::body`].

use http::{HeaderName, HeaderValue, Method, StatusCode, Version};

use crate::body::{read_body, FramingMode};
use crate::error::Stage;
use crate::ext::StatusExt;
use crate::headers::Headers;
use crate::target::Target;
use crate::timeout::{Deadline, TimeoutGuard};
use crate::transport::Transport;
use crate::util::log_data;
use crate::{Error, Response};

/// Max number of headers to parse from an HTTP response
pub const MAX_RESPONSE_HEADERS: usize = 128;

/// Max size of status line plus headers.
pub const MAX_RESPONSE_HEAD: usize = 64 * 1024;

const READ_SIZE: usize = 16 * 1024;

/// Buffered input from a guarded transport.
pub(crate) struct Input<'a, T: Transport> {
    guard: TimeoutGuard<'a, T>,
    buf: Vec<u8>,
    eof: bool,
}

impl<'a, T: Transport> Input<'a, T> {
    pub fn new(guard: TimeoutGuard<'a, T>) -> Self {
        Input {
            guard,
            buf: Vec::with_capacity(READ_SIZE),
            eof: false,
        }
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.guard.set_stage(stage);
    }

    /// Bytes read but not consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn consume(&mut self, amount: usize) {
        self.buf.drain(..amount);
    }

    /// Take up to `max` buffered bytes.
    pub fn take(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.buf.len());
        self.buf.drain(..n).collect()
    }

    /// Read more from the transport. Returns 0 at end of stream.
    pub fn fill(&mut self) -> Result<usize, Error> {
        if self.eof {
            return Ok(0);
        }

        let at = self.buf.len();
        self.buf.resize(at + READ_SIZE, 0);

        let r = self.guard.read(&mut self.buf[at..]);

        let n = match r {
            Ok(n) => n,
            Err(e) => {
                self.buf.truncate(at);
                return Err(e);
            }
        };

        self.buf.truncate(at + n);

        if n == 0 {
            trace!("End of stream");
            self.eof = true;
        }

        Ok(n)
    }

    /// Read one line terminated by `\n`, without the terminator and any `\r` before it.
    ///
    /// `Ok(None)` if the stream ends before the terminator.
    pub fn read_line(&mut self, max: usize) -> Result<Option<Vec<u8>>, Error> {
        loop {
            let found = self.buf.iter().position(|c| *c == b'\n');

            if found.unwrap_or(self.buf.len()) > max {
                return Err(Error::MalformedChunk(format!(
                    "line longer than {} bytes",
                    max
                )));
            }

            if let Some(idx) = found {
                let mut line: Vec<u8> = self.buf.drain(..=idx).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(line));
            }

            if self.fill()? == 0 {
                return Ok(None);
            }
        }
    }
}

/// Status line and headers of a response.
#[derive(Debug)]
pub(crate) struct ResponseHead {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn into_response(self, url: Target) -> Response {
        Response::new(self.version, self.status, self.reason, self.headers, url)
    }
}

/// Try parsing a complete status line and header block from `input`.
///
/// `Ok(None)` if more input is needed. On success also returns how much input was used.
pub(crate) fn try_parse_response(input: &[u8]) -> Result<Option<(usize, ResponseHead)>, Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut res = httparse::Response::new(&mut headers);

    let input_used = match res.parse(input) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => {
            return Err(Error::MalformedHeader(format!(
                "more than {} headers",
                MAX_RESPONSE_HEADERS
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let version = match res.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        _ => return Err(Error::MalformedStatusLine("unsupported version".into())),
    };

    let code = res
        .code
        .ok_or_else(|| Error::MalformedStatusLine("missing status code".into()))?;

    if !(100..=599).contains(&code) {
        return Err(Error::MalformedStatusLine(format!(
            "status code out of range: {}",
            code
        )));
    }

    let status = StatusCode::from_u16(code)
        .map_err(|e| Error::MalformedStatusLine(format!("{}: {}", code, e)))?;

    let reason = res.reason.unwrap_or("").to_string();

    let mut parsed = Headers::new();
    for h in res.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| Error::MalformedHeader(format!("{}: {}", h.name, e)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|e| Error::MalformedHeader(format!("{}: {}", h.name, e)))?;
        parsed.push(name, value);
    }

    let head = ResponseHead {
        version,
        status,
        reason,
        headers: parsed,
    };

    Ok(Some((input_used, head)))
}

/// Reads a response off a transport.
///
/// All reads share the one deadline handed in. Once this returns an error the transport
/// must be discarded.
pub(crate) struct ResponseReader<'a, T: Transport> {
    input: Input<'a, T>,
}

impl<'a, T: Transport> ResponseReader<'a, T> {
    /// Read from `transport`, bounded by `deadline`.
    pub fn new(transport: &'a mut T, deadline: Deadline) -> Self {
        let guard = TimeoutGuard::new(transport, deadline, Stage::RecvResponse);
        ResponseReader {
            input: Input::new(guard),
        }
    }

    /// Read status line and headers.
    ///
    /// Interim `1xx` responses (except `101`) are skipped.
    pub(crate) fn read_head(&mut self) -> Result<ResponseHead, Error> {
        self.input.set_stage(Stage::RecvResponse);

        loop {
            let head = self.read_one_head()?;

            if head.status.is_interim() {
                debug!("Skip interim response: {}", head.status);
                continue;
            }

            return Ok(head);
        }
    }

    fn read_one_head(&mut self) -> Result<ResponseHead, Error> {
        loop {
            if let Some((input_used, head)) = try_parse_response(self.input.buffered())? {
                log_data(&self.input.buffered()[..input_used]);
                self.input.consume(input_used);
                return Ok(head);
            }

            if self.input.buffered().len() > MAX_RESPONSE_HEAD {
                return Err(Error::MalformedHeader(format!(
                    "response head larger than {} bytes",
                    MAX_RESPONSE_HEAD
                )));
            }

            if self.input.fill()? == 0 {
                return Err(closed_in_head(self.input.buffered()));
            }
        }
    }

    /// Read the body according to `mode`.
    pub fn read_body(&mut self, mode: FramingMode) -> Result<Vec<u8>, Error> {
        self.input.set_stage(Stage::RecvBody);
        read_body(&mut self.input, mode)
    }
}

fn closed_in_head(buffered: &[u8]) -> Error {
    if buffered.is_empty() {
        Error::MalformedStatusLine("connection closed before response".into())
    } else if !buffered.contains(&b'\n') {
        Error::MalformedStatusLine("connection closed inside status line".into())
    } else {
        Error::MalformedHeader("connection closed inside header block".into())
    }
}

/// Read a whole response: head, framing, body.
///
/// `method` is the request method, which decides whether a body can follow (`HEAD` never has one).
pub fn parse<T: Transport>(
    transport: &mut T,
    deadline: Deadline,
    method: &Method,
    url: Target,
) -> Result<Response, Error> {
    let mut reader = ResponseReader::new(transport, deadline);

    let head = reader.read_head()?;
    let mode = FramingMode::for_response(method, head.status, &head.headers)?;
    debug!("Response {} framing {:?}", head.status, mode);

    let body = reader.read_body(mode)?;

    let mut response = head.into_response(url);
    response.set_body(body);

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::time::Duration;

    fn url() -> Target {
        Target::parse("http://q.test/").unwrap()
    }

    fn parse_all(input: &[u8]) -> Result<Response, Error> {
        let mut t = MockTransport::new(input).with_step(7);
        let deadline = Deadline::after(Duration::from_secs(5));
        parse(&mut t, deadline, &Method::GET, url())
    }

    const RESPONSE: &[u8] = b"\
        HTTP/1.1 200 OK\r\n\
        Content-Length: 123\r\n\
        Content-Type: text/plain\r\n\
        \r\n";

    #[test]
    fn receive_incomplete_response() {
        for i in 0..RESPONSE.len() - 1 {
            let r = try_parse_response(&RESPONSE[..i]).unwrap();
            assert!(r.is_none(), "parsed at {}", i);
        }
    }

    #[test]
    fn receive_complete_response() {
        let (input_used, head) = try_parse_response(RESPONSE).unwrap().unwrap();
        assert_eq!(input_used, 66);
        assert_eq!(head.version, Version::HTTP_11);
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.reason, "OK");
        assert_eq!(head.headers.get_str("content-length"), Some("123"));
        assert_eq!(head.headers.get_str("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn content_length_body() {
        let r = parse_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello").unwrap();
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.body(), b"hello");
    }

    #[test]
    fn content_length_truncated() {
        let err = parse_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhel").unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedBody {
                expected: 5,
                received: 3
            }
        );
    }

    #[test]
    fn content_length_ignores_trailing_bytes() {
        let r = parse_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhello").unwrap();
        assert_eq!(r.body(), b"he");
    }

    #[test]
    fn chunked_body() {
        let r = parse_all(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n0\r\n\r\n",
        )
        .unwrap();
        assert_eq!(r.body(), b"Wiki");
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let r = parse_all(
            b"HTTP/1.1 200 OK\r\n\
            Content-Length: 100\r\n\
            Transfer-Encoding: chunked\r\n\
            \r\n\
            4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
        )
        .unwrap();
        assert_eq!(r.body(), b"Wikipedia");
    }

    #[test]
    fn close_delimited_body() {
        let r = parse_all(b"HTTP/1.0 200 OK\r\n\r\nuntil the end").unwrap();
        assert_eq!(r.version(), Version::HTTP_10);
        assert_eq!(r.body(), b"until the end");
    }

    #[test]
    fn close_delimited_times_out() {
        let mut t = MockTransport::new(b"HTTP/1.1 200 OK\r\n\r\npartial").stalled();
        let deadline = Deadline::after(Duration::from_secs(5));
        let err = parse(&mut t, deadline, &Method::GET, url()).unwrap_err();
        assert_eq!(err, Error::Timeout(Stage::RecvBody));
    }

    #[test]
    fn head_times_out() {
        let mut t = MockTransport::new(b"HTTP/1.1 200 OK\r\n").stalled();
        let deadline = Deadline::after(Duration::from_secs(5));
        let err = parse(&mut t, deadline, &Method::GET, url()).unwrap_err();
        assert_eq!(err, Error::Timeout(Stage::RecvResponse));
    }

    #[test]
    fn head_request_has_no_body() {
        let mut t = MockTransport::new(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n");
        let deadline = Deadline::after(Duration::from_secs(5));
        let r = parse(&mut t, deadline, &Method::HEAD, url()).unwrap();
        assert!(r.body().is_empty());
    }

    #[test]
    fn no_content_has_no_body() {
        let r = parse_all(b"HTTP/1.1 204 No Content\r\n\r\n").unwrap();
        assert_eq!(r.status(), StatusCode::NO_CONTENT);
        assert!(r.body().is_empty());
    }

    #[test]
    fn skips_interim_responses() {
        let r = parse_all(
            b"HTTP/1.1 100 Continue\r\n\r\n\
            HTTP/1.1 102 Processing\r\n\r\n\
            HTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok",
        )
        .unwrap();
        assert_eq!(r.status(), StatusCode::CREATED);
        assert_eq!(r.reason(), "Created");
        assert_eq!(r.body(), b"ok");
    }

    #[test]
    fn duplicate_headers_kept_in_order() {
        let r = parse_all(
            b"HTTP/1.1 200 OK\r\n\
            Set-Cookie: a=1\r\n\
            X-Other: y\r\n\
            Set-Cookie: b=2\r\n\
            Content-Length: 0\r\n\
            \r\n",
        )
        .unwrap();
        let cookies: Vec<_> = r
            .headers()
            .get_all("set-cookie")
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies, ["a=1", "b=2"]);

        let names: Vec<_> = r.headers().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["set-cookie", "x-other", "set-cookie", "content-length"]);
    }

    #[test]
    fn malformed_status_line() {
        let err = parse_all(b"HTTP/1.1200 OK\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedStatusLine(_)), "{:?}", err);

        let err = parse_all(b"HTTP/2 200 OK\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedStatusLine(_)), "{:?}", err);

        let err = parse_all(b"SSH-2.0-OpenSSH\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedStatusLine(_)), "{:?}", err);
    }

    #[test]
    fn status_code_out_of_range() {
        let err = parse_all(b"HTTP/1.1 600 Nope\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedStatusLine(_)), "{:?}", err);
    }

    #[test]
    fn malformed_header() {
        let err = parse_all(b"HTTP/1.1 200 OK\r\nNo colon here\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)), "{:?}", err);
    }

    #[test]
    fn folded_header_rejected() {
        let err = parse_all(b"HTTP/1.1 200 OK\r\nX-A: 1\r\n continued\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)), "{:?}", err);
    }

    #[test]
    fn too_many_headers() {
        let mut res = String::from("HTTP/1.1 200 OK\r\n");
        for i in 0..(MAX_RESPONSE_HEADERS + 1) {
            res.push_str(&format!("X-Header-{}: value\r\n", i));
        }
        res.push_str("\r\n");

        let err = parse_all(res.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)), "{:?}", err);
    }

    #[test]
    fn closed_before_response() {
        let err = parse_all(b"").unwrap_err();
        assert!(matches!(err, Error::MalformedStatusLine(_)), "{:?}", err);

        let err = parse_all(b"HTTP/1.1 20").unwrap_err();
        assert!(matches!(err, Error::MalformedStatusLine(_)), "{:?}", err);

        let err = parse_all(b"HTTP/1.1 200 OK\r\nContent-Le").unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)), "{:?}", err);
    }

    #[test]
    fn bad_content_length() {
        let err = parse_all(b"HTTP/1.1 200 OK\r\nContent-Length: -1\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::MalformedContentLength(_)), "{:?}", err);
    }

    #[test]
    fn read_line_variants() {
        let mut t = MockTransport::new(b"one\r\ntwo\nthree").with_step(2);
        let deadline = Deadline::after(Duration::from_secs(5));
        let mut input = Input::new(TimeoutGuard::new(&mut t, deadline, Stage::RecvBody));

        assert_eq!(input.read_line(100).unwrap().unwrap(), b"one");
        assert_eq!(input.read_line(100).unwrap().unwrap(), b"two");
        assert_eq!(input.read_line(100).unwrap(), None);
        assert_eq!(input.buffered(), b"three");
    }
}

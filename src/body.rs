//! Response body framing.

use http::{header, Method, StatusCode};

use crate::ext::{HeaderIterExt, MethodExt, StatusExt};
use crate::headers::Headers;
use crate::parser::Input;
use crate::transport::Transport;
use crate::Error;

/// Max length of a chunk size line or trailer line.
const MAX_CHUNK_LINE: usize = 8 * 1024;

/// Cap on up front allocation from a declared content-length.
const MAX_PREALLOC: u64 = 64 * 1024;

/// How the end of a response body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Exactly this many bytes follow the header.
    ContentLength(u64),
    /// `transfer-encoding: chunked`.
    Chunked,
    /// The body ends when the server closes the connection.
    ConnectionClose,
}

impl FramingMode {
    /// Determine framing from the response headers.
    ///
    /// `transfer-encoding: chunked` takes precedence over `content-length`. Responses that
    /// can't have a body (to `HEAD`, or `204`/`304`) are `ContentLength(0)`.
    pub fn for_response(
        method: &Method,
        status: StatusCode,
        headers: &Headers,
    ) -> Result<FramingMode, Error> {
        let no_body = method.is_no_response_body()
            || status.is_no_response_body()
            || status.is_informational();

        if no_body {
            return Ok(FramingMode::ContentLength(0));
        }

        if headers.iter().has(header::TRANSFER_ENCODING, "chunked") {
            return Ok(FramingMode::Chunked);
        }

        let mut length: Option<u64> = None;

        for value in headers.get_all("content-length") {
            let parsed = parse_content_length(value.as_bytes())?;

            match length {
                Some(prev) if prev != parsed => {
                    return Err(Error::MalformedContentLength(format!(
                        "conflicting values {} and {}",
                        prev, parsed
                    )));
                }
                _ => length = Some(parsed),
            }
        }

        Ok(match length {
            Some(n) => FramingMode::ContentLength(n),
            None => FramingMode::ConnectionClose,
        })
    }
}

fn parse_content_length(value: &[u8]) -> Result<u64, Error> {
    let bad = || Error::MalformedContentLength(String::from_utf8_lossy(value).to_string());

    let s = std::str::from_utf8(value).map_err(|_| bad())?.trim();

    if s.is_empty() || !s.bytes().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }

    s.parse::<u64>().map_err(|_| bad())
}

/// Read a body framed by `mode` from `input`.
pub(crate) fn read_body<T: Transport>(
    input: &mut Input<'_, T>,
    mode: FramingMode,
) -> Result<Vec<u8>, Error> {
    let body = match mode {
        FramingMode::ContentLength(n) => read_length_delimited(input, n)?,
        FramingMode::Chunked => read_chunked(input)?,
        FramingMode::ConnectionClose => read_close_delimited(input)?,
    };

    debug!("Read body of {} bytes", body.len());

    Ok(body)
}

fn read_length_delimited<T: Transport>(
    input: &mut Input<'_, T>,
    length: u64,
) -> Result<Vec<u8>, Error> {
    let mut body = Vec::with_capacity(length.min(MAX_PREALLOC) as usize);
    read_exact_into(input, &mut body, length, length)?;
    Ok(body)
}

/// Append exactly `amount` bytes to `body`.
///
/// `expected` is the total body size reported in `TruncatedBody`.
fn read_exact_into<T: Transport>(
    input: &mut Input<'_, T>,
    body: &mut Vec<u8>,
    amount: u64,
    expected: u64,
) -> Result<(), Error> {
    let mut left = amount;

    while left > 0 {
        if input.buffered().is_empty() && input.fill()? == 0 {
            let received = expected - left;
            return Err(Error::TruncatedBody { expected, received });
        }

        let take = left.min(usize::MAX as u64) as usize;
        let data = input.take(take);
        left -= data.len() as u64;
        body.extend_from_slice(&data);
    }

    Ok(())
}

fn read_chunked<T: Transport>(input: &mut Input<'_, T>) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();

    loop {
        let Some(line) = input.read_line(MAX_CHUNK_LINE)? else {
            let received = body.len() as u64;
            return Err(Error::TruncatedBody {
                expected: received + 1,
                received,
            });
        };

        let size = parse_chunk_size(&line)?;
        trace!("Chunk of {} bytes", size);

        if size == 0 {
            break;
        }

        let expected = (body.len() as u64)
            .checked_add(size)
            .ok_or_else(|| Error::MalformedChunk("chunk size too large".to_string()))?;
        read_exact_into(input, &mut body, size, expected)?;

        // Every chunk's data is followed by CRLF.
        while input.buffered().len() < 2 {
            if input.fill()? == 0 {
                let received = body.len() as u64;
                return Err(Error::TruncatedBody {
                    expected: received + 1,
                    received,
                });
            }
        }

        if &input.buffered()[..2] != b"\r\n" {
            return Err(Error::MalformedChunk(
                "chunk data not followed by crlf".to_string(),
            ));
        }
        input.consume(2);
    }

    // Trailer headers, then the final empty line. A server closing right after
    // the last chunk is accepted, the body is complete at that point.
    loop {
        match input.read_line(MAX_CHUNK_LINE)? {
            Some(line) if line.is_empty() => break,
            Some(line) => trace!("Chunk trailer: {}", String::from_utf8_lossy(&line)),
            None => {
                debug!("Stream closed in chunk trailer");
                break;
            }
        }
    }

    Ok(body)
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, Error> {
    let bad = |reason: &str| {
        Error::MalformedChunk(format!(
            "{}: {:?}",
            reason,
            String::from_utf8_lossy(line)
        ))
    };

    // Chunk extensions after ';' are ignored.
    let size = match line.iter().position(|c| *c == b';') {
        Some(idx) => &line[..idx],
        None => line,
    };

    let size = std::str::from_utf8(size)
        .map_err(|_| bad("chunk size is not ascii"))?
        .trim_matches(|c| c == ' ' || c == '\t');

    if size.is_empty() || !size.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad("chunk size is not hex"));
    }

    u64::from_str_radix(size, 16).map_err(|_| bad("chunk size too large"))
}

fn read_close_delimited<T: Transport>(input: &mut Input<'_, T>) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();

    loop {
        let data = input.take(usize::MAX);
        body.extend_from_slice(&data);

        if input.fill()? == 0 {
            break;
        }
    }

    Ok(body)
}

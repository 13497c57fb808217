use std::io::Write;

use http::{header, HeaderName, HeaderValue, Method};

use crate::ext::MethodExt;
use crate::request::Request;
use crate::util::log_data;

/// Serialize `request` to the bytes sent on the wire.
///
/// The output is `METHOD path HTTP/1.1`, then `host` (unless the caller set one), the caller's
/// headers in order, `authorization` from URL userinfo (unless the caller set one), and
/// `content-length`. Any `content-length` or `transfer-encoding` set by the caller is dropped,
/// the length is always computed from the body. The body follows the blank line verbatim.
///
/// `POST`, `PUT` and `PATCH` without a body are sent with `content-length: 0`.
pub fn encode(request: &Request) -> Vec<u8> {
    let body = request.body();
    let mut out = Vec::with_capacity(256 + body.map(|b| b.len()).unwrap_or(0));

    let target = request.target();
    do_write_send_line((request.method(), target.path_and_query()), &mut out);

    let headers = request.headers();

    if !headers.contains("host") {
        do_write_header(&header::HOST, target.host_header().as_bytes(), &mut out);
    }

    let sent = headers
        .iter()
        .filter(|(k, _)| **k != header::CONTENT_LENGTH && **k != header::TRANSFER_ENCODING);
    do_write_headers(sent, &mut out);

    if !headers.contains("authorization") {
        if let Some(auth) = target.basic_auth() {
            do_write_header(&header::AUTHORIZATION, auth.as_bytes(), &mut out);
        }
    }

    if let Some(len) = content_length(request.method(), body) {
        do_write_header(&header::CONTENT_LENGTH, len.to_string().as_bytes(), &mut out);
    }

    out.extend_from_slice(b"\r\n");
    log_data(&out);

    if let Some(body) = body {
        out.extend_from_slice(body);
    }

    out
}

fn content_length(method: &Method, body: Option<&[u8]>) -> Option<usize> {
    match body {
        Some(b) => Some(b.len()),
        None if method.need_request_body() => Some(0),
        None => None,
    }
}

fn do_write_send_line(line: (&Method, &str), w: &mut Vec<u8>) {
    // Writing to a Vec can't fail.
    let _ = write!(w, "{} {} HTTP/1.1\r\n", line.0, line.1);
}

fn do_write_headers<'a, I>(headers: I, w: &mut Vec<u8>)
where
    I: Iterator<Item = (&'a HeaderName, &'a HeaderValue)>,
{
    for (k, v) in headers {
        do_write_header(k, v.as_bytes(), w);
    }
}

fn do_write_header(name: &HeaderName, value: &[u8], w: &mut Vec<u8>) {
    w.extend_from_slice(name.as_str().as_bytes());
    w.extend_from_slice(b": ");
    w.extend_from_slice(value);
    w.extend_from_slice(b"\r\n");
}

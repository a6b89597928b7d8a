//! The body-length algorithm (RFC 7230 ), shared by both parsers.
use std::str::from_utf8;

use httparse;

use error::Error;
use headers;

/// How a parsed head determines the length of the body that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `Content-Length: N`.
    Fixed(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Neither header present; body runs until the transport FINs
    /// (response parsing only -- a request with no length has no body,
    /// see `request_body_length`).
    Eof,
}

/// Request-side body length (RFC 7230 item 6): requests never use
/// `Eof` framing, so the absence of both headers means no body at all.
pub fn request_body_length(headers: &[httparse::Header])
    -> Result<(BodyKind, bool), Error>
{
    let mut has_content_length = false;
    let mut has_chunked = false;
    let mut length = 0u64;
    let mut close = false;
    for header in headers {
        if header.name.eq_ignore_ascii_case("Transfer-Encoding") {
            if let Some(enc) = header.value.split(|&x| x == b',').last() {
                if headers::is_chunked(enc) {
                    has_chunked = true;
                }
            }
        } else if header.name.eq_ignore_ascii_case("Content-Length") {
            if has_content_length {
                return Err(Error::Policy("duplicate Content-Length"));
            }
            has_content_length = true;
            let s = from_utf8(header.value)
                .map_err(|_| Error::Policy("invalid Content-Length"))?;
            length = s.trim().parse()
                .map_err(|_| Error::Policy("invalid Content-Length"))?;
        } else if header.name.eq_ignore_ascii_case("Connection") {
            if header.value.split(|&x| x == b',').any(headers::is_close) {
                close = true;
            }
        }
    }
    if has_chunked {
        Ok((BodyKind::Chunked, close))
    } else if has_content_length {
        Ok((BodyKind::Fixed(length), close))
    } else {
        Ok((BodyKind::Fixed(0), close))
    }
}

/// Response-side body length (RFC 7230 items 1-5): `HEAD` responses
/// and bodyless status codes never carry a body regardless of what the
/// headers claim; otherwise an unterminated response runs until EOF.
pub fn response_body_length(is_head: bool, code: u16,
    headers: &[httparse::Header])
    -> Result<(BodyKind, bool), Error>
{
    let mut close = false;
    if is_head || ::enums::status::is_bodyless(code) {
        for header in headers {
            if header.name.eq_ignore_ascii_case("Connection") {
                if header.value.split(|&x| x == b',').any(headers::is_close) {
                    close = true;
                }
            }
        }
        return Ok((BodyKind::Fixed(0), close));
    }
    let mut has_content_length = false;
    let mut length = 0u64;
    let mut result = BodyKind::Eof;
    for header in headers {
        if header.name.eq_ignore_ascii_case("Transfer-Encoding") {
            if let Some(enc) = header.value.split(|&x| x == b',').last() {
                if headers::is_chunked(enc) {
                    if has_content_length {
                        close = true;
                    }
                    result = BodyKind::Chunked;
                }
            }
        } else if header.name.eq_ignore_ascii_case("Content-Length") {
            if has_content_length {
                return Err(Error::Policy("duplicate Content-Length"));
            }
            has_content_length = true;
            if result != BodyKind::Chunked {
                let s = from_utf8(header.value)
                    .map_err(|_| Error::Policy("invalid Content-Length"))?;
                length = s.trim().parse()
                    .map_err(|_| Error::Policy("invalid Content-Length"))?;
                result = BodyKind::Fixed(length);
            } else {
                close = true;
            }
        } else if header.name.eq_ignore_ascii_case("Connection") {
            if header.value.split(|&x| x == b',').any(headers::is_close) {
                close = true;
            }
        }
    }
    Ok((result, close))
}

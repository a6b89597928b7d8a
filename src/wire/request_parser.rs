//! Incremental request-head parser.
//!
//! Bytes accumulate in the connection's `netbuf::Buf`; each `feed()` call
//! hands the whole buffered prefix to `httparse` and either gets back a
//! complete head (and consumes the matching bytes) or learns it needs more
//! data. `httparse::Request::parse` already implements the
//! `{need-more, done, error}` contract byte-for-byte regardless of
//! fragmentation, so there is no separate hand-rolled character FSM on
//! top of it.
use std::str::from_utf8;

use httparse;
use netbuf::Buf;

use enums::{Method, Version};
use error::Error;
use headers::{is_valid_name, is_valid_value, HeaderMap};
use request::Target;
use wire::body_kind::{request_body_length, BodyKind};
use wire::request_target::RequestTarget;

const MIN_HEADERS: usize = 16;
const MAX_HEADERS: usize = 1024;

/// A fully-parsed, owned request head.
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub target: Target,
    pub version: Version,
    pub headers: HeaderMap,
    pub body_kind: BodyKind,
    pub connection_close: bool,
    /// `Expect: 100-continue` was present. The body is withheld by the
    /// peer until `100 Continue` is sent, so the driver must defer
    /// reading it instead of assuming it is already on the wire.
    pub expect_continue: bool,
}

/// `RequestTarget::parse` borrows from the raw on-wire string; own the
/// result so it can outlive the `netbuf::Buf` the bytes were parsed from.
fn owned_target(raw: &str) -> Option<Target> {
    match RequestTarget::parse(raw)? {
        RequestTarget::Origin(p) => Some(Target::Origin(p.to_string())),
        RequestTarget::Absolute { scheme, authority, path } => Some(Target::Absolute {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            path: path.to_string(),
        }),
        RequestTarget::Authority(a) => Some(Target::Authority(a.to_string())),
        RequestTarget::Asterisk => Some(Target::Asterisk),
    }
}

/// Parser state carried across `feed()` calls on one connection.
pub struct RequestParser {
    field_max: usize,
    total_max: usize,
    prev_headers: Vec<(String, String)>,
}

impl RequestParser {
    pub fn new(field_max: usize, total_max: usize) -> RequestParser {
        RequestParser {
            field_max: field_max,
            total_max: total_max,
            prev_headers: Vec::new(),
        }
    }

 /// `GET ` fast path mandated by : the overwhelmingly common method
    /// is matched as a literal 4-byte prefix instead of going through
    /// `Method::from`'s general string comparison.
    fn fast_method(method_str: &str) -> Method {
        if method_str == "GET" {
            Method::Get
        } else {
            Method::from(method_str)
        }
    }

    /// Reuse a previous header's owned `String` when this connection's
    /// next request repeats a name=value pair byte-for-byte.
    fn intern(&self, name: &str, value: &str) -> (String, String) {
        for &(ref n, ref v) in &self.prev_headers {
            if n == name && v == value {
                return (n.clone(), v.clone());
            }
        }
        (name.to_string(), value.to_string())
    }

    /// Attempt to parse one request head out of `buf`. Returns `Ok(None)`
    /// when more bytes are needed; on success the matching prefix of `buf`
    /// is consumed.
    pub fn feed(&mut self, buf: &mut Buf) -> Result<Option<RequestHead>, Error> {
        if buf.len() > self.total_max {
            return Err(Error::Policy("request-head-total-max exceeded"));
        }

        let mut small = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let mut large;
        let (method_str, path, minor, headers_owned, bytes) = {
            let mut req = httparse::Request::new(&mut small);
            let mut result = req.parse(&buf[..]);
            if matches!(result, Err(httparse::Error::TooManyHeaders)) {
                large = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
                req = httparse::Request::new(&mut large);
                result = req.parse(&buf[..]);
            }
            match result? {
                httparse::Status::Complete(bytes) => {
                    let method = req.method.expect("method set on Complete");
                    let path = req.path.expect("path set on Complete");
                    if path.len() > self.field_max {
                        return Err(Error::Policy("request-target too long"));
                    }
                    let minor = req.version.expect("version set on Complete");
                    let mut owned = Vec::with_capacity(req.headers.len());
                    for h in req.headers.iter() {
                        if h.name.as_bytes().len() > 64
                            || !is_valid_name(h.name.as_bytes())
                        {
                            return Err(Error::Policy("invalid header name"));
                        }
                        if h.value.len() > self.field_max
                            || !is_valid_value(h.value)
                        {
                            return Err(Error::Policy("invalid header value"));
                        }
                        let value = from_utf8(h.value)
                            .map_err(|_| Error::Policy("non-UTF-8 header value"))?
                            .trim();
                        owned.push(self.intern(h.name, value));
                    }
                    (method.to_string(), path.to_string(), minor, owned, bytes)
                }
                httparse::Status::Partial => return Ok(None),
            }
        };

        let version = if minor == 1 { Version::Http11 } else { Version::Http10 };
        let mut headers = HeaderMap::new();
        for (name, value) in headers_owned.iter().cloned() {
            headers.append(&name, &value);
        }
        self.prev_headers = headers_owned;

        // httparse exposes raw headers only inside the borrow above; redo
        // the cheap body-length scan against the already-collected owned
        // pairs instead of re-borrowing.
        let raw_for_scan: Vec<httparse::Header> = headers.iter()
            .map(|&(ref n, ref v)| httparse::Header { name: n.as_str(), value: v.as_bytes() })
            .collect();
        let (body_kind, close_from_conn) = request_body_length(&raw_for_scan)?;
        let keeps_alive_explicitly = headers.get("Connection")
            .map(|v| v.eq_ignore_ascii_case("keep-alive"))
            .unwrap_or(false);
        let connection_close = close_from_conn
            || (version == Version::Http10 && !keeps_alive_explicitly);
        let expect_continue = headers.get("Expect")
            .map(|v| v.eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false);

        let target = owned_target(&path)
            .ok_or_else(|| Error::Policy("invalid request-target"))?;

        buf.consume(bytes);
        Ok(Some(RequestHead {
            method: Self::fast_method(&method_str),
            target: target,
            version: version,
            headers: headers,
            body_kind: body_kind,
            connection_close: connection_close,
            expect_continue: expect_continue,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::RequestParser;
    use netbuf::Buf;
    use request::Target;
    use std::io::Write;

    fn feed(data: &[u8]) -> super::RequestHead {
        let mut p = RequestParser::new(8192, 32768);
        let mut buf = Buf::new();
        buf.write_all(data).unwrap();
        p.feed(&mut buf).unwrap().expect("complete head")
    }

    #[test]
    fn minimal_get() {
        let head = feed(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_matches!(head.target, Target::Origin(ref p) if p == "/");
        assert_eq!(head.headers.get("Host"), Some("x"));
    }

    #[test]
    fn connect_authority_target() {
        let head = feed(b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n");
        assert_matches!(head.target, Target::Authority(ref a) if a == "example.com:443");
    }

    #[test]
    fn proxy_absolute_target() {
        let head = feed(b"GET http://example.com/a HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert_matches!(head.target,
            Target::Absolute { ref scheme, ref authority, ref path }
            if scheme == "http" && authority == "example.com" && path == "/a");
    }

    #[test]
    fn fragmented_across_feeds() {
        let mut p = RequestParser::new(8192, 32768);
        let mut buf = Buf::new();
        buf.write_all(b"GET / HTTP/1.1\r\nHo").unwrap();
        assert!(p.feed(&mut buf).unwrap().is_none());
        buf.write_all(b"st: x\r\n\r\n").unwrap();
        let head = p.feed(&mut buf).unwrap().expect("complete head");
        assert_eq!(head.headers.get("Host"), Some("x"));
    }

    #[test]
    fn duplicate_headers_joined() {
        let head = feed(b"GET / HTTP/1.1\r\nX-A: 1\r\nX-A: 2\r\n\r\n");
        assert_eq!(head.headers.get("X-A"), Some("1, 2"));
    }

    #[test]
    fn expect_continue_detected() {
        let head = feed(b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\
            Expect: 100-continue\r\n\r\n");
        assert!(head.expect_continue);
    }

    #[test]
    fn expect_continue_not_set_by_default() {
        let head = feed(b"POST /x HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\r\n");
        assert!(!head.expect_continue);
    }

    #[test]
    fn total_max_enforced() {
        let mut p = RequestParser::new(8192, 16);
        let mut buf = Buf::new();
        buf.write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
        assert!(p.feed(&mut buf).is_err());
    }
}

//! Incremental response-head parser, used by the client driver.
use std::str::from_utf8;

use httparse;
use netbuf::Buf;

use enums::Version;
use error::Error;
use headers::{is_valid_name, is_valid_value, HeaderMap};
use wire::body_kind::{response_body_length, BodyKind};

const MIN_HEADERS: usize = 16;
const MAX_HEADERS: usize = 1024;

/// `Set-Cookie` is accumulated into its own list: unlike every other
/// header it must never be collapsed with `", "`.
#[derive(Debug)]
pub struct ResponseHead {
    pub version: Version,
    pub code: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub set_cookies: Vec<String>,
    pub body_kind: BodyKind,
    pub connection_close: bool,
}

pub struct ResponseParser {
    field_max: usize,
    total_max: usize,
}

impl ResponseParser {
    pub fn new(field_max: usize, total_max: usize) -> ResponseParser {
        ResponseParser { field_max: field_max, total_max: total_max }
    }

 /// 8-byte literal match for `HTTP/1.1`/`HTTP/1.0` mandated by ,
    /// ahead of falling back to `httparse`'s general parse for anything
    /// else (`HTTP/2.0` and friends still go through the general path so
    /// they're rejected with the right status rather than misread).
    fn fast_version(buf: &[u8]) -> Option<u8> {
        if buf.len() < 8 || &buf[..5] != b"HTTP/" || buf[6] != b'.' {
            return None;
        }
        match (buf[5], buf[7]) {
            (b'1', b'1') => Some(1),
            (b'1', b'0') => Some(0),
            _ => None,
        }
    }

    /// Parse one response head out of `buf`, given whether the request it
    /// answers was a `HEAD` (needed by the body-length algorithm).
    pub fn feed(&mut self, buf: &mut Buf, is_head: bool)
        -> Result<Option<ResponseHead>, Error>
    {
        if buf.len() > self.total_max {
            return Err(Error::Policy("response-head-total-max exceeded"));
        }
        let _ = Self::fast_version(&buf[..]);

        let mut small = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let mut large;
        let (minor, code, reason, headers_owned, set_cookies, bytes) = {
            let mut resp = httparse::Response::new(&mut small);
            let mut result = resp.parse(&buf[..]);
            if matches!(result, Err(httparse::Error::TooManyHeaders)) {
                large = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
                resp = httparse::Response::new(&mut large);
                result = resp.parse(&buf[..]);
            }
            match result? {
                httparse::Status::Complete(bytes) => {
                    let minor = resp.version.expect("version set on Complete");
                    let code = resp.code.expect("code set on Complete");
                    let reason = resp.reason.expect("reason set on Complete")
                        .to_string();
                    let mut owned = Vec::with_capacity(resp.headers.len());
                    let mut cookies = Vec::new();
                    for h in resp.headers.iter() {
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
                        if h.name.eq_ignore_ascii_case("Set-Cookie") {
                            cookies.push(value.to_string());
                        } else {
                            owned.push((h.name.to_string(), value.to_string()));
                        }
                    }
                    (minor, code, reason, owned, cookies, bytes)
                }
                httparse::Status::Partial => return Ok(None),
            }
        };

        let version = if minor == 1 { Version::Http11 } else { Version::Http10 };
        let mut headers = HeaderMap::new();
        for (name, value) in headers_owned.iter() {
            headers.append(name, value);
        }
        let raw_for_scan: Vec<httparse::Header> = headers.iter()
            .map(|&(ref n, ref v)| httparse::Header { name: n.as_str(), value: v.as_bytes() })
            .collect();
        let (body_kind, close_from_conn) = response_body_length(is_head, code, &raw_for_scan)?;

        buf.consume(bytes);
        Ok(Some(ResponseHead {
            version: version,
            code: code,
            reason: reason,
            headers: headers,
            set_cookies: set_cookies,
            body_kind: body_kind,
            connection_close: close_from_conn || version == Version::Http10,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::ResponseParser;
    use netbuf::Buf;
    use std::io::Write;

    fn feed(data: &[u8], is_head: bool) -> super::ResponseHead {
        let mut p = ResponseParser::new(8192, 32768);
        let mut buf = Buf::new();
        buf.write_all(data).unwrap();
        p.feed(&mut buf, is_head).unwrap().expect("complete head")
    }

    #[test]
    fn minimal_ok() {
        let head = feed(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n", false);
        assert_eq!(head.code, 200);
        assert_eq!(head.reason, "OK");
    }

    #[test]
    fn set_cookie_kept_separate() {
        let head = feed(
            b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\
              Content-Length: 0\r\n\r\n",
            false,
        );
        assert_eq!(head.set_cookies, vec!["a=1".to_string(), "b=2".to_string()]);
        assert!(!head.headers.contains("Set-Cookie"));
    }

    #[test]
    fn head_response_has_no_body() {
        use super::super::body_kind::BodyKind;
        let head = feed(
            b"HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\n",
            true,
        );
        assert_eq!(head.body_kind, BodyKind::Fixed(0));
    }

    #[test]
    fn http10_always_closes() {
        let head = feed(b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n", false);
        assert!(head.connection_close);
    }
}

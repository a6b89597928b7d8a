use std::fmt;

/// HTTP request method as a case-sensitive token.
///
/// Common methods are interned as variants; anything else round-trips
/// through `Other` so the wire codec never has to reject a method it
/// doesn't recognize by name (unsupported methods are rejected by
/// configuration, not by this type).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Trace,
    Connect,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        use self::Method::*;
        match *self {
            Options => "OPTIONS",
            Get => "GET",
            Head => "HEAD",
            Post => "POST",
            Put => "PUT",
            Patch => "PATCH",
            Delete => "DELETE",
            Trace => "TRACE",
            Connect => "CONNECT",
            Other(ref s) => s,
        }
    }

    /// `true` for methods that, per the body-length algorithm, never carry
    /// a response body (only `HEAD` needs this treatment at the wire level).
    pub fn is_head(&self) -> bool {
        matches!(*self, Method::Head)
    }

    pub fn is_connect(&self) -> bool {
        matches!(*self, Method::Connect)
    }
}

impl<'a> From<&'a str> for Method {
    fn from(s: &'a str) -> Method {
        match s {
            "OPTIONS" => Method::Options,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            s => Method::Other(s.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token-char check used both for methods and header names (RFC 7230 ).
pub fn is_token_char(b: u8) -> bool {
    match b {
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' |
        b'.' | b'^' | b'_' | b'`' | b'|' | b'~' => true,
        b'0'...b'9' | b'a'...b'z' | b'A'...b'Z' => true,
        _ => false,
    }
}

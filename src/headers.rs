//! Low-level header byte matching plus the `HeaderMap` exposed on
//! `Request`/`Response` values.
#[allow(unused_imports)]
use std::ascii::AsciiExt;
use std::fmt;

use enums::method::is_token_char;

// header value is byte sequence
// we need case insensitive comparison and strip out of the whitespace
pub fn is_close(val: &[u8]) -> bool {
    if val.len() < "close".len() {
        return false;
    }
    let mut iter = val.iter();
    for (idx, &ch) in iter.by_ref().enumerate() {
        match ch {
            b'\r' | b'\n' | b' ' | b'\t' => continue,
            b'c' | b'C' => {
                if idx + "close".len() > val.len() {
                    return false;
                }
                break;
            }
            _ => return false,
        }
    }
    for (idx, ch) in iter.by_ref().take(4).enumerate() {
        if b"lose"[idx] != ch.to_ascii_lowercase() {
            return false;
        }
    }
    for &ch in iter {
        if !matches!(ch, b'\r' | b'\n' | b' ' | b'\t') {
            return false;
        }
    }
    return true;
}

// header value is byte sequence
// we need case insensitive comparison and strip out of the whitespace
pub fn is_chunked(val: &[u8]) -> bool {
    if val.len() < "chunked".len() {
        return false;
    }
    let mut iter = val.iter();
    for (idx, &ch) in iter.by_ref().enumerate() {
        match ch {
            b'\r' | b'\n' | b' ' | b'\t' => continue,
            b'c' | b'C' => {
                if idx + "chunked".len() > val.len() {
                    return false;
                }
                break;
            }
            _ => return false,
        }
    }
    for (idx, ch) in iter.by_ref().take(6).enumerate() {
        if b"hunked"[idx] != ch.to_ascii_lowercase() {
            return false;
        }
    }
    for &ch in iter {
        if !matches!(ch, b'\r' | b'\n' | b' ' | b'\t') {
            return false;
        }
    }
    return true;
}

// header value is byte sequence
// we need case insensitive comparison and strip out of the whitespace
pub fn is_continue(val: &[u8]) -> bool {
    if val.len() < "100-continue".len() {
        return false;
    }
    let mut iter = val.iter();
    for (idx, &ch) in iter.by_ref().enumerate() {
        match ch {
            b'\r' | b'\n' | b' ' | b'\t' => continue,
            b'1' => {
                if idx + "100-continue".len() > val.len() {
                    return false;
                }
                break;
            }
            _ => return false,
        }
    }
    for (idx, ch) in iter.by_ref().take(11).enumerate() {
        if b"00-continue"[idx] != ch.to_ascii_lowercase() {
            return false;
        }
    }
    for &ch in iter {
        if !matches!(ch, b'\r' | b'\n' | b' ' | b'\t') {
            return false;
        }
    }
    return true;
}

/// `true` when every byte is a valid header-name token char (P2).
pub fn is_valid_name(name: &[u8]) -> bool {
    !name.is_empty() && name.len() <= 64 && name.iter().cloned().all(is_token_char)
}

/// `true` when the value contains no bare CR or LF (P2). Folded values
/// are collapsed to single spaces by the parser before this ever runs.
pub fn is_valid_value(value: &[u8]) -> bool {
    value.iter().all(|&b| b != b'\r' && b != b'\n')
}

/// A case-insensitive, insertion-ordered header map with a single value
/// per name.
///
/// Multiple on-wire headers sharing a name are joined with `", "` while
/// parsing -- this map never stores more than
/// one value per name. `Set-Cookie` is the one header that must *not* be
/// collapsed this way, so it is kept out of this map entirely and carried
/// as its own list on `Response`.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> HeaderMap {
        HeaderMap { entries: Vec::new() }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|&(ref n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Insert a freshly-seen header, joining onto any existing value with
 /// `", "` as RFC 7230 allows for list-valued fields.
    pub fn append(&mut self, name: &str, value: &str) {
        if let Some(idx) = self.find(name) {
            self.entries[idx].1.push_str(", ");
            self.entries[idx].1.push_str(value);
        } else {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    /// Overwrite (or insert) a single value for `name`, discarding any
    /// earlier occurrences. Used by filters that normalize a header.
    pub fn set(&mut self, name: &str, value: &str) {
        self.remove(name);
        self.entries.push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).map(|idx| self.entries[idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.find(name).map(|idx| self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> ::std::slice::Iter<(String, String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` iff the `Connection` header (if any) lists `close`.
    pub fn connection_close(&self) -> bool {
        self.get("Connection").map(|v| is_close(v.as_bytes())).unwrap_or(false)
    }
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &(ref k, ref v) in &self.entries {
            writeln!(f, "{}: {}", k, v)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = &'a (String, String);
    type IntoIter = ::std::slice::Iter<'a, (String, String)>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use super::{is_chunked, is_close, is_continue, HeaderMap};

    #[test]
    fn test_chunked() {
        assert!(is_chunked(b"chunked"));
        assert!(is_chunked(b"Chunked"));
        assert!(is_chunked(b"chuNKED"));
        assert!(is_chunked(b"CHUNKED"));
        assert!(is_chunked(b"   CHUNKED"));
        assert!(is_chunked(b"   CHUNKED  "));
        assert!(is_chunked(b"chunked  "));
        assert!(is_chunked(b"   CHUNKED"));
        assert!(!is_chunked(b"   CHUNKED 1 "));
    }

    #[test]
    fn test_close() {
        assert!(is_close(b"close"));
        assert!(is_close(b"Close"));
        assert!(is_close(b"clOSE"));
        assert!(is_close(b"CLOSE"));
        assert!(is_close(b" CLOSE"));
        assert!(is_close(b"   close   "));
        assert!(!is_close(b"Close  1 "));
        assert!(!is_close(b" xclose   "));
    }

    #[test]
    fn test_continue() {
        assert!(is_continue(b"100-continue"));
        assert!(is_continue(b"100-Continue"));
        assert!(is_continue(b"100-conTINUE"));
        assert!(is_continue(b"100-CONTINUE"));
        assert!(is_continue(b"  100-CONTINUE"));
        assert!(is_continue(b"   100-continue   "));
        assert!(!is_continue(b"100-continue y  "));
        assert!(!is_continue(b"100-coztinue   "));
    }

    #[test]
    fn header_map_joins_duplicates() {
        let mut h = HeaderMap::new();
        h.append("X-Forwarded-For", "1.1.1.1");
        h.append("x-forwarded-for", "2.2.2.2");
        assert_eq!(h.get("X-Forwarded-For"), Some("1.1.1.1, 2.2.2.2"));
    }

    #[test]
    fn header_map_set_replaces() {
        let mut h = HeaderMap::new();
        h.append("Accept-Encoding", "identity");
        h.set("Accept-Encoding", "gzip");
        assert_eq!(h.get("Accept-Encoding"), Some("gzip"));
    }

    #[test]
    fn header_map_is_case_insensitive() {
        let mut h = HeaderMap::new();
        h.append("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert!(h.contains("CONTENT-TYPE"));
    }
}

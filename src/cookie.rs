//! Cookie subsystem: the immutable `Cookie` value, the
//! server-side per-request jar, and the client-side shared store.
use std::collections::HashMap;
use std::sync::Mutex;

/// Identity for replacement purposes is `{name, domain, path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// `None` means session cookie; `Some(n)` with `n <= 0` means delete.
    pub max_age: Option<i64>,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: &str, value: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            max_age: None,
            domain: String::new(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
        }
    }

    pub fn deleted(name: &str, domain: &str, path: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: "DELETE".to_string(),
            max_age: Some(0),
            domain: domain.to_string(),
            path: path.to_string(),
            secure: false,
            http_only: false,
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.max_age.map(|n| n <= 0).unwrap_or(false)
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_set_cookie(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if !self.domain.is_empty() {
            out.push_str(&format!("; Domain={}", self.domain));
        }
        out.push_str(&format!("; Path={}", self.path));
        if let Some(age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", age));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }

    /// Parse one `Cookie:` header value into `name=value` pairs (RFC 6265
 /// ); no attributes travel in the request direction.
    pub fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
        value.split(';')
            .filter_map(|pair| {
                let pair = pair.trim();
                let mut it = pair.splitn(2, '=');
                match (it.next(), it.next()) {
                    (Some(n), Some(v)) if !n.is_empty() => {
                        Some((n.to_string(), v.to_string()))
                    }
                    _ => None,
                }
            })
            .collect()
    }

 /// Parse one `Set-Cookie:` header value (RFC 6265 ). Unknown
    /// attributes are ignored; `default_domain`/`default_path` are the
    /// host and request path used when `Domain`/`Path` are absent.
    pub fn parse_set_cookie(value: &str, default_domain: &str, default_path: &str)
        -> Option<Cookie>
    {
        let mut parts = value.split(';');
        let first = parts.next()?.trim();
        let mut it = first.splitn(2, '=');
        let name = it.next()?.trim().to_string();
        let val = it.next().unwrap_or("").trim().to_string();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(&name, &val);
        cookie.domain = default_domain.to_string();
        cookie.path = default_path.to_string();
        for attr in parts {
            let attr = attr.trim();
            let mut kv = attr.splitn(2, '=');
            let key = kv.next().unwrap_or("").trim();
            let val = kv.next().map(|s| s.trim());
            if key.eq_ignore_ascii_case("Domain") {
                if let Some(d) = val {
                    cookie.domain = d.trim_start_matches('.').to_lowercase();
                }
            } else if key.eq_ignore_ascii_case("Path") {
                if let Some(p) = val {
                    cookie.path = p.to_string();
                }
            } else if key.eq_ignore_ascii_case("Max-Age") {
                if let Some(a) = val.and_then(|a| a.parse().ok()) {
                    cookie.max_age = Some(a);
                }
            } else if key.eq_ignore_ascii_case("Secure") {
                cookie.secure = true;
            } else if key.eq_ignore_ascii_case("HttpOnly") {
                cookie.http_only = true;
            }
        }
        Some(cookie)
    }
}

/// `is-public-suffix(domain) -> bool` oracle: cookies must never be set for a bare public suffix.
pub trait PublicSuffix: Send + Sync {
    fn is_public_suffix(&self, domain: &str) -> bool;
}

/// A small built-in table covering the common multi-label suffixes.
/// Good enough for tests and typical deployments; applications that need
/// the full Mozilla list provide their own `PublicSuffix`.
pub struct BuiltinPublicSuffix;

const BUILTIN_SUFFIXES: &'static [&'static str] = &[
    "com", "org", "net", "edu", "gov", "io",
    "co.uk", "org.uk", "gov.uk", "com.au", "net.au", "org.au",
    "github.io", "herokuapp.com", "appspot.com",
];

impl PublicSuffix for BuiltinPublicSuffix {
    fn is_public_suffix(&self, domain: &str) -> bool {
        let domain = domain.trim_start_matches('.').to_lowercase();
        BUILTIN_SUFFIXES.iter().any(|&s| s == domain)
    }
}

/// RFC 6265 : `request_domain` matches `cookie_domain` either
/// exactly or as a subdomain of it.
pub fn domain_matches(request_domain: &str, cookie_domain: &str) -> bool {
    if cookie_domain.is_empty() {
        return false;
    }
    let request_domain = request_domain.to_lowercase();
    let cookie_domain = cookie_domain.to_lowercase();
    if request_domain == cookie_domain {
        return true;
    }
    request_domain.ends_with(&format!(".{}", cookie_domain))
}

/// RFC 6265 : `request_path` matches `cookie_path` as an exact
/// match, a directory prefix, or (when `cookie_path` ends in `/`) a
/// straightforward prefix.
pub fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    if request_path.starts_with(cookie_path) {
        if cookie_path.ends_with('/') {
            return true;
        }
        if request_path.as_bytes().get(cookie_path.len()) == Some(&b'/') {
            return true;
        }
    }
    false
}

/// The default-path algorithm (RFC 6265 ) for a request whose
/// `Set-Cookie` response omitted `Path`.
pub fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') || request_path == "/" {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Per-request, fiber-local jar. Initialized lazily from the
/// request's `Cookie` header, keyed by `{domain, path}` so a handler's
/// `put`/`remove` always resolves against the current request's scope.
pub struct CookieJar {
    domain: String,
    path: String,
    incoming: HashMap<String, String>,
    changes: HashMap<String, Cookie>,
}

impl CookieJar {
    pub fn new(domain: String, path: String, incoming: Vec<(String, String)>)
        -> CookieJar
    {
        CookieJar {
            domain: domain,
            path: path,
            incoming: incoming.into_iter().collect(),
            changes: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.changes.get(name)
            .filter(|c| !c.is_deletion())
            .map(|c| c.value.as_str())
            .or_else(|| self.incoming.get(name).map(|v| v.as_str()))
    }

    pub fn put(&mut self, name: &str, value: &str) {
        let mut cookie = Cookie::new(name, value);
        cookie.domain = self.domain.clone();
        cookie.path = self.path.clone();
        self.changes.insert(name.to_string(), cookie);
    }

    pub fn remove(&mut self, name: &str) {
        self.changes.insert(
            name.to_string(),
            Cookie::deleted(name, &self.domain, &self.path),
        );
    }

    pub fn clear(&mut self) {
        let names: Vec<String> = self.incoming.keys().cloned()
            .chain(self.changes.keys().cloned())
            .collect();
        for name in names {
            self.remove(&name);
        }
    }

    /// The accumulated `Set-Cookie` values to append to the outgoing
    /// response.
    pub fn pending_set_cookies(&self) -> Vec<String> {
        self.changes.values().map(|c| c.to_set_cookie()).collect()
    }
}

/// Client-side shared store. Sharded by domain with one
/// mutex per shard so lookups for unrelated domains never contend --
/// the "fine-grained synchronization" called for in
pub struct CookieStorage {
    shards: Vec<Mutex<HashMap<String, Vec<Cookie>>>>,
}

const SHARD_COUNT: usize = 16;

impl CookieStorage {
    pub fn new() -> CookieStorage {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for _ in 0..SHARD_COUNT {
            shards.push(Mutex::new(HashMap::new()));
        }
        CookieStorage { shards: shards }
    }

    fn shard_for(&self, domain: &str) -> &Mutex<HashMap<String, Vec<Cookie>>> {
        let mut hash: u64 = 5381;
        for b in domain.bytes() {
            hash = hash.wrapping_mul(33).wrapping_add(b as u64);
        }
        &self.shards[(hash as usize) % self.shards.len()]
    }

    /// Store (or update, by `{name, domain, path}` identity) a cookie
    /// received from a response. A deletion (`max_age <= 0`) removes the
    /// matching entry instead.
    pub fn store(&self, cookie: Cookie) {
        let shard = self.shard_for(&cookie.domain);
        let mut map = shard.lock().expect("cookie shard mutex poisoned");
        let bucket = map.entry(cookie.domain.clone()).or_insert_with(Vec::new);
        bucket.retain(|c| !(c.name == cookie.name && c.path == cookie.path));
        if !cookie.is_deletion() {
            bucket.push(cookie);
        }
    }

    /// Cookies eligible for a request to `(host, path, secure)` (RFC 6265
 /// , with a public-suffix cut-off applied by the caller
    /// before ever calling `store`).
    pub fn matching(&self, host: &str, path: &str, secure: bool) -> Vec<Cookie> {
        let mut result = Vec::new();
        for shard in &self.shards {
            let map = shard.lock().expect("cookie shard mutex poisoned");
            for bucket in map.values() {
                for cookie in bucket {
                    if domain_matches(host, &cookie.domain)
                        && path_matches(path, &cookie.path)
                        && (cookie.secure == false || secure)
                    {
                        result.push(cookie.clone());
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn domain_match_exact_and_subdomain() {
        assert!(domain_matches("example.com", "example.com"));
        assert!(domain_matches("www.example.com", "example.com"));
        assert!(!domain_matches("notexample.com", "example.com"));
    }

    #[test]
    fn path_match_prefix_rules() {
        assert!(path_matches("/foo/bar", "/foo"));
        assert!(path_matches("/foo", "/foo"));
        assert!(!path_matches("/foobar", "/foo"));
        assert!(path_matches("/foo/bar", "/foo/"));
    }

    #[test]
    fn default_path_strips_last_segment() {
        assert_eq!(default_path("/a/b/c"), "/a/b");
        assert_eq!(default_path("/a"), "/");
        assert_eq!(default_path("/"), "/");
    }

    #[test]
    fn builtin_public_suffix_table() {
        let ps = BuiltinPublicSuffix;
        assert!(ps.is_public_suffix("com"));
        assert!(ps.is_public_suffix("co.uk"));
        assert!(!ps.is_public_suffix("example.com"));
    }

    #[test]
    fn jar_put_then_get_overrides_incoming() {
        let mut jar = CookieJar::new(
            "example.com".to_string(), "/".to_string(),
            vec![("a".to_string(), "1".to_string())],
        );
        assert_eq!(jar.get("a"), Some("1"));
        jar.put("a", "2");
        assert_eq!(jar.get("a"), Some("2"));
        jar.remove("a");
        assert_eq!(jar.get("a"), None);
    }

    #[test]
    fn storage_matches_by_domain_path_secure() {
        let storage = CookieStorage::new();
        let mut c = Cookie::new("sid", "abc");
        c.domain = "example.com".to_string();
        c.path = "/".to_string();
        c.secure = true;
        storage.store(c);
        assert_eq!(storage.matching("www.example.com", "/", true).len(), 1);
        assert_eq!(storage.matching("www.example.com", "/", false).len(), 0);
        assert_eq!(storage.matching("other.com", "/", true).len(), 0);
    }

    #[test]
    fn storage_delete_removes_entry() {
        let storage = CookieStorage::new();
        let mut c = Cookie::new("sid", "abc");
        c.domain = "example.com".to_string();
        storage.store(c.clone());
        let mut del = c.clone();
        del.max_age = Some(0);
        storage.store(del);
        assert_eq!(storage.matching("example.com", "/", false).len(), 0);
    }

    #[test]
    fn parse_set_cookie_attributes() {
        let c = Cookie::parse_set_cookie(
            "sid=abc; Domain=.example.com; Path=/app; Max-Age=3600; Secure; HttpOnly",
            "fallback.com", "/",
        ).unwrap();
        assert_eq!(c.name, "sid");
        assert_eq!(c.domain, "example.com");
        assert_eq!(c.path, "/app");
        assert_eq!(c.max_age, Some(3600));
        assert!(c.secure);
        assert!(c.http_only);
    }
}

//! Immutable request snapshot plus the mutable builder used at the
//! transport boundary.
use std::net::SocketAddr;

use body::Entity;
use cookie::Cookie;
use enums::{Method, Version};
use headers::HeaderMap;

/// The four forms a request-target may take (RFC 7230), resolved
/// once out of `wire::RequestTarget` and stored owned on the snapshot.
#[derive(Debug, Clone)]
pub enum Target {
    Origin(String),
    Absolute { scheme: String, authority: String, path: String },
    Authority(String),
    Asterisk,
}

/// An immutable view of a parsed request, handed to filters and the
/// handler. Everything here is a snapshot; mutating a request means
/// building a new one via `RequestBuilder` (the filter chain does this
/// on every hop of a redirect, for instance).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: Target,
    version: Version,
    host: String,
    scheme: String,
    peer_addr: Option<SocketAddr>,
    tls_peer_certs: Vec<Vec<u8>>,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
}

impl Request {
    pub fn method(&self) -> &Method { &self.method }
    pub fn target(&self) -> &Target { &self.target }
    pub fn version(&self) -> Version { self.version }
    pub fn host(&self) -> &str { &self.host }
    pub fn scheme(&self) -> &str { &self.scheme }
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.peer_addr }
    pub fn tls_peer_certs(&self) -> &[Vec<u8>] { &self.tls_peer_certs }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn cookies(&self) -> &[Cookie] { &self.cookies }

    /// Path component used for routing/logging: the origin-form path, or
    /// the absolute-form path when sent through a proxy, or `"*"`/the
    /// authority string otherwise.
    pub fn path(&self) -> &str {
        match self.target {
            Target::Origin(ref p) => p,
            Target::Absolute { ref path, .. } => path,
            Target::Authority(ref a) => a,
            Target::Asterisk => "*",
        }
    }

    /// `client_ip()` peels `x_forward_level` hops off the front of
    /// `X-Forwarded-For` before falling back to the
    /// transport peer address.
    pub fn client_ip(&self, x_forward_level: usize) -> Option<String> {
        if x_forward_level > 0 {
            if let Some(xff) = self.headers.get("X-Forwarded-For") {
                let hops: Vec<&str> = xff.split(',').map(|s| s.trim()).collect();
                if hops.len() >= x_forward_level {
                    return Some(hops[hops.len() - x_forward_level].to_string());
                }
            }
        }
        self.peer_addr.map(|a| a.ip().to_string())
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }
}

/// Mutable builder used at the parser/filter boundary; the core only ever
/// consumes the immutable `Request` produced by `.done()`.
pub struct RequestBuilder {
    method: Method,
    target: Target,
    version: Version,
    host: String,
    scheme: String,
    peer_addr: Option<SocketAddr>,
    tls_peer_certs: Vec<Vec<u8>>,
    headers: HeaderMap,
    entity: Option<Entity>,
    cookies: Vec<Cookie>,
}

impl RequestBuilder {
    pub fn new() -> RequestBuilder {
        RequestBuilder {
            method: Method::Get,
            target: Target::Origin("/".to_string()),
            version: Version::Http11,
            host: String::new(),
            scheme: "http".to_string(),
            peer_addr: None,
            tls_peer_certs: Vec::new(),
            headers: HeaderMap::new(),
            entity: None,
            cookies: Vec::new(),
        }
    }

    pub fn method(&mut self, m: Method) -> &mut Self { self.method = m; self }
    pub fn target(&mut self, t: Target) -> &mut Self { self.target = t; self }
    pub fn version(&mut self, v: Version) -> &mut Self { self.version = v; self }
    pub fn host(&mut self, h: String) -> &mut Self { self.host = h; self }
    pub fn scheme(&mut self, s: String) -> &mut Self { self.scheme = s; self }
    pub fn peer_addr(&mut self, a: SocketAddr) -> &mut Self {
        self.peer_addr = Some(a);
        self
    }
    pub fn tls_peer_certs(&mut self, certs: Vec<Vec<u8>>) -> &mut Self {
        self.tls_peer_certs = certs;
        self
    }
    pub fn headers(&mut self, h: HeaderMap) -> &mut Self { self.headers = h; self }
    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.set(name, value);
        self
    }
    pub fn entity(&mut self, e: Entity) -> &mut Self { self.entity = Some(e); self }
    pub fn cookies(&mut self, c: Vec<Cookie>) -> &mut Self { self.cookies = c; self }

    pub fn done(self) -> Request {
        Request {
            method: self.method,
            target: self.target,
            version: self.version,
            host: self.host,
            scheme: self.scheme,
            peer_addr: self.peer_addr,
            tls_peer_certs: self.tls_peer_certs,
            headers: self.headers,
            cookies: self.cookies,
        }
    }

    pub fn entity_taken(self) -> (Request, Option<Entity>) {
        let entity = self.entity;
        let req = Request {
            method: self.method,
            target: self.target,
            version: self.version,
            host: self.host,
            scheme: self.scheme,
            peer_addr: self.peer_addr,
            tls_peer_certs: self.tls_peer_certs,
            headers: self.headers,
            cookies: self.cookies,
        };
        (req, entity)
    }
}

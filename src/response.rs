//! Immutable response snapshot plus its builder.
use body::Entity;
use enums::{HttpStatus, Status};
use headers::HeaderMap;

/// A response. `status` must not be 1xx at this level -- informational
/// responses are driver-internal (the 100-Continue handshake lives in
/// `server::proto`).
pub struct Response {
    code: u16,
    reason: String,
    headers: HeaderMap,
    set_cookies: Vec<String>,
    entity: Option<Entity>,
}

impl Response {
    pub fn code(&self) -> u16 { self.code }
    pub fn reason(&self) -> &str { &self.reason }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn set_cookies(&self) -> &[String] { &self.set_cookies }
    pub fn entity(&self) -> Option<&Entity> { self.entity.as_ref() }
    pub fn entity_mut(&mut self) -> Option<&mut Entity> { self.entity.as_mut() }
    pub fn take_entity(&mut self) -> Option<Entity> { self.entity.take() }
    pub fn set_entity(&mut self, e: Entity) { self.entity = Some(e); }

    pub fn builder(status: Status) -> ResponseBuilder {
        ResponseBuilder::new(status.code(), status.reason().to_string())
    }

    pub fn with_code(code: u16, reason: &str) -> ResponseBuilder {
        assert!(code != 100, "100 (Continue) is not a valid final status");
        ResponseBuilder::new(code, reason.to_string())
    }
}

pub struct ResponseBuilder {
    code: u16,
    reason: String,
    headers: HeaderMap,
    set_cookies: Vec<String>,
    entity: Option<Entity>,
}

impl ResponseBuilder {
    fn new(code: u16, reason: String) -> ResponseBuilder {
        ResponseBuilder {
            code: code,
            reason: reason,
            headers: HeaderMap::new(),
            set_cookies: Vec::new(),
            entity: None,
        }
    }

    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    pub fn set_cookie(&mut self, value: String) -> &mut Self {
        self.set_cookies.push(value);
        self
    }

    pub fn entity(&mut self, e: Entity) -> &mut Self {
        self.entity = Some(e);
        self
    }

    pub fn done(self) -> Response {
        Response {
            code: self.code,
            reason: self.reason,
            headers: self.headers,
            set_cookies: self.set_cookies,
            entity: self.entity,
        }
    }
}

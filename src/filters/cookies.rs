//! Innermost filter: loads matching cookies onto the outgoing request and
//! stores `Set-Cookie`s from the response into the shared
//! `cookie::CookieStorage`.
use std::sync::Arc;

use context::Context;
use cookie::{Cookie, CookieStorage};
use request::Request;
use response::Response;

use super::{Filter, Outcome};

pub struct Cookies {
    storage: Arc<CookieStorage>,
}

impl Cookies {
    pub fn new() -> Cookies {
        Cookies { storage: Arc::new(CookieStorage::new()) }
    }

    pub fn with_storage(storage: Arc<CookieStorage>) -> Cookies {
        Cookies { storage: storage }
    }

    pub fn storage(&self) -> &Arc<CookieStorage> {
        &self.storage
    }
}

impl Filter for Cookies {
    fn name(&self) -> &'static str { "cookies" }

    fn on_request(&self, req: &mut Request, _ctx: &mut Context) {
        let secure = req.scheme() == "https";
        let matching = self.storage.matching(req.host(), req.path(), secure);
        if matching.is_empty() {
            return;
        }
        let value = matching.iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        req.headers_mut().set("Cookie", &value);
    }

    fn on_response(&self, req: &Request, resp: Response, _ctx: &mut Context) -> Outcome {
        let default_path = ::cookie::default_path(req.path());
        for raw in resp.set_cookies() {
            if let Some(cookie) = Cookie::parse_set_cookie(raw, req.host(), &default_path) {
                self.storage.store(cookie);
            }
        }
        Outcome::Done(resp)
    }
}

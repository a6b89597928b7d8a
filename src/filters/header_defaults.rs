//! Outermost filter: injects the connection-level defaults every
//! outgoing request should carry unless the caller already set them
//! explicitly.
use context::Context;
use request::Request;

use super::Filter;

pub struct HeaderDefaults {
    user_agent: String,
    keep_alive: bool,
}

impl HeaderDefaults {
    pub fn new() -> HeaderDefaults {
        HeaderDefaults { user_agent: "bayou.io".to_string(), keep_alive: true }
    }

    pub fn user_agent(mut self, value: &str) -> Self {
        self.user_agent = value.to_string();
        self
    }

    pub fn keep_alive(mut self, value: bool) -> Self {
        self.keep_alive = value;
        self
    }
}

impl Filter for HeaderDefaults {
    fn name(&self) -> &'static str { "header-defaults-and-connection" }

    fn on_request(&self, req: &mut Request, _ctx: &mut Context) {
        if !req.headers().contains("Accept-Encoding") {
            req.headers_mut().set("Accept-Encoding", "gzip");
        }
        if !req.headers().contains("User-Agent") {
            req.headers_mut().set("User-Agent", &self.user_agent);
        }
        if !req.headers().contains("Connection") {
            let value = if self.keep_alive { "keep-alive" } else { "close" };
            req.headers_mut().set("Connection", value);
        }
    }
}

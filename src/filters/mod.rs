//! Client-side filter pipeline, outermost to innermost:
//! `header_defaults -> redirect -> auth -> cookies -> gzip -> raw-sender`.
//!
//! Each filter gets a chance to adjust the outgoing request before it is
//! handed to the next one down, and a chance to react to the response on
//! the way back up. A filter that wants the whole exchange redone against
//! a different request (redirect following, an auth challenge retry)
//! returns `Outcome::Retry`; driving that retry against the pool is the
//! caller's job (`Pipeline` only describes the decision, it does not own
//! a connection).
pub mod auth;
pub mod cookies;
pub mod gzip;
pub mod header_defaults;
pub mod redirect;

use body::Body;
use context::Context;
use request::Request;
use response::Response;

/// What a filter wants to happen to the in-flight exchange.
pub enum Outcome {
    /// Hand this response up to the next filter (or, at the top, to the
    /// caller).
    Done(Response),
    /// Abandon the current response and send this request instead, then
    /// re-enter the pipeline from the top. Carries whatever body the
    /// abandoned response still had so the caller can drain it (bounded)
    /// before reusing that connection for the retry.
    Retry(Request, Option<Body>),
}

/// One link of the chain. Filters are applied in pipeline order on the
/// way out (`on_request`) and in reverse on the way back
/// (`on_response` is called innermost-first by `Pipeline::on_response`).
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Adjust the outgoing request. Most filters only touch headers here.
    fn on_request(&self, _req: &mut Request, _ctx: &mut Context) {}

    /// React to the response. The default just passes it through
    /// unchanged.
    fn on_response(&self, _req: &Request, resp: Response, _ctx: &mut Context) -> Outcome {
        Outcome::Done(resp)
    }
}

/// An ordered chain of filters, built with the outermost filter pushed
/// first (`header_defaults`) and the innermost last (`cookies`), matching
/// the order they're listed in above.
pub struct Pipeline {
    filters: Vec<Box<Filter>>,
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Box<Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Outermost-first, matching the order requests are conceptually
    /// decorated on their way out.
    pub fn prepare_request(&self, req: &mut Request, ctx: &mut Context) {
        for filter in &self.filters {
            filter.on_request(req, ctx);
        }
    }

    /// Innermost-first: `cookies` sees the raw response before `redirect`
    /// or `auth` get a chance to turn it into a retry.
    pub fn on_response(&self, req: &Request, mut resp: Response, ctx: &mut Context) -> Outcome {
        for filter in self.filters.iter().rev() {
            match filter.on_response(req, resp, ctx) {
                Outcome::Done(r) => resp = r,
                retry @ Outcome::Retry(..) => return retry,
            }
        }
        Outcome::Done(resp)
    }
}

/// The default chain. `auth-proxy` is intentionally the same
/// `auth::Auth` filter as `auth-server`: this engine has no separate
/// proxy-credential cache, so both hops share one (an accepted
/// simplification, see `DESIGN.md`). `gzip` is pushed innermost so it
/// inflates the body before any other filter's `on_response` runs.
pub fn default_pipeline(max_redirects: usize) -> Pipeline {
    let mut p = Pipeline::new();
    p.push(Box::new(header_defaults::HeaderDefaults::new()));
    p.push(Box::new(redirect::Redirect::new(max_redirects)));
    p.push(Box::new(auth::Auth::new()));
    p.push(Box::new(cookies::Cookies::new()));
    p.push(Box::new(gzip::Gzip::new()));
    p
}

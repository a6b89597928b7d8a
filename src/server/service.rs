//! Handler registration surface, generalized from `server::buffered`'s
//! `NewService`/`Service` traits to the `Request`/`Response` data model.
use futures::Future;

use body::Entity;
use context::Context;
use error::Error;
use request::Request;
use response::Response;

/// One HTTP exchange. Implementations get the fully assembled request,
/// its body (if any, already buffered per the connection's `RecvMode`),
/// and the per-request `Context` (trace id, cookie jar), and produce a
/// response.
pub trait Service: Send + 'static {
    type Future: Future<Item=(Response, Context), Error=Error>;
    fn call(&mut self, request: Request, body: Option<Entity>, ctx: Context) -> Self::Future;
}

/// Any `FnMut(Request, Option<Entity>, Context) -> Future<Item=(Response,
/// Context)>` is a `Service`, mirroring the blanket impl
/// `server::buffered` gives plain closures.
impl<T, F> Service for T
    where T: FnMut(Request, Option<Entity>, Context) -> F + Send + 'static,
          F: Future<Item=(Response, Context), Error=Error>,
{
    type Future = F;
    fn call(&mut self, request: Request, body: Option<Entity>, ctx: Context) -> F {
        (self)(request, body, ctx)
    }
}

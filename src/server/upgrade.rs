//! Connection hand-off hook for `CONNECT` and `Upgrade:` requests.
//!
//! Generalizes `server::buffered`'s `hijack()`/`WebsocketFactory` shape
//! from "websocket, specifically" to "any registered upgrade". The
//! driver never parses or frames the upgraded protocol itself -- once
//! `Upgrader::upgrade` is called the split socket belongs to the
//! upgrader, same as `hijack(write_buf, read_buf)` handed it over before.
use tk_bufstream::{ReadBuf, WriteBuf};
use tokio_io::{AsyncRead, AsyncWrite};

use request::Request;

/// Decides whether a request wants the connection hijacked, and takes
/// ownership of the split socket when it does.
pub trait Upgrader<S: AsyncRead + AsyncWrite>: Send + 'static {
    /// Inspect the request (already fully read, including any body) and
    /// either accept the hand-off or decline it so the driver proceeds
    /// with a normal response.
    fn wants_upgrade(&self, req: &Request) -> bool;

    /// Take ownership of the connection. Called after the response head
    /// that accepts the upgrade (e.g. `101 Switching Protocols`, or the
    /// `2xx` that ends a `CONNECT` request) has already been flushed to
    /// the socket by the driver.
    fn upgrade(&mut self, req: Request, cout: WriteBuf<S>, cin: ReadBuf<S>);
}

/// An `Upgrader` that never accepts a hand-off; the default when a
/// server is built without one.
pub struct NoUpgrades;

impl<S: AsyncRead + AsyncWrite> Upgrader<S> for NoUpgrades {
    fn wants_upgrade(&self, _req: &Request) -> bool { false }
    fn upgrade(&mut self, _req: Request, _cout: WriteBuf<S>, _cin: ReadBuf<S>) {
        unreachable!("wants_upgrade() returned false")
    }
}

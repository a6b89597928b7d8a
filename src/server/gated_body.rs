//! `BodySource` backing the `Expect: 100-continue` gate.
//!
//! The driver defers reading a gated request's body until the handler
//! actually asks for it (`GatedBody::poll_chunk`'s first call flips the
//! shared `ContinueGate`, which `Proto::maybe_send_continue` watches for
//! before writing the interim `100 Continue` line). Bytes the driver
//! reads off the connection arrive here over an unbounded channel rather
//! than the `Vec<u8>` the eager, non-gated path buffers into. A read
//! error on the connection fails the whole `Proto` future directly, the
//! same as the eager path, so the channel only ever carries chunks and
//! the natural end-of-body marker.
use std::sync::{Arc, Mutex};

use futures::{Async, Future, Poll, Stream};
use futures::sync::mpsc;

use body::BodySource;
use error::Error;

/// Shared between the `GatedBody` handed to the handler and the read
/// side of the connection driver.
#[derive(Default)]
pub struct ContinueGate {
    requested: bool,
}

pub fn new_gate() -> Arc<Mutex<ContinueGate>> {
    Arc::new(Mutex::new(ContinueGate::default()))
}

pub fn was_requested(gate: &Arc<Mutex<ContinueGate>>) -> bool {
    gate.lock().unwrap().requested
}

/// A body fed by the connection's read side rather than a pre-filled
/// buffer. `close()` only stops the handler from seeing further chunks --
/// the driver keeps draining the socket on its own until the body ends,
/// since the bytes already belong to the next pipelined request.
pub struct GatedBody {
    gate: Arc<Mutex<ContinueGate>>,
    chunks: Arc<Mutex<mpsc::UnboundedReceiver<Option<Vec<u8>>>>>,
    closed: bool,
}

impl GatedBody {
    pub fn new(gate: Arc<Mutex<ContinueGate>>, chunks: mpsc::UnboundedReceiver<Option<Vec<u8>>>)
        -> GatedBody
    {
        GatedBody { gate: gate, chunks: Arc::new(Mutex::new(chunks)), closed: false }
    }
}

impl BodySource for GatedBody {
    fn poll_chunk(&mut self) -> Box<Future<Item=Option<Vec<u8>>, Error=Error>> {
        self.gate.lock().unwrap().requested = true;
        if self.closed {
            return Box::new(::futures::finished(None));
        }
        Box::new(NextChunk { chunks: self.chunks.clone() })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

struct NextChunk {
    chunks: Arc<Mutex<mpsc::UnboundedReceiver<Option<Vec<u8>>>>>,
}

impl Future for NextChunk {
    type Item = Option<Vec<u8>>;
    type Error = Error;

    fn poll(&mut self) -> Poll<Option<Vec<u8>>, Error> {
        match self.chunks.lock().unwrap().poll() {
            Ok(Async::Ready(Some(chunk))) => Ok(Async::Ready(chunk)),
            Ok(Async::Ready(None)) => Ok(Async::Ready(None)),
            Ok(Async::NotReady) => Ok(Async::NotReady),
            Err(()) => Ok(Async::Ready(None)),
        }
    }
}

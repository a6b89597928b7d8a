//! Connection pool: one idle-connection queue per destination.
//!
//! Checkout prefers an already-idle connection on the calling thread;
//! checkin is attempted at body-EOF, before the caller observes that EOF,
//! and is gated on the connection actually being idle -- a connection
//! still mid-write for an earlier request is abandoned rather than held
//! open waiting for it to finish.
//!
//! Each `Pool<S>` is owned by a single I/O thread, matching the rest of
//! this engine's single-thread-per-connection model, so its idle map is
//! never contended. A request whose thread has no idle connection for
//! the destination doesn't have to dial a fresh one, though: `Registry`
//! lets every thread's pool register an inbox, and `Pool::trampoline`
//! hands the already-built `OutgoingMessage` (its response channel and
//! all) to another thread's inbox instead. That thread picks the relay
//! up via `Pool::poll_relays` -- driven from `client::dispatch::Client`,
//! the same place that calls `checkout`/`checkin` -- and answers it with
//! its own idle connection or a fresh dial, exactly as it would one of
//! its own thread's requests. The response reaches the caller over the
//! `OutgoingMessage`'s own oneshot regardless of which thread executed
//! it.
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use futures::{Async, Stream};
use futures::sync::mpsc;
use tokio_io::{AsyncRead, AsyncWrite};

use request::Request;

use super::proto::{OutgoingMessage, Proto};
use super::Config;

/// One request relayed from a thread with no idle connection of its own
/// to a sibling that might have one.
pub struct Relay {
    pub dest: Destination,
    pub msg: OutgoingMessage,
}

/// Shared table of per-thread trampoline inboxes. Cheap to clone
/// (`Arc` inside); one `Registry` is shared by every `Pool` that should
/// be able to hand work to each other, the same `Arc<Mutex<_>>`-sharing
/// idiom used for `Config` elsewhere in this module.
#[derive(Clone)]
pub struct Registry {
    inboxes: Arc<Mutex<HashMap<ThreadId, mpsc::UnboundedSender<Relay>>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry { inboxes: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn register(&self, id: ThreadId, tx: mpsc::UnboundedSender<Relay>) {
        self.inboxes.lock().unwrap().insert(id, tx);
    }

    /// Hand `relay` to any other registered thread. Picks whichever
    /// sibling `HashMap` iteration happens to visit first -- there is no
    /// load information to do better with, and the set of pools sharing
    /// one `Registry` is expected to be small.
    fn offer(&self, owner: ThreadId, mut relay: Relay) -> Result<(), Relay> {
        let inboxes = self.inboxes.lock().unwrap();
        for (id, tx) in inboxes.iter() {
            if *id == owner {
                continue;
            }
            match tx.unbounded_send(relay) {
                Ok(()) => return Ok(()),
                Err(e) => relay = e.into_inner(),
            }
        }
        Err(relay)
    }
}

/// Pool key: `(scheme, host, port)`. Two requests share a connection only
/// when all three match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(scheme: &str, host: &str, port: u16) -> Destination {
        Destination { scheme: scheme.to_string(), host: host.to_string(), port: port }
    }

    /// Derive a destination from a request's `scheme`/`host`, defaulting
    /// the port from the scheme when the host carries none.
    pub fn for_request(req: &Request) -> Destination {
        let scheme = req.scheme().to_string();
        let default_port = if scheme == "https" { 443 } else { 80 };
        let (host, port) = match req.host().rsplitn(2, ':').collect::<Vec<_>>().as_slice() {
            [p, h] if p.parse::<u16>().is_ok() => {
                (h.to_string(), p.parse().unwrap())
            }
            _ => (req.host().to_string(), default_port),
        };
        Destination { scheme: scheme, host: host, port: port }
    }
}

/// Idle connections, one `VecDeque` per destination. Not `Sync`; a pool is
/// owned by a single I/O thread, matching the rest of this engine's
/// single-thread-per-connection model. `checkout` only ever looks at this
/// thread's own idle map -- reaching another thread's idle connection
/// goes through `trampoline`/`poll_relays` and `Registry` instead of
/// sharing the map itself.
pub struct Pool<S> {
    config: Arc<Config>,
    idle: HashMap<Destination, VecDeque<Proto<S>>>,
    max_idle_per_destination: usize,
    owner: ThreadId,
    registry: Registry,
    inbox: mpsc::UnboundedReceiver<Relay>,
}

impl<S: AsyncRead + AsyncWrite> Pool<S> {
    /// `registry` is shared with every other thread's pool that should be
    /// able to trampoline work to this one; pass a fresh `Registry::new()`
    /// for a pool with no siblings (checkout misses always dial fresh,
    /// same as before this existed).
    pub fn new(config: Arc<Config>, registry: Registry) -> Pool<S> {
        let owner = thread::current().id();
        let (tx, rx) = mpsc::unbounded();
        registry.register(owner, tx);
        Pool {
            config: config,
            idle: HashMap::new(),
            max_idle_per_destination: 16,
            owner: owner,
            registry: registry,
            inbox: rx,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Take an idle connection for `dest` on this thread, dropping any
    /// that turn out to have closed in the meantime. Never looks at
    /// another thread's idle connections -- use `trampoline` for that.
    pub fn checkout(&mut self, dest: &Destination) -> Option<Proto<S>> {
        let q = self.idle.get_mut(dest)?;
        while let Some(conn) = q.pop_front() {
            if !conn.is_closed() {
                return Some(conn);
            }
        }
        None
    }

    /// Hand an already-built message to a sibling thread's pool instead
    /// of dialing a fresh connection on this one. Returns the message
    /// back on failure (no sibling registered, or every sibling's inbox
    /// has hung up) so the caller can fall back to dialing locally.
    pub fn trampoline(&self, dest: Destination, msg: OutgoingMessage) -> Result<(), OutgoingMessage> {
        self.registry.offer(self.owner, Relay { dest: dest, msg: msg })
            .map_err(|relay| relay.msg)
    }

    /// Drain every relay a sibling has handed to this thread since the
    /// last call. Non-blocking; callers poll this alongside their own
    /// work (`client::dispatch::Client` does so on every `Exchange` step)
    /// rather than this pool running its own background task.
    pub fn poll_relays(&mut self) -> Vec<Relay> {
        let mut relays = Vec::new();
        loop {
            match self.inbox.poll() {
                Ok(Async::Ready(Some(relay))) => relays.push(relay),
                Ok(Async::Ready(None)) | Ok(Async::NotReady) | Err(()) => break,
            }
        }
        relays
    }

    /// Offer a connection back to the pool. Declines connections that
    /// have already retired, or that are not currently idle (still
    /// writing a queued request, or still awaiting a response).
    pub fn checkin(&mut self, dest: Destination, conn: Proto<S>) {
        if self.config.keep_alive_timeout == Duration::new(0, 0) {
            return;
        }
        if conn.is_closed() || !conn.is_idle() {
            return;
        }
        let q = self.idle.entry(dest).or_insert_with(VecDeque::new);
        if q.len() < self.max_idle_per_destination {
            q.push_back(conn);
        }
    }

    /// Drop every idle connection, e.g. on shutdown.
    pub fn clear(&mut self) {
        self.idle.clear();
    }
}

#[cfg(test)]
mod test {
    use super::Destination;
    use request::Request;
    use enums::Method;

    #[test]
    fn destination_splits_host_port() {
        let mut b = Request::builder();
        b.method(Method::Get).scheme("http".to_string()).host("example.com:8080".to_string());
        let req = b.done();
        let dest = Destination::for_request(&req);
        assert_eq!(dest, Destination::new("http", "example.com", 8080));
    }

    #[test]
    fn destination_defaults_port_from_scheme() {
        let mut b = Request::builder();
        b.method(Method::Get).scheme("https".to_string()).host("example.com".to_string());
        let req = b.done();
        let dest = Destination::for_request(&req);
        assert_eq!(dest, Destination::new("https", "example.com", 443));
    }
}

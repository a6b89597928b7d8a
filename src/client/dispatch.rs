//! Ties `filters::Pipeline` to `client::pool::Pool` and `client::proto::
//! Proto`: the "raw sender" `filters::default_pipeline`'s doc comment
//! refers to, and the only place `Pool::checkout`/`checkin` and
//! `Outcome::Retry` are actually driven from.
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::{Async, Future, Poll};
use futures::future::{self, Loop};
use futures::sync::oneshot;
use tokio_core::reactor::Handle;
use tokio_io::{AsyncRead, AsyncWrite};

use body::{Body, Entity};
use context::Context;
use error::Error as CoreError;
use filters::{Outcome, Pipeline};
use request::Request;
use response::Response;

use super::errors::Error;
use super::pool::{Destination, Pool, Relay, Registry};
use super::proto::{OutgoingMessage, Proto};
use super::Config;

/// How long a redirect/auth retry waits for the abandoned response's
/// body to drain before giving up on reusing that connection anyway.
const DRAIN_DEADLINE: Duration = Duration::from_secs(1);

/// Dials a fresh connection to `dest` when the pool has none idle and no
/// sibling thread answers the trampoline either. Implemented for any
/// `Fn(&Destination) -> Box<Future<Item=S, Error=io::Error>> + Send +
/// Sync` closure, so embedders don't need a named type just to hand in
/// "open a `TcpStream` to this host:port".
pub trait Connect<S>: Send + Sync {
    fn connect(&self, dest: &Destination) -> Box<Future<Item=S, Error=io::Error>>;
}

impl<S, F> Connect<S> for F
    where F: Fn(&Destination) -> Box<Future<Item=S, Error=io::Error>> + Send + Sync
{
    fn connect(&self, dest: &Destination) -> Box<Future<Item=S, Error=io::Error>> {
        (self)(dest)
    }
}

/// Read and discard `body`'s remaining chunks, giving up once `deadline`
/// passes. A timed-out drain still resolves `Ok`: the caller tells
/// whether it finished by whether the connection ends up checked back in
/// (see `Exchange::poll`), not by this future's result.
fn drain_bounded(body: Body, deadline: Instant) -> Box<Future<Item=(), Error=CoreError>> {
    Box::new(future::loop_fn(body, move |mut body| {
        let step: Box<Future<Item=Loop<(), Body>, Error=CoreError>> = if Instant::now() >= deadline {
            Box::new(future::ok(Loop::Break(())))
        } else {
            Box::new(body.poll_chunk().map(move |chunk| {
                match chunk {
                    Some(_) => Loop::Continue(body),
                    None => { body.mark_consumed(); Loop::Break(()) }
                }
            }))
        };
        step
    }))
}

/// One filter-chain-plus-pool exchange, shared (via `clone`) by every
/// call site on the same I/O thread.
pub struct Client<S> {
    pool: Arc<Mutex<Pool<S>>>,
    pipeline: Arc<Pipeline>,
    connect: Arc<Connect<S>>,
    handle: Handle,
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Client<S> {
        Client {
            pool: self.pool.clone(),
            pipeline: self.pipeline.clone(),
            connect: self.connect.clone(),
            handle: self.handle.clone(),
        }
    }
}

type SendState = (Request, Option<Entity>, Option<Body>, Context);

impl<S: AsyncRead + AsyncWrite + 'static> Client<S> {
    pub fn new(config: Arc<Config>, registry: Registry, pipeline: Pipeline,
        connect: Box<Connect<S>>, handle: Handle) -> Client<S>
    {
        Client {
            pool: Arc::new(Mutex::new(Pool::new(config, registry))),
            pipeline: Arc::new(pipeline),
            connect: Arc::from(connect),
            handle: handle,
        }
    }

    /// Send one request through the filter pipeline, following
    /// `Outcome::Retry` (redirects, auth challenges) until a filter
    /// settles on `Outcome::Done` or its own hop limit does.
    pub fn send(&self, req: Request, body: Option<Entity>, ctx: Context)
        -> Box<Future<Item=(Response, Context), Error=Error>>
    {
        let this = self.clone();
        Box::new(future::loop_fn((req, body, None::<Body>, ctx),
            move |(mut req, body, drain, mut ctx): SendState|
        {
            let this = this.clone();
            let drained: Box<Future<Item=(), Error=CoreError>> = match drain {
                Some(b) => drain_bounded(b, Instant::now() + DRAIN_DEADLINE),
                None => Box::new(future::ok(())),
            };
            drained.then(move |_| {
                this.pipeline.prepare_request(&mut req, &mut ctx);
                let dest = Destination::for_request(&req);
                let (msg, rx) = OutgoingMessage::new(req.clone(), body);
                this.dispatch(dest, msg, rx).then(move |result| {
                    let resp = result?.0;
                    match this.pipeline.on_response(&req, resp, &mut ctx) {
                        Outcome::Done(resp) => Ok(Loop::Break((resp, ctx))),
                        Outcome::Retry(next_req, next_drain) =>
                            Ok(Loop::Continue((next_req, None, next_drain, ctx))),
                    }
                })
            })
        }))
    }

    /// Pull a local idle connection, or relay to a sibling thread, or
    /// dial fresh -- in that preference order -- then drive the
    /// exchange to its response.
    fn dispatch(&self, dest: Destination, msg: OutgoingMessage,
        rx: oneshot::Receiver<Result<(Response, Context), Error>>)
        -> Box<Future<Item=(Response, Context), Error=Error>>
    {
        self.drain_relays();
        let local = self.pool.lock().unwrap().checkout(&dest);
        if let Some(mut conn) = local {
            return match conn.send(msg) {
                Ok(()) => Box::new(Exchange {
                    client: self.clone(), proto: Some(conn), rx: rx, dest: dest,
                }),
                Err(_) => Box::new(await_response(rx)),
            };
        }
        match self.pool.lock().unwrap().trampoline(dest.clone(), msg) {
            Ok(()) => Box::new(await_response(rx)),
            Err(msg) => {
                let client = self.clone();
                Box::new(self.connect.connect(&dest).map_err(Error::Io).and_then(move |io| {
                    let config = client.pool.lock().unwrap().config().clone();
                    let mut conn = Proto::new(io, &config);
                    conn.send(msg)?;
                    Ok(Exchange { client: client, proto: Some(conn), rx: rx, dest: dest })
                }).and_then(|exchange| exchange))
            }
        }
    }

    /// Answer whatever siblings have handed this thread since the last
    /// call, spawning each as a background exchange. Opportunistic: a
    /// thread with nothing of its own in flight won't have anyone calling
    /// this until its next own request -- the same tradeoff
    /// `server::proto`'s `maybe_send_continue` accepts for its own
    /// per-poll bookkeeping.
    fn drain_relays(&self) {
        let relays: Vec<Relay> = self.pool.lock().unwrap().poll_relays();
        for relay in relays {
            self.spawn_relay(relay);
        }
    }

    fn spawn_relay(&self, relay: Relay) {
        let Relay { dest, msg } = relay;
        let local = self.pool.lock().unwrap().checkout(&dest);
        let client = self.clone();
        if let Some(mut conn) = local {
            if conn.send(msg).is_ok() {
                self.handle.spawn(DriveIdle { client: client, proto: Some(conn), dest: dest });
            }
            return;
        }
        let dest2 = dest.clone();
        let fut = self.connect.connect(&dest).map_err(|_| ()).and_then(move |io| {
            let config = client.pool.lock().unwrap().config().clone();
            let mut conn = Proto::new(io, &config);
            conn.send(msg).map_err(|_| ())?;
            Ok(DriveIdle { client: client, proto: Some(conn), dest: dest2 })
        }).and_then(|drive| drive);
        self.handle.spawn(fut);
    }
}

/// Drives a connection a relay was dispatched onto until it's idle again
/// (or closes), then checks it back in. The relayed message already
/// carries its own reply channel to the thread that originated it, so
/// there is nothing for this future to resolve besides "done driving".
struct DriveIdle<S> {
    client: Client<S>,
    proto: Option<Proto<S>>,
    dest: Destination,
}

impl<S: AsyncRead + AsyncWrite> Future for DriveIdle<S> {
    type Item = ();
    type Error = ();

    fn poll(&mut self) -> Poll<(), ()> {
        let idle = match self.proto.as_mut() {
            None => return Ok(Async::Ready(())),
            Some(proto) => match proto.poll() {
                Ok(Async::Ready(())) => true,
                Ok(Async::NotReady) => proto.is_idle(),
                Err(_) => true,
            },
        };
        if idle {
            if let Some(conn) = self.proto.take() {
                if !conn.is_closed() {
                    self.client.pool.lock().unwrap().checkin(self.dest.clone(), conn);
                }
            }
            return Ok(Async::Ready(()));
        }
        Ok(Async::NotReady)
    }
}

fn await_response(rx: oneshot::Receiver<Result<(Response, Context), Error>>)
    -> Box<Future<Item=(Response, Context), Error=Error>>
{
    Box::new(rx.then(|r| match r {
        Ok(result) => result,
        Err(_canceled) => Err(Error::Cancelled),
    }))
}

/// Drives one checked-out (or freshly dialed) connection, on the same
/// thread that owns the `oneshot::Receiver` for its response, until that
/// response arrives and the connection (if still idle) is checked back
/// in. Relayed messages are driven by `DriveIdle` instead, since their
/// receiver lives on a different thread.
struct Exchange<S> {
    client: Client<S>,
    proto: Option<Proto<S>>,
    rx: oneshot::Receiver<Result<(Response, Context), Error>>,
    dest: Destination,
}

impl<S: AsyncRead + AsyncWrite> Future for Exchange<S> {
    type Item = (Response, Context);
    type Error = Error;

    fn poll(&mut self) -> Poll<(Response, Context), Error> {
        if let Some(proto) = self.proto.as_mut() {
            match proto.poll() {
                Ok(Async::Ready(())) => { self.proto = None; }
                Ok(Async::NotReady) => {}
                Err(e) => { self.proto = None; return Err(e); }
            }
        }
        match self.rx.poll() {
            Ok(Async::Ready(result)) => {
                if let Some(conn) = self.proto.take() {
                    if conn.is_idle() {
                        self.client.pool.lock().unwrap().checkin(self.dest.clone(), conn);
                    }
                }
                match result {
                    Ok(v) => Ok(Async::Ready(v)),
                    Err(e) => Err(e),
                }
            }
            Ok(Async::NotReady) => {
                if self.proto.is_none() {
                    // the connection future itself finished (closed) with
                    // no response ever delivered; nothing left to drive.
                    return Err(Error::Closed);
                }
                Ok(Async::NotReady)
            }
            Err(_canceled) => Err(Error::Cancelled),
        }
    }
}

//! The client connection state machine.
//!
//! One `Proto` drives one connection: an outbound `Pump` that encodes and
//! writes queued requests, and a `Reader` that parses responses in the
//! same order the pump emitted them. Both live on the same struct and are
//! driven from the same `poll()`, the same single-thread-per-connection
//! shape `server::proto::Proto` uses.
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use futures::{Future, Poll, Async};
use futures::sync::oneshot;
use tk_bufstream::{IoBuf, ReadBuf, WriteBuf};
use tokio_io::{AsyncRead, AsyncWrite};

use body::{Body, Entity};
use context::Context;
use cookie::{Cookie, CookieJar};
use error::Error as CoreError;
use request::{Request, Target};
use response::Response;
use wire::ResponseHead;
use wire::response_parser::ResponseParser;
use wire::body_kind::BodyKind;
use wire::body_reader::{BodyProgress, Clock};

use super::encoder::{self, Encoder};
use super::errors::Error;
use super::Config;

type ResponseTx = oneshot::Sender<Result<(Response, Context), Error>>;

/// One queued request: its wire form plus where to deliver the eventual
/// response. Built by whatever enqueues work onto a `Proto` (normally
/// `Pool::checkout`, or a caller driving a bare connection directly).
pub struct OutgoingMessage {
    request: Request,
    body: Option<Entity>,
    is_head: bool,
    expect_100: bool,
    tx: ResponseTx,
}

impl OutgoingMessage {
    pub fn new(request: Request, body: Option<Entity>)
        -> (OutgoingMessage, oneshot::Receiver<Result<(Response, Context), Error>>)
    {
        let (tx, rx) = oneshot::channel();
        let is_head = request.method().is_head();
        let expect_100 = request.headers().get("Expect")
            .map(|v| v.eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false);
        (OutgoingMessage { request: request, body: body, is_head: is_head,
            expect_100: expect_100, tx: tx }, rx)
    }
}

/// Whether the pump is clear to send a gated body yet. Set by the reader
/// when it observes a `100 Continue` for the message currently gated, or
/// by the pump itself once `await-100-timeout` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateSignal {
    None,
    Go,
    /// The final response arrived before the gate opened: the server
    /// answered without reading the body. The body can no longer be sent
    /// without corrupting the wire framing, so the connection retires.
    Abort,
}

/// Outbound pump: encodes queued requests' heads and bodies onto
/// the transport. `Idle` means nothing queued; `Writing` means actively
/// encoding or flushing a request (a stalled `io.flush()` just has the
/// next `poll()` retry in place); `Void` means retired.
pub struct Pump<S> {
    state: PumpState<S>,
    queue: VecDeque<OutgoingMessage>,
}

enum PumpState<S> {
    Idle(WriteBuf<S>),
    Writing {
        enc: Encoder<S>,
        body: Option<Body>,
        pending_chunk: Option<Box<Future<Item=Option<Vec<u8>>, Error=CoreError>>>,
        gate_deadline: Option<Instant>,
    },
    Void,
}

/// Paired reader: parses one response per entry of `waiting`, in
/// arrival order, discarding interim `1xx` responses other than the
/// `100 Continue` it's watching for.
pub struct Reader<S> {
    state: ReaderState<S>,
    parser: ResponseParser,
}

enum ReaderState<S> {
    Idle(ReadBuf<S>),
    Body {
        io: ReadBuf<S>,
        head: ResponseHead,
        buf: Vec<u8>,
        progress: BodyProgress,
        clock: Clock,
        tx: ResponseTx,
    },
    Void,
}

/// A message whose request has been fully written and is now waiting for
/// its response, carried in arrival order so `Reader` always resolves the
/// oldest one first.
struct Waiting {
    is_head: bool,
    expect_100: bool,
    tx: ResponseTx,
}

/// Drives one HTTP/1.x client connection end to end.
pub struct Proto<S> {
    pump: Pump<S>,
    reader: Reader<S>,
    waiting: VecDeque<Waiting>,
    gate: GateSignal,
    config: Arc<Config>,
    close: bool,
}

impl<S: AsyncRead + AsyncWrite> Proto<S> {
    pub fn new(conn: S, config: &Arc<Config>) -> Proto<S> {
        let (cout, cin) = IoBuf::new(conn).split();
        Proto {
            pump: Pump {
                state: PumpState::Idle(cout),
                queue: VecDeque::with_capacity(config.inflight_request_prealloc),
            },
            reader: Reader {
                state: ReaderState::Idle(cin),
                parser: ResponseParser::new(
                    config.response_head_field_max,
                    config.response_head_total_max,
                ),
            },
            waiting: VecDeque::new(),
            gate: GateSignal::None,
            config: config.clone(),
            close: false,
        }
    }

    /// Queue a request. Fails with `Error::Busy` once
    /// `inflight-request-limit` queued-plus-waiting messages are ahead of
    /// it, or once the connection has retired.
    pub fn send(&mut self, msg: OutgoingMessage) -> Result<(), Error> {
        if self.close || matches!(self.pump.state, PumpState::Void) {
            return Err(Error::Closed);
        }
        if self.pump.queue.len() + self.waiting.len() >= self.config.inflight_request_limit {
            return Err(Error::Busy);
        }
        self.pump.queue.push_back(msg);
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.pump.queue.is_empty() && self.waiting.is_empty()
            && matches!(self.pump.state, PumpState::Idle(..))
            && matches!(self.reader.state, ReaderState::Idle(..))
    }

    pub fn is_closed(&self) -> bool {
        self.close && matches!(self.pump.state, PumpState::Void)
    }

    fn request_head(req: &Request) -> (String, String) {
        let method = req.method().as_str().to_string();
        let target = match *req.target() {
            Target::Origin(ref p) => p.clone(),
            Target::Absolute { ref scheme, ref authority, ref path } => {
                format!("{}://{}{}", scheme, authority, path)
            }
            Target::Authority(ref a) => a.clone(),
            Target::Asterisk => "*".to_string(),
        };
        (method, target)
    }

    fn start_write(&mut self, cout: WriteBuf<S>, msg: OutgoingMessage) -> Result<(), Error> {
        let OutgoingMessage { request, body, is_head, expect_100, tx } = msg;
        let (method, target) = Self::request_head(&request);
        let mut enc = encoder::new(cout);
        enc.request_line(&method, &target, request.version());
        for &(ref name, ref value) in request.headers() {
            enc.add_header(name, value.as_bytes())
                .map_err(|_| Error::Core(CoreError::Policy("invalid request header")))?;
        }
        let content_length = body.as_ref().and_then(|e| e.content_length);
        if body.is_some() {
            match content_length {
                Some(n) => {
                    enc.add_length(n)
                        .map_err(|_| Error::Core(CoreError::Policy("invalid content-length")))?;
                }
                None => {
                    enc.add_chunked()
                        .map_err(|_| Error::Core(CoreError::Policy("invalid transfer-encoding")))?;
                }
            }
        }
        enc.done_headers()
            .map_err(|_| Error::Core(CoreError::Policy("invalid request head")))?;
        let gate_deadline = if expect_100 && body.is_some() {
            Some(Instant::now() + self.config.await_100_timeout)
        } else {
            None
        };
        self.pump.state = PumpState::Writing {
            enc: enc,
            body: body.map(|e| e.body),
            pending_chunk: None,
            gate_deadline: gate_deadline,
        };
        self.waiting.push_back(Waiting { is_head: is_head, expect_100: expect_100, tx: tx });
        Ok(())
    }

    /// Advance the outbound pump by one step. Returns `true` if it made
    /// progress worth looping for.
    fn poll_writing(&mut self) -> Result<bool, Error> {
        match mem::replace(&mut self.pump.state, PumpState::Void) {
            PumpState::Idle(mut cout) => {
                cout.flush()?;
                if let Some(msg) = self.pump.queue.pop_front() {
                    self.start_write(cout, msg)?;
                    return Ok(true);
                }
                self.pump.state = PumpState::Idle(cout);
                Ok(false)
            }
            PumpState::Writing { mut enc, body, mut pending_chunk, gate_deadline } => {
                if let Some(deadline) = gate_deadline {
                    match self.gate {
                        GateSignal::Go => { self.gate = GateSignal::None; }
                        GateSignal::Abort => {
                            self.gate = GateSignal::None;
                            self.close = true;
                            self.pump.state = PumpState::Void;
                            return Ok(true);
                        }
                        GateSignal::None if Instant::now() >= deadline => {}
                        GateSignal::None => {
                            self.pump.state = PumpState::Writing {
                                enc: enc, body: body, pending_chunk: pending_chunk,
                                gate_deadline: gate_deadline,
                            };
                            return Ok(false);
                        }
                    }
                }
                let mut body = body;
                let progressed = match body {
                    None => {
                        enc.done();
                        false
                    }
                    Some(ref mut b) => {
                        if pending_chunk.is_none() {
                            pending_chunk = Some(b.poll_chunk());
                        }
                        match pending_chunk.as_mut().unwrap().poll()? {
                            Async::Ready(Some(bytes)) => {
                                enc.write_body(&bytes);
                                pending_chunk = None;
                                true
                            }
                            Async::Ready(None) => {
                                b.mark_consumed();
                                pending_chunk = None;
                                false
                            }
                            Async::NotReady => {
                                self.pump.state = PumpState::Writing {
                                    enc: enc, body: body, pending_chunk: pending_chunk,
                                    gate_deadline: None,
                                };
                                return Ok(false);
                            }
                        }
                    }
                };
                if enc.is_complete() || (body.is_some() && !progressed) {
                    let done = enc.done();
                    let mut cout = encoder::get_inner(done);
                    cout.flush()?;
                    self.pump.state = PumpState::Idle(cout);
                    return Ok(true);
                }
                self.pump.state = PumpState::Writing {
                    enc: enc, body: body, pending_chunk: pending_chunk, gate_deadline: None,
                };
                Ok(true)
            }
            PumpState::Void => { self.pump.state = PumpState::Void; Ok(false) }
        }
    }

    fn poll_reading(&mut self) -> Result<bool, Error> {
        match mem::replace(&mut self.reader.state, ReaderState::Void) {
            ReaderState::Idle(mut io) => {
                if self.waiting.is_empty() {
                    if io.read()? != 0 {
                        return Err(Error::PrematureResponseHeaders);
                    }
                    if io.done() {
                        return Err(Error::Closed);
                    }
                    self.reader.state = ReaderState::Idle(io);
                    return Ok(false);
                }
                io.read()?;
                self.park_head(io)
            }
            ReaderState::Body { io, head, buf, progress, clock, tx } => {
                self.advance_body(io, head, buf, progress, clock, tx)
            }
            ReaderState::Void => { self.reader.state = ReaderState::Void; Ok(false) }
        }
    }

    fn park_head(&mut self, mut io: ReadBuf<S>) -> Result<bool, Error> {
        let is_head = self.waiting.front().map(|w| w.is_head).unwrap_or(false);
        match self.reader.parser.feed(&mut io.in_buf, is_head)
            .map_err(Error::Core)?
        {
            None => {
                if io.done() {
                    return Err(Error::Closed);
                }
                self.reader.state = ReaderState::Idle(io);
                Ok(false)
            }
            Some(head) => {
                if head.code == 100 {
                    self.gate = GateSignal::Go;
                    self.reader.state = ReaderState::Idle(io);
                    return Ok(true);
                }
                let waiting = self.waiting.pop_front().expect("response without a waiting request");
                if waiting.expect_100 && self.gate != GateSignal::Go {
                    self.gate = GateSignal::Abort;
                }
                if head.connection_close {
                    self.close = true;
                }
                if head.body_kind == BodyKind::Fixed(0) {
                    self.deliver(head, Vec::new(), waiting.tx);
                    self.reader.state = ReaderState::Idle(io);
                } else {
                    let clock = Clock::new(self.config.max_request_timeout, 1);
                    let progress = BodyProgress::new(head.body_kind);
                    self.reader.state = ReaderState::Body {
                        io: io, head: head, buf: Vec::new(),
                        progress: progress, clock: clock, tx: waiting.tx,
                    };
                }
                Ok(true)
            }
        }
    }

    fn advance_body(&mut self, mut io: ReadBuf<S>, head: ResponseHead,
        mut buf: Vec<u8>, mut progress: BodyProgress, mut clock: Clock, tx: ResponseTx)
        -> Result<bool, Error>
    {
        io.read()?;
        progress.parse(&mut io.in_buf)?;
        clock.note_read(io.in_buf.len() as u64);
        clock.check().map_err(Error::Core)?;
        let (bytes, done) = progress.check(io.in_buf.len(), io.done());
        buf.extend_from_slice(&io.in_buf[..bytes]);
        progress.consume(bytes);
        io.in_buf.consume(bytes);
        if done {
            self.deliver(head, buf, tx);
            self.reader.state = ReaderState::Idle(io);
        } else {
            self.reader.state = ReaderState::Body {
                io: io, head: head, buf: buf, progress: progress, clock: clock, tx: tx,
            };
        }
        Ok(done)
    }

    /// Fail every request still queued or awaiting a response with a
    /// generic "connection broke" error. Called once `poll` sees a
    /// transport/protocol error, so in-flight callers get an `Err` rather
    /// than a silently dropped channel.
    fn fail_pending(&mut self) {
        for waiting in self.waiting.drain(..) {
            let _ = waiting.tx.send(Err(Error::Core(CoreError::Closed)));
        }
        for msg in self.pump.queue.drain(..) {
            let _ = msg.tx.send(Err(Error::Core(CoreError::Closed)));
        }
    }

    fn deliver(&mut self, head: ResponseHead, body: Vec<u8>, tx: ResponseTx) {
        let incoming: Vec<(String, String)> = head.set_cookies.iter()
            .filter_map(|v| Cookie::parse_set_cookie(v, "", "/"))
            .map(|c| (c.name, c.value))
            .collect();
        let jar = CookieJar::new(String::new(), String::new(), incoming);
        let ctx = Context::new(jar);
        let mut builder = Response::with_code(head.code, &head.reason);
        for &(ref name, ref value) in head.headers.iter() {
            builder.header(name, value);
        }
        if !body.is_empty() {
            builder.entity(Entity::new(Body::from_bytes(body)));
        }
        let _ = tx.send(Ok((builder.done(), ctx)));
    }
}

impl<S: AsyncRead + AsyncWrite> Future for Proto<S> {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> Poll<(), Error> {
        let result = (|| {
            loop {
                let wrote = self.poll_writing()?;
                let read = self.poll_reading()?;
                if !wrote && !read {
                    break;
                }
            }
            Ok(())
        })();
        if let Err(ref e) = result {
            if let Error::Closed = *e {
                debug!("client connection closed while idle");
            } else {
                warn!("client connection failing: {}", e);
            }
            self.fail_pending();
        }
        result?;
        if self.is_closed() || (self.close && self.is_idle()) {
            Ok(Async::Ready(()))
        } else {
            Ok(Async::NotReady)
        }
    }
}

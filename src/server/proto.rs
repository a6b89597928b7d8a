//! The server connection state machine.
//!
//! One `Proto` drives one accepted connection end to end: read a request
//! head, optionally its body, dispatch to the `Service`, write the
//! response, and either go back to reading the next request or close.
//! Built around the same `OutState`/`InState`/`BodyProgress` shape this
//! file used to sketch, but implemented in full and rebuilt on top of
//! `wire::` instead of `base_serializer` directly.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::{Future, Poll, Async};
use futures::sync::mpsc;
use tk_bufstream::IoBuf;
use tk_bufstream::{ReadBuf, WriteBuf};
use tokio_io::{AsyncRead, AsyncWrite};

use body::Body;
use context::Context;
use cookie::{Cookie, CookieJar};
use enums::Status;
use error::Error;
use request::{Request, Target};
use response::Response;
use wire::body_kind::BodyKind;
use wire::body_reader::{BodyProgress, Clock};
use wire::request_parser::{RequestHead, RequestParser};

use super::encoder::{self, Encoder, ResponseConfig};
use super::gated_body::{self, ContinueGate, GatedBody};
use super::service::Service;
use super::upgrade::Upgrader;
use super::Config;

type HandlerFuture = Box<Future<Item=(Response, Context), Error=Error>>;

/// What's left to do with one already-read request: either the
/// handler's future is still running, or it finished and is waiting its
/// turn to be written (responses must leave in arrival order).
enum Exchange {
    Running(HandlerFuture, ExchangeMeta),
    Ready(Response, Context, ExchangeMeta),
}

struct ExchangeMeta {
    response_config: ResponseConfig,
    connection_close: bool,
    /// Set when the handler's request is a candidate for hand-off
    /// (`upgrader.wants_upgrade()` returned `true` at dispatch time). The
    /// hand-off only actually happens once the response accepting it has
    /// been fully written.
    upgrade_request: Option<Request>,
    /// Captured before the request's `Context` moved into `Service::call`,
    /// so a handler error still has something to build a correlation id
    /// from.
    trace_id: u64,
    /// `Some` when the request carried `Expect: 100-continue` and had a
    /// body: shared with the `GatedBody` the handler was dispatched with.
    /// `do_writes` watches it to fire the interim response in order;
    /// `poll_handlers` watches it to force `Connection: close` if the
    /// handler never asked for the body.
    continue_gate: Option<Arc<Mutex<ContinueGate>>>,
    /// Set once `100 Continue` has actually been written for this
    /// exchange, so `do_writes` doesn't fire it twice.
    continue_sent: bool,
}

enum ReadState {
    /// Waiting for (more of) the next request's head.
    Head,
    /// Head parsed, accumulating the body into memory (the driver only
    /// implements `BufferedUpfront`; see `DESIGN.md`).
    Body {
        head: RequestHead,
        buf: Vec<u8>,
        progress: BodyProgress,
        clock: Clock,
    },
    /// Head parsed with `Expect: 100-continue` and a non-empty body; the
    /// handler has already been dispatched with a `GatedBody` and reading
    /// only starts once it asks for its first chunk (`gate` flips).
    GatedBody {
        gate: Arc<Mutex<ContinueGate>>,
        chunk_tx: mpsc::UnboundedSender<Option<Vec<u8>>>,
        progress: BodyProgress,
        clock: Clock,
        connection_close: bool,
    },
    /// Stopped reading further requests: either the last one asked for
    /// `Connection: close`, or the pipeline queue is full.
    Paused,
}

enum WriteState<S> {
    Idle(WriteBuf<S>),
    /// `100 Continue` has been written for the exchange at the front of
    /// `pending`; the same `Encoder` is reused for its final response
    /// once that exchange reaches `Ready`.
    Continued(Encoder<S>),
    Writing {
        enc: Encoder<S>,
        body: Option<Body>,
        pending_chunk: Option<Box<Future<Item=Option<Vec<u8>>, Error=Error>>>,
        close: bool,
        /// `Some(req)` once this response's head accepted a hand-off;
        /// taken and handed to `upgrader.upgrade()` when the write finishes.
        upgrade: Option<Request>,
    },
    Void,
}

/// Drives one HTTP/1.x server connection.
pub struct Proto<S: AsyncRead + AsyncWrite, Svc: Service, U: Upgrader<S>> {
    service: Svc,
    upgrader: U,
    config: Arc<Config>,
    /// `None` once the connection has been handed off to `upgrader`.
    cin: Option<ReadBuf<S>>,
    parser: RequestParser,
    read_state: ReadState,
    pending: VecDeque<Exchange>,
    write_state: WriteState<S>,
}

impl<S: AsyncRead + AsyncWrite, Svc: Service, U: Upgrader<S>> Proto<S, Svc, U> {
    pub fn new(conn: S, service: Svc, upgrader: U, config: &Arc<Config>) -> Proto<S, Svc, U> {
        let (cout, cin) = IoBuf::new(conn).split();
        Proto {
            service: service,
            upgrader: upgrader,
            config: config.clone(),
            cin: Some(cin),
            parser: RequestParser::new(
                config.max_request_head_field,
                config.max_request_head_total,
            ),
            read_state: ReadState::Head,
            pending: VecDeque::with_capacity(config.inflight_request_prealloc),
            write_state: WriteState::Idle(cout),
        }
    }

    fn pipelining_room(&self) -> bool {
        self.pending.len() < self.config.inflight_request_limit
    }

    /// Pull bytes off the socket and advance head/body parsing as far as
    /// the data on hand allows. Returns `true` if a full request was
    /// queued for dispatch, or body bytes were moved into a gated body's
    /// channel (caller should loop again).
    fn do_reads(&mut self) -> Result<bool, Error> {
        if matches!(self.read_state, ReadState::Paused) || !self.pipelining_room() {
            return Ok(false);
        }
        if self.cin.is_none() {
            return Ok(false);
        }
        {
            let cin = self.cin.as_mut().unwrap();
            if cin.read()? == 0 && !cin.done() {
                return Ok(false);
            }
        }
        match self.read_state {
            ReadState::Head => {
                let fed = self.parser.feed(&mut self.cin.as_mut().unwrap().in_buf)
                    .map_err(|e| { warn!("rejecting request head: {}", e); e })?;
                match fed {
                    None => Ok(false),
                    Some(head) => {
                        if head.body_kind == BodyKind::Fixed(0) {
                            self.finish_read(head, Vec::new());
                        } else if head.expect_continue {
                            self.dispatch_gated(head);
                        } else {
                            let clock = Clock::new(self.config.input_body_byte_timeout, 1);
                            let progress = BodyProgress::new(head.body_kind);
                            self.read_state = ReadState::Body {
                                head: head,
                                buf: Vec::new(),
                                progress: progress,
                                clock: clock,
                            };
                        }
                        Ok(true)
                    }
                }
            }
            ReadState::Body { .. } => {
                let done = {
                    let (progress, buf, clock) = match self.read_state {
                        ReadState::Body { ref mut progress, ref mut buf, ref mut clock, .. } =>
                            (progress, buf, clock),
                        _ => unreachable!(),
                    };
                    let cin = self.cin.as_mut().unwrap();
                    progress.parse(&mut cin.in_buf)?;
                    clock.note_read(cin.in_buf.len() as u64);
                    clock.check()?;
                    let (bytes, done) = progress.check(cin.in_buf.len(), cin.done());
                    trace!("request body: {} bytes ready, done={}", bytes, done);
                    buf.extend_from_slice(&cin.in_buf[..bytes]);
                    progress.consume(bytes);
                    cin.in_buf.consume(bytes);
                    done
                };
                if done {
                    let (head, buf) = match ::std::mem::replace(&mut self.read_state, ReadState::Head) {
                        ReadState::Body { head, buf, .. } => (head, buf),
                        _ => unreachable!(),
                    };
                    self.finish_read(head, buf);
                }
                Ok(done)
            }
            ReadState::GatedBody { .. } => {
                let requested = match self.read_state {
                    ReadState::GatedBody { ref gate, .. } => gated_body::was_requested(gate),
                    _ => unreachable!(),
                };
                if !requested {
                    return Ok(false);
                }
                let done = {
                    let (progress, clock, chunk_tx) = match self.read_state {
                        ReadState::GatedBody { ref mut progress, ref mut clock, ref chunk_tx, .. } =>
                            (progress, clock, chunk_tx),
                        _ => unreachable!(),
                    };
                    let cin = self.cin.as_mut().unwrap();
                    progress.parse(&mut cin.in_buf)?;
                    clock.note_read(cin.in_buf.len() as u64);
                    clock.check()?;
                    let (bytes, done) = progress.check(cin.in_buf.len(), cin.done());
                    if bytes > 0 {
                        let chunk = cin.in_buf[..bytes].to_vec();
                        let _ = chunk_tx.unbounded_send(Some(chunk));
                    }
                    progress.consume(bytes);
                    cin.in_buf.consume(bytes);
                    done
                };
                if done {
                    let (chunk_tx, connection_close) =
                        match ::std::mem::replace(&mut self.read_state, ReadState::Head) {
                            ReadState::GatedBody { chunk_tx, connection_close, .. } =>
                                (chunk_tx, connection_close),
                            _ => unreachable!(),
                        };
                    let _ = chunk_tx.unbounded_send(None);
                    self.read_state = if connection_close { ReadState::Paused } else { ReadState::Head };
                }
                Ok(done)
            }
            ReadState::Paused => Ok(false),
        }
    }

    fn finish_read(&mut self, head: RequestHead, body: Vec<u8>) {
        let connection_close = head.connection_close;
        self.dispatch(head, body);
        self.read_state = if connection_close { ReadState::Paused } else { ReadState::Head };
    }

    fn dispatch(&mut self, head: RequestHead, body: Vec<u8>) {
        let response_config = ResponseConfig::from(&head);
        let connection_close = head.connection_close;
        let (host, cookies, ctx, trace_id) = self.build_request(&head);

        let mut builder = Request::builder();
        builder.method(head.method)
            .target(head.target)
            .version(head.version)
            .host(host)
            .headers(head.headers)
            .cookies(cookies);
        if !body.is_empty() {
            builder.entity(::body::Entity::new(Body::from_bytes(body)));
        }
        let (request, entity) = builder.entity_taken();

        let upgrade_request = if self.upgrader.wants_upgrade(&request) {
            Some(request.clone())
        } else {
            None
        };

        let fut: HandlerFuture = Box::new(self.service.call(request, entity, ctx));
        self.pending.push_back(Exchange::Running(fut, ExchangeMeta {
            response_config: response_config,
            connection_close: connection_close,
            upgrade_request: upgrade_request,
            trace_id: trace_id,
            continue_gate: None,
            continue_sent: false,
        }));
    }

    /// Dispatch a request whose body is withheld by the peer behind
    /// `Expect: 100-continue`. The handler runs immediately with a
    /// `GatedBody`; `100 Continue` is only written once it asks for a
    /// chunk, and reading from the socket only starts at that point too.
    fn dispatch_gated(&mut self, head: RequestHead) {
        let response_config = ResponseConfig::from(&head);
        let connection_close = head.connection_close;
        let body_kind = head.body_kind;
        let (host, cookies, ctx, trace_id) = self.build_request(&head);

        let gate = gated_body::new_gate();
        let (chunk_tx, chunk_rx) = mpsc::unbounded();

        let mut builder = Request::builder();
        builder.method(head.method)
            .target(head.target)
            .version(head.version)
            .host(host)
            .headers(head.headers)
            .cookies(cookies);
        builder.entity(::body::Entity::new(
            Body::new(Box::new(GatedBody::new(gate.clone(), chunk_rx)))));
        let (request, entity) = builder.entity_taken();

        let upgrade_request = if self.upgrader.wants_upgrade(&request) {
            Some(request.clone())
        } else {
            None
        };

        let fut: HandlerFuture = Box::new(self.service.call(request, entity, ctx));
        self.pending.push_back(Exchange::Running(fut, ExchangeMeta {
            response_config: response_config,
            connection_close: connection_close,
            upgrade_request: upgrade_request,
            trace_id: trace_id,
            continue_gate: Some(gate.clone()),
            continue_sent: false,
        }));

        let clock = Clock::new(self.config.input_body_byte_timeout, 1);
        let progress = BodyProgress::new(body_kind);
        self.read_state = ReadState::GatedBody {
            gate: gate,
            chunk_tx: chunk_tx,
            progress: progress,
            clock: clock,
            connection_close: connection_close,
        };
    }

    /// Shared request-snapshot/context construction used by both the
    /// eager and the gated dispatch paths.
    fn build_request(&self, head: &RequestHead) -> (String, Vec<Cookie>, Context, u64) {
        let incoming_cookies = head.headers.get("Cookie")
            .map(|v| Cookie::parse_cookie_header(v))
            .unwrap_or_else(Vec::new);
        let cookies: Vec<Cookie> = incoming_cookies.iter()
            .map(|&(ref n, ref v)| Cookie::new(n, v))
            .collect();
        let host = head.headers.get("Host").unwrap_or("").to_string();
        let path = match head.target {
            Target::Origin(ref p) => p.clone(),
            Target::Absolute { ref path, .. } => path.clone(),
            Target::Authority(_) | Target::Asterisk => String::new(),
        };
        let jar = CookieJar::new(host.clone(), path, incoming_cookies);
        let ctx = Context::new(jar);
        let trace_id = ctx.trace_id();
        (host, cookies, ctx, trace_id)
    }

    /// Poll any in-flight handler futures, moving completed ones to
    /// `Ready` without disturbing response order. A handler that errors
    /// out is mapped to a `500` here rather than killing the connection --
    /// every other pipelined exchange on it is unaffected.
    fn poll_handlers(&mut self) -> Result<(), Error> {
        for slot in self.pending.iter_mut() {
            let ready = match *slot {
                Exchange::Running(ref mut fut, _) => Some(fut.poll()),
                Exchange::Ready(..) => None,
            };
            match ready {
                Some(Ok(Async::Ready((resp, ctx)))) => {
                    let mut meta = match ::std::mem::replace(slot, placeholder_ready()) {
                        Exchange::Running(_, meta) => meta,
                        Exchange::Ready(_, _, meta) => meta,
                    };
                    release_gate_if_unused(&mut self.read_state, &mut meta);
                    *slot = Exchange::Ready(resp, ctx, meta);
                }
                Some(Err(e)) => {
                    let mut meta = match ::std::mem::replace(slot, placeholder_ready()) {
                        Exchange::Running(_, meta) => meta,
                        Exchange::Ready(_, _, meta) => meta,
                    };
                    release_gate_if_unused(&mut self.read_state, &mut meta);
                    let error_id = ::util::hash_error_id(meta.trace_id, 0);
                    error!("handler error [{:x}]: {}", error_id, e);
                    let mut b = Response::with_code(500, "Internal Server Error");
                    b.header("Content-Type", "text/plain; charset=utf-8");
                    b.entity(::body::Entity::new(
                        Body::from_bytes(format!("internal error [{:x}]\n", error_id).into_bytes())));
                    let ctx = Context::new(CookieJar::new(String::new(), String::new(), Vec::new()));
                    *slot = Exchange::Ready(b.done(), ctx, meta);
                }
                Some(Ok(Async::NotReady)) | None => {}
            }
        }
        Ok(())
    }

    fn do_writes(&mut self) -> Result<(), Error> {
        loop {
            if self.maybe_send_continue()? {
                continue;
            }
            match self.write_state {
                WriteState::Idle(_) => {
                    let ready = matches!(self.pending.front(), Some(&Exchange::Ready(..)));
                    if !ready {
                        return Ok(());
                    }
                    let (resp, ctx, meta) = match self.pending.pop_front().unwrap() {
                        Exchange::Ready(r, c, m) => (r, c, m),
                        Exchange::Running(..) => unreachable!(),
                    };
                    let cout = match ::std::mem::replace(&mut self.write_state, WriteState::Void) {
                        WriteState::Idle(cout) => cout,
                        _ => unreachable!(),
                    };
                    let enc = encoder::new(cout, meta.response_config);
                    self.start_response(enc, resp, ctx, meta)?;
                }
                WriteState::Continued(_) => {
                    let ready = matches!(self.pending.front(), Some(&Exchange::Ready(..)));
                    if !ready {
                        return Ok(());
                    }
                    let (resp, ctx, meta) = match self.pending.pop_front().unwrap() {
                        Exchange::Ready(r, c, m) => (r, c, m),
                        Exchange::Running(..) => unreachable!(),
                    };
                    let enc = match ::std::mem::replace(&mut self.write_state, WriteState::Void) {
                        WriteState::Continued(enc) => enc,
                        _ => unreachable!(),
                    };
                    self.start_response(enc, resp, ctx, meta)?;
                }
                WriteState::Writing { .. } => {
                    if !self.advance_write()? {
                        return Ok(());
                    }
                }
                WriteState::Void => return Ok(()),
            }
        }
    }

    /// If the exchange at the front of the pipeline is gated on `Expect:
    /// 100-continue` and the handler has just asked for its body, write
    /// the interim `100 Continue` line and park the encoder so the final
    /// response reuses it. Only fires while the write side is free
    /// (`Idle`), so it never jumps ahead of a response still being
    /// written for an earlier pipelined request.
    fn maybe_send_continue(&mut self) -> Result<bool, Error> {
        if !matches!(self.write_state, WriteState::Idle(_)) {
            return Ok(false);
        }
        let fire = match self.pending.front_mut() {
            Some(&mut Exchange::Running(_, ref mut meta)) |
            Some(&mut Exchange::Ready(_, _, ref mut meta)) => {
                let due = match meta.continue_gate {
                    Some(ref gate) => !meta.continue_sent && gated_body::was_requested(gate),
                    None => false,
                };
                if due {
                    meta.continue_sent = true;
                }
                due
            }
            None => false,
        };
        if !fire {
            return Ok(false);
        }
        let response_config = match self.pending.front() {
            Some(&Exchange::Running(_, ref meta)) | Some(&Exchange::Ready(_, _, ref meta)) =>
                meta.response_config,
            None => unreachable!(),
        };
        let cout = match ::std::mem::replace(&mut self.write_state, WriteState::Void) {
            WriteState::Idle(cout) => cout,
            _ => unreachable!(),
        };
        let mut enc = encoder::new(cout, response_config);
        enc.response_continue();
        enc.flush()?;
        self.write_state = WriteState::Continued(enc);
        Ok(true)
    }

    fn start_response(&mut self, mut enc: Encoder<S>, mut resp: Response, ctx: Context,
        meta: ExchangeMeta) -> Result<(), Error>
    {
        let jar_cookies = ctx.into_jar().pending_set_cookies();
        enc.custom_status(resp.code(), resp.reason());
        for &(ref name, ref value) in resp.headers() {
            enc.add_header(name, value.as_bytes())
                .map_err(|_| Error::Policy("invalid response header"))?;
        }
        for set_cookie in resp.set_cookies() {
            enc.add_header("Set-Cookie", set_cookie.as_bytes())
                .map_err(|_| Error::Policy("invalid set-cookie header"))?;
        }
        for set_cookie in &jar_cookies {
            enc.add_header("Set-Cookie", set_cookie.as_bytes())
                .map_err(|_| Error::Policy("invalid set-cookie header"))?;
        }
        let content_length = resp.entity().and_then(|e| e.content_length);
        if resp.entity().is_some() {
            match content_length {
                Some(n) => { enc.add_length(n).map_err(|_| Error::Policy("invalid content-length"))?; }
                None => { enc.add_chunked().map_err(|_| Error::Policy("invalid transfer-encoding"))?; }
            }
        }
        let has_body = enc.done_headers().map_err(|_| Error::Policy("invalid response head"))?;
        let body = if has_body { resp.take_entity().map(|e| e.body) } else { None };
        let code = resp.code();
        let accepts_upgrade = code == 101 || (code >= 200 && code < 300);
        let upgrade = if accepts_upgrade { meta.upgrade_request } else { None };
        self.write_state = WriteState::Writing {
            enc: enc,
            body: body,
            pending_chunk: None,
            close: meta.connection_close,
            upgrade: upgrade,
        };
        Ok(())
    }

    /// Advance the current response write by one step. Returns `true` if
    /// it made progress worth looping for, `false` if it's blocked.
    fn advance_write(&mut self) -> Result<bool, Error> {
        let (chunk, have_body) = match self.write_state {
            WriteState::Writing { ref mut body, ref mut pending_chunk, .. } => {
                match *body {
                    None => (Some(None), false),
                    Some(ref mut b) => {
                        if pending_chunk.is_none() {
                            *pending_chunk = Some(b.poll_chunk());
                        }
                        match pending_chunk.as_mut().unwrap().poll()? {
                            Async::Ready(chunk) => { *pending_chunk = None; (Some(chunk), true) }
                            Async::NotReady => (None, true),
                        }
                    }
                }
            }
            _ => unreachable!(),
        };
        match chunk {
            None => Ok(false),
            Some(Some(bytes)) => {
                if let WriteState::Writing { ref mut enc, .. } = self.write_state {
                    enc.write_body(&bytes);
                }
                Ok(true)
            }
            Some(None) => {
                if have_body {
                    if let WriteState::Writing { ref mut body, .. } = self.write_state {
                        if let Some(ref mut b) = *body {
                            b.mark_consumed();
                        }
                    }
                }
                let (enc, close, upgrade) = match ::std::mem::replace(&mut self.write_state, WriteState::Void) {
                    WriteState::Writing { enc, close, upgrade, .. } => (enc, close, upgrade),
                    _ => unreachable!(),
                };
                let done = enc.done();
                let cout = encoder::get_inner(done);
                self.write_state = match (upgrade, self.cin.take()) {
                    (Some(req), Some(cin)) => {
                        self.upgrader.upgrade(req, cout, cin);
                        WriteState::Void
                    }
                    (_, cin) => {
                        self.cin = cin;
                        if close { WriteState::Void } else { WriteState::Idle(cout) }
                    }
                };
                Ok(true)
            }
        }
    }

    fn flush(&mut self) -> Result<(), Error> {
        match self.write_state {
            WriteState::Idle(ref mut cout) => { cout.flush()?; }
            WriteState::Continued(ref mut enc) => { enc.flush()?; }
            WriteState::Writing { ref mut enc, .. } => { enc.flush()?; }
            WriteState::Void => {}
        }
        Ok(())
    }
}

/// Called whenever an exchange reaches `Ready`: if it was gated on
/// `Expect: 100-continue` and the handler never asked for the body, no
/// `100 Continue` was ever sent -- correct, but the connection can't be
/// kept alive, since the peer is still holding the unsent body and would
/// otherwise desync the next pipelined request. Forces `Connection:
/// close` and, if the read side is still parked waiting on this exact
/// gate (reads are single-flight, so it can only be this exchange's),
/// unsticks it so the connection can proceed to close instead of hanging
/// until the body timeout.
fn release_gate_if_unused(read_state: &mut ReadState, meta: &mut ExchangeMeta) {
    let unused = match meta.continue_gate {
        Some(ref gate) => !gated_body::was_requested(gate),
        None => false,
    };
    if !unused {
        return;
    }
    meta.connection_close = true;
    if matches!(*read_state, ReadState::GatedBody { .. }) {
        *read_state = ReadState::Paused;
    }
}

/// A disposable placeholder used only as the source of a `mem::replace`
/// when pulling a completed exchange's metadata out of the queue slot.
fn placeholder_ready() -> Exchange {
    Exchange::Ready(
        Response::builder(Status::Ok).done(),
        Context::new(CookieJar::new(String::new(), String::new(), Vec::new())),
        ExchangeMeta {
            response_config: ResponseConfig {
                is_head: false,
                do_close: false,
                version: ::enums::Version::Http11,
            },
            connection_close: false,
            upgrade_request: None,
            trace_id: 0,
            continue_gate: None,
            continue_sent: false,
        },
    )
}

impl<S: AsyncRead + AsyncWrite, Svc: Service, U: Upgrader<S>> Future for Proto<S, Svc, U> {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> Poll<(), Error> {
        loop {
            self.poll_handlers()?;
            self.do_writes()?;
            self.flush()?;
            if !self.do_reads()? {
                break;
            }
        }
        let idle_and_paused = matches!(self.read_state, ReadState::Paused)
            && self.pending.is_empty()
            && matches!(self.write_state, WriteState::Idle(_));
        let closed = matches!(self.write_state, WriteState::Void) && self.pending.is_empty();
        if idle_and_paused || closed {
            Ok(Async::Ready(()))
        } else {
            Ok(Async::NotReady)
        }
    }
}

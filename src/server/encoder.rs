//! Response writer handed to a `Service` once a request's head (and, in
//! `BufferedUpfront` mode, its body) has been fully read.
//!
//! Same write-once discipline enforced by `wire::encoder::MessageState`,
//! retargeted from `base_serializer` to `wire::encoder` and from a raw
//! `Head` to `wire::RequestHead`.
use std::io;
use std::fmt::Display;

use futures::{Future, Poll, Async};
use tk_bufstream::{WriteBuf, WriteRaw, FutureWriteRaw};
use tokio_io::AsyncWrite;

use enums::Version;
use wire::encoder::{MessageState, HeaderError, Body as WireBody};
use wire::RequestHead;

/// This a response writer that you receive in `Service::call`.
///
/// Methods of this structure ensure that everything you write into a
/// buffer is consistent and valid protocol.
pub struct Encoder<S> {
    state: MessageState,
    io: WriteBuf<S>,
}

/// Returned from `Encoder::done` and works as a continuation that should
/// be returned from the future that writes a response.
pub struct EncoderDone<S> {
    buf: WriteBuf<S>,
}

/// All the information needed to start a response in a correct manner.
#[derive(Debug, Clone, Copy)]
pub struct ResponseConfig {
    pub is_head: bool,
    pub do_close: bool,
    pub version: Version,
}

pub struct FutureRawBody<S>(FutureWriteRaw<S>);
pub struct WaitFlush<S>(Option<Encoder<S>>, usize);

/// A tiny wrapper around `WriteRaw` for zero-copy writing techniques.
/// Chunked encoding, if any, must be handled manually in this mode.
pub struct RawBody<S> {
    io: WriteRaw<S>,
}

impl<S> Encoder<S> {
    /// Write a 100 (Continue) response.
    ///
    /// # Panics
    /// When the response is already started.
    pub fn response_continue(&mut self) {
        self.state.response_continue(&mut self.io.out_buf)
    }

    /// # Panics
    /// When status line is already written, or `code == 100`.
    pub fn custom_status(&mut self, code: u16, reason: &str) {
        self.state.response_status(&mut self.io.out_buf, code, reason)
    }

    /// # Panics
    /// Panics when `add_header` is called in the wrong state.
    pub fn add_header<V: AsRef<[u8]>>(&mut self, name: &str, value: V)
        -> Result<(), HeaderError>
    {
        self.state.add_header(&mut self.io.out_buf, name, value.as_ref())
    }

    pub fn format_header<D: Display>(&mut self, name: &str, value: D)
        -> Result<(), HeaderError>
    {
        self.state.format_header(&mut self.io.out_buf, name, value)
    }

    pub fn add_length(&mut self, n: u64) -> Result<(), HeaderError> {
        self.state.add_length(&mut self.io.out_buf, n)
    }

    pub fn add_chunked(&mut self) -> Result<(), HeaderError> {
        self.state.add_chunked(&mut self.io.out_buf)
    }

    pub fn is_started(&self) -> bool {
        self.state.is_started()
    }

    /// Closes the HTTP header and returns `true` if an entity body is
    /// expected (`false` for 1xx, 204, 304, or in response to `HEAD`).
    pub fn done_headers(&mut self) -> Result<bool, HeaderError> {
        self.state.done_headers(&mut self.io.out_buf)
    }

    pub fn write_body(&mut self, data: &[u8]) {
        self.state.write_body(&mut self.io.out_buf, data)
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    pub fn done(mut self) -> EncoderDone<S> {
        self.state.done(&mut self.io.out_buf);
        EncoderDone { buf: self.io }
    }

    /// Raw body for zero-copy writing. Locks the socket against further
    /// reads while in use; see `client::encoder` for the same tradeoff on
    /// the request side.
    ///
    /// # Panics
    /// Called before headers are written.
    pub fn raw_body(self) -> FutureRawBody<S> {
        assert!(self.state.is_after_headers());
        FutureRawBody(self.io.borrow_raw())
    }

    pub fn flush(&mut self) -> Result<(), io::Error>
        where S: AsyncWrite
    {
        self.io.flush()
    }

    pub fn bytes_buffered(&mut self) -> usize {
        self.io.out_buf.len()
    }

    pub fn wait_flush(self, watermark: usize) -> WaitFlush<S> {
        WaitFlush(Some(self), watermark)
    }
}

impl<S> RawBody<S> {
    pub fn done(self) -> EncoderDone<S> {
        EncoderDone { buf: self.io.into_buf() }
    }
}

impl<S> io::Write for Encoder<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl<S: AsyncWrite> AsyncWrite for Encoder<S> {
    fn shutdown(&mut self) -> Poll<(), io::Error> {
        panic!("can't shutdown a response encoder directly, drop the connection instead")
    }
}

impl<S: AsyncWrite> io::Write for RawBody<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.io.get_mut().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.io.get_mut().flush()
    }
}

impl<S: AsyncWrite> AsyncWrite for RawBody<S> {
    fn shutdown(&mut self) -> Poll<(), io::Error> {
        panic!("can't shutdown a raw response body directly")
    }
}

pub fn get_inner<S>(e: EncoderDone<S>) -> WriteBuf<S> {
    e.buf
}

pub fn new<S>(io: WriteBuf<S>, cfg: ResponseConfig) -> Encoder<S> {
    Encoder {
        state: MessageState::ResponseStart {
            body: if cfg.is_head { WireBody::Head } else { WireBody::Normal },
            version: cfg.version,
            close: cfg.do_close || cfg.version == Version::Http10,
        },
        io: io,
    }
}

impl ResponseConfig {
    pub fn from(req: &RequestHead) -> ResponseConfig {
        ResponseConfig {
            version: req.version,
            is_head: req.method.is_head(),
            do_close: req.connection_close,
        }
    }
}

impl<S: AsyncWrite> Future for FutureRawBody<S> {
    type Item = RawBody<S>;
    type Error = io::Error;
    fn poll(&mut self) -> Poll<RawBody<S>, io::Error> {
        self.0.poll().map(|x| x.map(|y| RawBody { io: y }))
    }
}

impl<S: AsyncWrite> Future for WaitFlush<S> {
    type Item = Encoder<S>;
    type Error = io::Error;
    fn poll(&mut self) -> Result<Async<Encoder<S>>, io::Error> {
        let bytes_left = {
            let enc = self.0.as_mut().expect("future is polled twice");
            enc.flush()?;
            enc.io.out_buf.len()
        };
        if bytes_left < self.1 {
            Ok(Async::Ready(self.0.take().unwrap()))
        } else {
            Ok(Async::NotReady)
        }
    }
}

//! Request writer used by the outbound pump. Same write-once
//! discipline as `server::encoder::Encoder`, built on
//! `wire::encoder::MessageState::RequestStart` instead of `ResponseStart`.
use std::io;
use std::fmt::Display;

use futures::Poll;
use tk_bufstream::WriteBuf;
use tokio_io::AsyncWrite;

use enums::Version;
use wire::encoder::{MessageState, HeaderError};

pub struct Encoder<S> {
    state: MessageState,
    io: WriteBuf<S>,
}

pub struct EncoderDone<S> {
    buf: WriteBuf<S>,
}

impl<S> Encoder<S> {
    pub fn request_line(&mut self, method: &str, path: &str, version: Version) {
        self.state.request_line(&mut self.io.out_buf, method, path, version)
    }

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

    pub fn flush(&mut self) -> Result<(), io::Error>
        where S: AsyncWrite
    {
        self.io.flush()
    }

    pub fn bytes_buffered(&mut self) -> usize {
        self.io.out_buf.len()
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
        panic!("can't shutdown a request encoder directly, drop the connection instead")
    }
}

pub fn get_inner<S>(e: EncoderDone<S>) -> WriteBuf<S> {
    e.buf
}

pub fn new<S>(io: WriteBuf<S>) -> Encoder<S> {
    Encoder { state: MessageState::RequestStart, io: io }
}

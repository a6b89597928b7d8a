//! Crate-wide error kinds.
//!
//! Every fallible operation in the engine ultimately reports one of the
//! six kinds below. `Kind` is cheap to match on so drivers can decide
//! whether a failure closes the connection, maps to a status code, or is
//! merely logged.
use std::io;

use httparse;

/// Coarse classification of a failure, independent of its cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// TCP/TLS read/write, DNS.
    Transport,
    /// Any timed phase. Treated like `Transport` for connection handling,
    /// but logged at a lower severity (read-head timeouts are routine).
    Timeout,
    /// Head parser or body framing violation.
    Protocol,
    /// Body-max, encoding-reject, unsupported method/version.
    Policy,
    /// Exception from user handler code.
    Handler,
    /// Caller-initiated cancellation.
    Cancellation,
}

quick_error! {
    /// Top-level engine error.
    ///
    /// This is the error type shared by the wire codec and both connection
    /// drivers. Server- and client-specific errors (`server::Error`,
    /// `client::Error`) carry the extra context needed to pick an HTTP
    /// status or a pool action, but both convert into this type at the
    /// point where only the coarse `Kind` still matters (logging, metrics).
    #[derive(Debug)]
    pub enum Error {
        /// I/O error while reading or writing the transport.
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// A timed phase (`read-timeout`, `request-head-timeout`, ...)
        /// expired before the operation completed.
        Timeout(phase: &'static str) {
            description("operation timed out")
            display("{} timed out", phase)
        }
        /// Request or response head failed to parse.
        Parse(err: httparse::Error) {
            description("parse error")
            display("parse error: {}", err)
            from()
        }
        /// Chunked transfer-coding framing was invalid.
        ChunkSize(err: httparse::InvalidChunkSize) {
            description("invalid chunk size")
            display("invalid chunk size: {}", err)
            from()
        }
        /// A configured limit (head size, body size, redirect count, ...)
        /// was exceeded.
        Policy(what: &'static str) {
            description("policy limit exceeded")
            display("policy limit exceeded: {}", what)
        }
        /// The handler panicked, returned an error, or otherwise failed;
        /// `id` is the hashed error id echoed to the client and logged.
        Handler(id: u64) {
            description("handler error")
            display("handler error (id={:x})", id)
        }
        /// The operation was cancelled by its caller.
        Cancelled {
            description("operation cancelled")
        }
        /// The connection was closed, normally or otherwise, while the
        /// operation was still pending.
        Closed {
            description("connection closed")
        }
    }
}

impl Error {
    pub fn kind(&self) -> Kind {
        match *self {
            Error::Io(..) | Error::Closed => Kind::Transport,
            Error::Timeout(..) => Kind::Timeout,
            Error::Parse(..) | Error::ChunkSize(..) => Kind::Protocol,
            Error::Policy(..) => Kind::Policy,
            Error::Handler(..) => Kind::Handler,
            Error::Cancelled => Kind::Cancellation,
        }
    }

    /// Whether this failure, encountered mid-exchange, should suppress
    /// the usual request-body drain before closing the connection.
    ///
    /// Fatal handler bugs are the one kind that additionally suppress
    /// draining: the application is in an unknown state, so reading
    /// more of its request is not obviously safe.
    pub fn suppresses_drain(&self) -> bool {
        self.kind() == Kind::Handler
    }
}

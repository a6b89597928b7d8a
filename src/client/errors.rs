//! Client-specific error context, converting into the
//! crate-wide `error::Error` at the boundary where only `error::Kind`
//! still matters (logging, pool bookkeeping) -- the same two-tier shape
//! `server::Error` uses on the server side.
use std::io;

use error::Error as CoreError;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// I/O error on the connection's transport.
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// Wraps a core engine error (parse/policy/timeout/handler).
        Core(err: CoreError) {
            description("engine error")
            display("{}", err)
            from()
        }
        /// The connection is over its `inflight-request-limit` or is
        /// past its `safe-pipeline-timeout`; retry on another connection.
        Busy {
            description("connection can't accept another request right now")
        }
        /// A response arrived before any request had been written.
        PrematureResponseHeaders {
            description("response headers received before a request was sent")
        }
        /// Connection closed normally while idle; the pool should simply
        /// drop it rather than propagate this as a request failure.
        Closed {
            description("connection closed normally")
        }
        /// A queued request was cancelled by its caller.
        Cancelled {
            description("request cancelled")
        }
    }
}

impl From<Error> for CoreError {
    fn from(e: Error) -> CoreError {
        match e {
            Error::Io(e) => CoreError::Io(e),
            Error::Core(e) => e,
            Error::Busy => CoreError::Policy("connection busy"),
            Error::PrematureResponseHeaders => CoreError::Closed,
            Error::Closed => CoreError::Closed,
            Error::Cancelled => CoreError::Cancelled,
        }
    }
}

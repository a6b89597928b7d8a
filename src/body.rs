//! Lazy, cancellable byte-chunk sequence used for request/response bodies
//! plus the `Entity` metadata wrapper that carries one.
use std::time::SystemTime;

use futures::{Future, Stream};

use error::Error;

/// A source of body chunks. Implementations back this with a live
/// connection (the common case) or, for handler-constructed responses,
/// an in-memory buffer -- either way the sequence is consumed at most
/// once per `Body` instance.
pub trait BodySource: Send {
    /// Produce the next chunk, or `None` at the natural end of the body.
    /// Returns a boxed future so a connection-backed source can suspend
    /// on a transport read.
    fn poll_chunk(&mut self) -> Box<Future<Item=Option<Vec<u8>>, Error=Error>>;

    /// Stop reading early (e.g. the handler isn't interested in the
    /// rest). A drain-capable source should still consume and discard the
    /// remaining bytes so the connection can be reused; see
    /// `Body::drain`.
    fn close(&mut self);
}

/// A lazy, single-consumption sequence of byte chunks with an explicit
/// close. Wraps a `BodySource` trait object so the connection
/// driver, the gzip filter, and in-memory test bodies all produce the
/// same type.
pub struct Body {
    source: Option<Box<BodySource>>,
    consumed: bool,
}

impl Body {
    pub fn new(source: Box<BodySource>) -> Body {
        Body { source: Some(source), consumed: false }
    }

    /// A body with no bytes at all (bodyless responses, `HEAD`, etc).
    pub fn empty() -> Body {
        Body { source: None, consumed: true }
    }

    /// An in-memory body, useful for handler-constructed responses and
 /// tests; sharable in the sense since it can be read repeatedly by
    /// cloning before the first read.
    pub fn from_bytes(data: Vec<u8>) -> Body {
        Body::new(Box::new(MemorySource { data: data, pos: 0 }))
    }

    /// Read the next chunk. Panics (programmer error, like the base
    /// serializer) if called again after `None` was already returned.
    pub fn poll_chunk(&mut self) -> Box<Future<Item=Option<Vec<u8>>, Error=Error>> {
        assert!(!self.consumed, "Body polled after it reached its end");
        match self.source {
            Some(ref mut s) => s.poll_chunk(),
            None => Box::new(::futures::finished(None)),
        }
    }

    pub fn mark_consumed(&mut self) {
        self.consumed = true;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Read and discard every remaining chunk.
    pub fn drain(self) -> Box<Future<Item=(), Error=Error>> {
        let mut body = self;
        Box::new(::futures::future::loop_fn(body, |mut body| {
            body.poll_chunk().map(move |chunk| {
                match chunk {
                    Some(_) => ::futures::future::Loop::Continue(body),
                    None => {
                        body.mark_consumed();
                        ::futures::future::Loop::Break(())
                    }
                }
            })
        }))
    }

    pub fn close(&mut self) {
        if let Some(ref mut s) = self.source {
            s.close();
        }
        self.consumed = true;
    }
}

struct MemorySource {
    data: Vec<u8>,
    pos: usize,
}

impl BodySource for MemorySource {
    fn poll_chunk(&mut self) -> Box<Future<Item=Option<Vec<u8>>, Error=Error>> {
        if self.pos >= self.data.len() {
            Box::new(::futures::finished(None))
        } else {
            let chunk = self.data[self.pos..].to_vec();
            self.pos = self.data.len();
            Box::new(::futures::finished(Some(chunk)))
        }
    }
    fn close(&mut self) {
        self.pos = self.data.len();
    }
}

/// `Content-Encoding` values the engine understands well enough to act on
/// (gzip decode in the client filter pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Other,
}

impl<'a> From<&'a str> for ContentEncoding {
    fn from(s: &'a str) -> ContentEncoding {
        if s.eq_ignore_ascii_case("identity") || s.is_empty() {
            ContentEncoding::Identity
        } else if s.eq_ignore_ascii_case("gzip") || s.eq_ignore_ascii_case("x-gzip") {
            ContentEncoding::Gzip
        } else {
            ContentEncoding::Other
        }
    }
}

/// An etag value with its weak flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag {
    pub value: String,
    pub weak: bool,
}

/// Metadata plus a body (data model Entity). `sharable` records
/// whether the body factory can be invoked repeatedly -- true only for
/// `Body::from_bytes` and similar in-memory sources.
pub struct Entity {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_encoding: ContentEncoding,
    pub etag: Option<ETag>,
    pub last_modified: Option<SystemTime>,
    pub expires: Option<SystemTime>,
    pub sharable: bool,
    pub body: Body,
}

impl Entity {
    pub fn new(body: Body) -> Entity {
        Entity {
            content_type: None,
            content_length: None,
            content_encoding: ContentEncoding::Identity,
            etag: None,
            last_modified: None,
            expires: None,
            sharable: false,
            body: body,
        }
    }
}

//! Small shared helpers used by both connection drivers.
use std::mem;

use futures::{Future, Poll};
use futures::Async::{Ready, NotReady};

/// Optional future.
///
/// Holds either a result directly or a real, boxed future. Lets a caller
/// check a hot path (e.g. "is this filter a no-op for this request?")
/// without paying for a boxed future and a poll round trip when it isn't
/// needed.
pub enum OptFuture<I, E> {
    Future(Box<Future<Item=I, Error=E>>),
    Value(Result<I, E>),
    #[doc(hidden)]
    Done,
}

impl<I, E> OptFuture<I, E> {
    pub fn value(v: I) -> OptFuture<I, E> {
        OptFuture::Value(Ok(v))
    }
    pub fn error(e: E) -> OptFuture<I, E> {
        OptFuture::Value(Err(e))
    }
}

impl<I, E> Future for OptFuture<I, E> {
    type Item = I;
    type Error = E;
    fn poll(&mut self) -> Poll<I, E> {
        use self::OptFuture::*;
        let future = match mem::replace(self, Done) {
            Future(mut f) => match f.poll()? {
                Ready(v) => return Ok(Ready(v)),
                NotReady => f,
            },
            Value(v) => {
                return Ok(Ready(v?))
            }
            Done => unreachable!(),
        };
        *self = OptFuture::Future(future);
        Ok(NotReady)
    }
}

/// FNV-1a over a `(counter, thread id)` pair, used to mint a short id for
/// correlating a logged handler error with whatever an operator sees on
/// the wire.
pub fn hash_error_id(counter: u64, thread_tag: u64) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in counter.to_le_bytes().iter().chain(thread_tag.to_le_bytes().iter()) {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod test {
    use super::hash_error_id;

    #[test]
    fn hash_is_stable_and_varies() {
        assert_eq!(hash_error_id(1, 2), hash_error_id(1, 2));
        assert!(hash_error_id(1, 2) != hash_error_id(1, 3));
    }
}

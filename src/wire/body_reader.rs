//! Body framing readers: fixed-length, chunked, and until-FIN.
//!
//! All three share one contract: `parse()` grows the decoded-and-ready
//! prefix of the connection's `Buf` as bytes arrive, `check()` reports how
//! many of those bytes are ready plus whether the body has reached its
//! natural end, and `consume()` drops bytes the handler has taken. A
//! per-read timeout and a minimum aggregate throughput are enforced by the
//! connection driver around each `parse()` call using the `Clock` below,
//! mirroring the timeout composition in the client protocol driver.
use std::time::{Duration, Instant};

use tk_bufstream::Buf;

use error::Error;
use wire::chunked;
use wire::body_kind::BodyKind;

/// Wall-clock bookkeeping for one body read: enforces `read-timeout` per
/// read and `read-min-throughput` once `min_throughput_grace` has elapsed.
pub struct Clock {
    started: Instant,
    bytes_seen: u64,
    read_timeout: Duration,
    min_throughput: u64,
    min_throughput_grace: Duration,
}

impl Clock {
    pub fn new(read_timeout: Duration, min_throughput: u64) -> Clock {
        Clock {
            started: Instant::now(),
            bytes_seen: 0,
            read_timeout: read_timeout,
            min_throughput: min_throughput,
            min_throughput_grace: Duration::from_secs(10),
        }
    }

    pub fn note_read(&mut self, bytes: u64) {
        self.bytes_seen += bytes;
    }

    /// Timeout for the next individual `await-readable`.
    pub fn read_deadline(&self) -> Duration {
        self.read_timeout
    }

    /// `Err` once either the per-read timeout or the minimum throughput
    /// (checked only after the grace period) has been violated.
    pub fn check(&self) -> Result<(), Error> {
        let elapsed = self.started.elapsed();
        if elapsed > self.min_throughput_grace {
            let rate = self.bytes_seen * 1000
                / (elapsed.as_secs() * 1000 + elapsed.subsec_millis() as u64).max(1);
            if rate < self.min_throughput {
                debug!("body read stalled below {} bytes/s after {:?}, aborting",
                    self.min_throughput, elapsed);
                return Err(Error::Policy("read-min-throughput violated"));
            }
        }
        Ok(())
    }
}

/// Decode progress for one of the three body-framing variants.
#[derive(Debug)]
pub enum BodyProgress {
    Fixed(u64),
    Chunked(chunked::State),
    Eof,
}

impl BodyProgress {
    pub fn new(kind: BodyKind) -> BodyProgress {
        match kind {
            BodyKind::Fixed(n) => BodyProgress::Fixed(n),
            BodyKind::Chunked => BodyProgress::Chunked(chunked::State::new()),
            BodyKind::Eof => BodyProgress::Eof,
        }
    }

    /// Decode as much of `buf` as is currently framed. For chunked bodies
    /// this strips chunk-size lines from `buf` in place as they're
    /// recognized, exactly as `chunked::State::parse` does.
    pub fn parse(&mut self, buf: &mut Buf) -> Result<(), Error> {
        match *self {
            BodyProgress::Chunked(ref mut st) => {
                st.parse(buf)?;
                Ok(())
            }
            BodyProgress::Fixed(..) | BodyProgress::Eof => Ok(()),
        }
    }

    /// `(ready_bytes, is_final_read)` given the buffer currently holds
    /// `buf.len()` unconsumed bytes and `transport_done` reports whether
    /// the peer has FIN'd.
    pub fn check(&self, buf_len: usize, transport_done: bool) -> (usize, bool) {
        match *self {
            BodyProgress::Fixed(remaining) => {
                let ready = (remaining as usize).min(buf_len);
                (ready, ready as u64 == remaining)
            }
            BodyProgress::Chunked(ref st) => (st.buffered(), st.is_done()),
            BodyProgress::Eof => (buf_len, transport_done),
        }
    }

    pub fn consume(&mut self, n: usize) {
        match *self {
            BodyProgress::Fixed(ref mut remaining) => {
                *remaining -= n as u64;
            }
            BodyProgress::Chunked(ref mut st) => st.consume(n),
            BodyProgress::Eof => {}
        }
    }

    pub fn is_done(&self, buf_len: usize, transport_done: bool) -> bool {
        self.check(buf_len, transport_done).1
    }
}

#[cfg(test)]
mod test {
    use super::{BodyProgress, Clock};
    use wire::body_kind::BodyKind;
    use std::time::Duration;

    #[test]
    fn fixed_zero_is_immediately_done() {
        let progress = BodyProgress::new(BodyKind::Fixed(0));
        assert!(progress.is_done(0, false));
    }

    #[test]
    fn eof_needs_transport_done() {
        let progress = BodyProgress::new(BodyKind::Eof);
        assert!(!progress.is_done(5, false));
        assert!(progress.is_done(5, true));
    }

    #[test]
    fn clock_within_grace_never_fails_on_slow_start() {
        let clock = Clock::new(Duration::from_secs(15), 4096);
        assert!(clock.check().is_ok());
    }
}

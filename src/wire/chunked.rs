//! Chunked transfer-coding size-line scanner.
use httparse::{InvalidChunkSize, parse_chunk_size};
use tk_bufstream::Buf;

/// Tracks how much of a `Buf` is already-decoded chunk payload versus a
/// partially-read chunk-size line, across repeated `parse()` calls as more
/// bytes arrive.
#[derive(Debug, Clone)]
pub struct State {
    buffered: usize,
    pending: usize,
    done: bool,
}

impl State {
    pub fn new() -> State {
        State {
            buffered: 0,
            pending: 0,
            done: false,
        }
    }

    pub fn parse(&mut self, buf: &mut Buf) -> Result<(), InvalidChunkSize> {
        let State { ref mut buffered, ref mut pending, ref mut done } = *self;
        while *buffered < buf.len() {
            if *pending == 0 {
                use httparse::Status::*;
                match parse_chunk_size(&buf[*buffered..])? {
                    Complete((bytes, 0)) => {
                        buf.remove_range(*buffered..*buffered + bytes);
                        *done = true;
                    }
                    Complete((bytes, chunk_size)) => {
                        buf.remove_range(*buffered..*buffered + bytes);
                        *pending = chunk_size as usize;
                    }
                    Partial => {
                        return Ok(());
                    }
                }
            } else {
                if *buffered + *pending <= buf.len() {
                    *buffered += *pending;
                    *pending = 0;
                } else {
                    *pending -= buf.len() - *buffered;
                    *buffered = buf.len();
                }
            }
        }
        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.buffered
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn consume(&mut self, n: usize) {
        assert!(self.buffered >= n);
        self.buffered -= n;
    }
}

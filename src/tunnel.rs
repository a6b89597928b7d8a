//! CONNECT tunneller: once a `CONNECT` has been answered with a `2xx`,
//! bytes flow unparsed in both directions between the client-facing
//! connection and a second connection opened to the tunnel target.
//!
//! Takes already-split halves, the same shape `server::upgrade::Upgrader`
//! receives a hijacked connection in and the same shape
//! `server::proto`/`client::proto` keep their own sockets in, so handing
//! a connection off to a `Tunnel` needs no new transport abstraction.
use std::io;
use std::io::Write;

use futures::{Async, Future, Poll};
use tk_bufstream::{ReadBuf, WriteBuf};
use tokio_io::{AsyncRead, AsyncWrite};

/// Never buffer more of one direction than this many unwritten bytes
/// ahead of the peer before pausing reads on that side.
const HIGH_WATER_MARK: usize = 128 * 1024;

/// One direction of a tunnel: drains `cin` into `cout`, finishing once
/// `cin` has hit EOF and every byte read from it has been flushed out.
struct Pump<R, W> {
    cin: ReadBuf<R>,
    cout: WriteBuf<W>,
}

impl<R: AsyncRead, W: AsyncWrite> Pump<R, W> {
    fn new(cin: ReadBuf<R>, cout: WriteBuf<W>) -> Pump<R, W> {
        Pump { cin: cin, cout: cout }
    }

    fn step(&mut self) -> Result<(), io::Error> {
        if self.cout.out_buf.len() < HIGH_WATER_MARK {
            self.cin.read()?;
            if self.cin.in_buf.len() > 0 {
                self.cout.write_all(&self.cin.in_buf[..])?;
                let len = self.cin.in_buf.len();
                self.cin.in_buf.consume(len);
            }
        }
        self.cout.flush()?;
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.cin.done() && self.cin.in_buf.len() == 0 && self.cout.out_buf.len() == 0
    }
}

/// Drives both directions of a CONNECT tunnel to completion. Terminates
/// once both legs have hit EOF and drained; a transport error on either
/// leg fails the whole tunnel, dropping both connections.
pub struct Tunnel<A, B> {
    client_to_target: Pump<A, B>,
    target_to_client: Pump<B, A>,
}

impl<A, B> Tunnel<A, B>
    where A: AsyncRead + AsyncWrite, B: AsyncRead + AsyncWrite
{
    /// `client_cin`/`client_cout` are the client-facing connection's
    /// halves (as handed to an `Upgrader`); `target_cin`/`target_cout`
    /// are the freshly dialed target connection's, split the same way
    /// the driver splits its own socket.
    pub fn new(client_cin: ReadBuf<A>, client_cout: WriteBuf<A>,
        target_cin: ReadBuf<B>, target_cout: WriteBuf<B>) -> Tunnel<A, B>
    {
        Tunnel {
            client_to_target: Pump::new(client_cin, target_cout),
            target_to_client: Pump::new(target_cin, client_cout),
        }
    }
}

impl<A, B> Future for Tunnel<A, B>
    where A: AsyncRead + AsyncWrite, B: AsyncRead + AsyncWrite
{
    type Item = ();
    type Error = io::Error;

    fn poll(&mut self) -> Poll<(), io::Error> {
        self.client_to_target.step()?;
        self.target_to_client.step()?;
        if self.client_to_target.is_done() && self.target_to_client.is_done() {
            Ok(Async::Ready(()))
        } else {
            Ok(Async::NotReady)
        }
    }
}

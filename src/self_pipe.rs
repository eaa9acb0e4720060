//! A cross-platform wakeup primitive for the reactor, built from a connected
//! TCP loopback pair rather than a POSIX `pipe(2)`: a listener bound to an
//! ephemeral loopback port accepts a single connection from a client socket
//! connected to that same port, then the listener is dropped. Writing a
//! byte to the client's end wakes a blocked `select` on the listener-side
//! peer; the loop drains whatever it finds without caring about the exact
//! byte count.

use crate::address::{Address, Family};
use crate::error::{NetError, Result};
use crate::sys::RawSocket;

/// One end of a self-pipe: an already-connected, non-blocking TCP socket
/// pair used purely to carry wakeup bytes.
pub struct SelfPipe {
    reader: RawSocket,
    writer: RawSocket,
}

impl SelfPipe {
    /// Build a connected pair over the IPv4 loopback interface.
    pub fn new() -> Result<SelfPipe> {
        let listener = RawSocket::for_addr(
            &Address::loopback(Family::V4, 0).as_std(),
            tcp_type(),
            0,
        )
        .map_err(|e| NetError::runtime("self-pipe: create listener", e))?;
        listener
            .bind(&Address::loopback(Family::V4, 0).as_std())
            .map_err(|e| NetError::runtime("self-pipe: bind listener", e))?;
        listener
            .listen(1)
            .map_err(|e| NetError::runtime("self-pipe: listen", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| NetError::runtime("self-pipe: listener local_addr", e))?;

        let writer = RawSocket::for_addr(&addr, tcp_type(), 0)
            .map_err(|e| NetError::runtime("self-pipe: create writer", e))?;
        // A non-blocking connect to our own just-bound loopback listener
        // completes effectively immediately; poll for the accepted peer
        // with a short bounded retry rather than assuming single-shot.
        match writer.connect(&addr) {
            Ok(()) => {}
            Err(e) => return Err(NetError::runtime("self-pipe: connect writer", e)),
        }

        let mut reader = None;
        for _ in 0..1000 {
            match listener.accept() {
                Ok(Some((sock, _peer))) => {
                    reader = Some(sock);
                    break;
                }
                Ok(None) => std::thread::yield_now(),
                Err(e) => return Err(NetError::runtime("self-pipe: accept", e)),
            }
        }
        let reader = reader.ok_or_else(|| {
            NetError::runtime(
                "self-pipe: accept never completed",
                std::io::Error::new(std::io::ErrorKind::TimedOut, "self-pipe handshake"),
            )
        })?;
        // `listener` is dropped here, closing the bind socket; the accepted
        // `reader` descriptor is independent and keeps working.

        Ok(SelfPipe { reader, writer })
    }

    /// Write a single wakeup byte. Safe to call from any thread.
    pub fn wake(&self) -> Result<()> {
        match self.writer.send(&[1u8]) {
            Ok(_) => Ok(()),
            Err(e) => Err(NetError::runtime("self-pipe: wake", e)),
        }
    }

    /// Drain every byte currently queued, called from the loop thread after
    /// the reader side reports readable.
    pub fn drain(&self) -> Result<()> {
        let mut buf = [0u8; 64];
        loop {
            match self.reader.recv(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) if n < buf.len() => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(NetError::runtime("self-pipe: drain", e)),
            }
        }
    }

    pub(crate) fn reader(&self) -> &RawSocket {
        &self.reader
    }
}

#[cfg(unix)]
fn tcp_type() -> libc::c_int {
    libc::SOCK_STREAM
}
#[cfg(windows)]
fn tcp_type() -> i32 {
    windows_sys::Win32::Networking::WinSock::SOCK_STREAM as i32
}

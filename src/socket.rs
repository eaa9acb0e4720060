//! Socket handle: an owning, non-blocking wrapper over a single OS
//! descriptor.

use std::io;
use std::net::Shutdown;

use crate::address::Address;
use crate::error::{NetError, Result};
use crate::sys::RawSocket;

/// Retry `f` transparently on `Interrupted`, matching the "interruption
/// sentinels are retried at the call site" contract for socket operations
/// (the selector has its own identical retry loop for the same reason).
fn retry_on_interrupt<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Which half of a stream socket to shut down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownMode {
    /// No further reads.
    Read,
    /// No further writes.
    Write,
    /// Neither.
    Both,
}

impl From<ShutdownMode> for Shutdown {
    fn from(mode: ShutdownMode) -> Shutdown {
        match mode {
            ShutdownMode::Read => Shutdown::Read,
            ShutdownMode::Write => Shutdown::Write,
            ShutdownMode::Both => Shutdown::Both,
        }
    }
}

/// The socket's connection-state machine.
///
/// Stream sockets: `Unbound -> Bound -> (Listening | Connecting -> Connected
/// -> HalfClosed -> Closed)`. Datagram sockets: `Unbound -> Bound ->
/// (Unconnected | Associated)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketState {
    Unbound,
    Bound,
    Listening,
    Connecting,
    Connected,
    HalfClosed,
    Unconnected,
    Associated,
    Closed,
}

/// An owning, non-blocking wrapper over zero or one OS descriptor.
///
/// Closes the descriptor on drop if it is still owned; after
/// [`Socket::detach`] the destructor is a no-op.
pub struct Socket {
    inner: Option<RawSocket>,
    state: SocketState,
}

impl Socket {
    /// An empty socket, holding no descriptor.
    pub fn empty() -> Socket {
        Socket {
            inner: None,
            state: SocketState::Unbound,
        }
    }

    /// Create a non-blocking TCP (stream) socket for the given address
    /// family.
    pub fn create_tcp(family: crate::address::Family) -> Result<Socket> {
        let addr = match family {
            crate::address::Family::V4 => Address::any(0),
            crate::address::Family::V6 => Address::loopback(crate::address::Family::V6, 0),
        };
        let raw = RawSocket::for_addr(&addr.as_std(), tcp_type(), tcp_protocol())
            .map_err(|e| NetError::runtime("create tcp socket", e))?;
        Ok(Socket {
            inner: Some(raw),
            state: SocketState::Unbound,
        })
    }

    /// Create a non-blocking UDP (datagram) socket for the given address
    /// family.
    pub fn create_udp(family: crate::address::Family) -> Result<Socket> {
        let addr = match family {
            crate::address::Family::V4 => Address::any(0),
            crate::address::Family::V6 => Address::loopback(crate::address::Family::V6, 0),
        };
        let raw = RawSocket::for_addr(&addr.as_std(), udp_type(), udp_protocol())
            .map_err(|e| NetError::runtime("create udp socket", e))?;
        Ok(Socket {
            inner: Some(raw),
            state: SocketState::Unbound,
        })
    }

    /// Wrap an already-constructed raw socket (e.g. one returned by
    /// `accept`), in `Connected` state.
    pub(crate) fn attach(raw: RawSocket, state: SocketState) -> Socket {
        Socket {
            inner: Some(raw),
            state,
        }
    }

    pub(crate) fn raw(&self) -> Result<&RawSocket> {
        self.inner.as_ref().ok_or_else(|| NetError::logic("operation on a closed socket"))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn bind(&mut self, addr: &Address) -> Result<()> {
        self.raw()?.bind(&addr.as_std()).map_err(|e| NetError::runtime("bind", e))?;
        self.state = SocketState::Bound;
        Ok(())
    }

    pub fn listen(&mut self, backlog: i32) -> Result<()> {
        self.raw()?.listen(backlog).map_err(|e| NetError::runtime("listen", e))?;
        self.state = SocketState::Listening;
        Ok(())
    }

    /// Accept a pending connection. `Ok(None)` means would-block: the caller
    /// should wait for the next read-readiness notification.
    pub fn accept(&self) -> Result<Option<(Socket, Address)>> {
        let raw = self.raw()?;
        match retry_on_interrupt(|| raw.accept()) {
            Ok(Some((raw, addr))) => Ok(Some((
                Socket::attach(raw, SocketState::Connected),
                Address::from(addr),
            ))),
            Ok(None) => Ok(None),
            Err(e) => Err(NetError::runtime("accept", e)),
        }
    }

    /// Begin a non-blocking connect. The caller must await writability and
    /// then call [`Socket::take_error`] to learn whether it actually
    /// succeeded.
    pub fn connect(&mut self, addr: &Address) -> Result<()> {
        let raw = self.raw()?;
        retry_on_interrupt(|| raw.connect(&addr.as_std())).map_err(|e| NetError::runtime("connect", e))?;
        self.state = SocketState::Connecting;
        Ok(())
    }

    /// Fix the socket's default peer for unaddressed `send`, without the
    /// TCP-style `Connecting` handshake state (a datagram "connect" completes
    /// synchronously at the OS level; it only ever records a default peer).
    pub(crate) fn associate(&mut self, addr: &Address) -> Result<()> {
        let raw = self.raw()?;
        retry_on_interrupt(|| raw.connect(&addr.as_std())).map_err(|e| NetError::runtime("connect", e))?;
        self.state = SocketState::Associated;
        Ok(())
    }

    /// Mark the connection established after a successful non-blocking
    /// connect (called once write-readiness confirms it).
    pub(crate) fn mark_connected(&mut self) {
        self.state = SocketState::Connected;
    }

    pub(crate) fn mark_half_closed(&mut self) {
        self.state = SocketState::HalfClosed;
    }

    pub fn shutdown(&self, mode: ShutdownMode) -> Result<()> {
        self.raw()?.shutdown(mode.into()).map_err(|e| NetError::runtime("shutdown", e))
    }

    /// Close the descriptor explicitly (also happens implicitly on drop).
    pub fn close(&mut self) {
        self.inner = None;
        self.state = SocketState::Closed;
    }

    /// Release ownership of the descriptor without closing it. After this,
    /// drop is a no-op — used when a descriptor's lifetime has been handed
    /// elsewhere (e.g. to an async wrapper that re-attaches it).
    pub fn detach(&mut self) -> Option<RawSocket> {
        self.inner.take()
    }

    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let raw = self.raw()?;
        retry_on_interrupt(|| raw.send(data)).map_err(|e| NetError::runtime("send", e))
    }

    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let raw = self.raw()?;
        retry_on_interrupt(|| raw.recv(buf)).map_err(|e| NetError::runtime("recv", e))
    }

    pub fn send_to(&self, data: &[u8], addr: &Address) -> Result<usize> {
        let raw = self.raw()?;
        retry_on_interrupt(|| raw.sendto(data, &addr.as_std())).map_err(|e| NetError::runtime("sendto", e))
    }

    /// `Ok(None)` on would-block.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, Address)>> {
        let raw = self.raw()?;
        retry_on_interrupt(|| raw.recvfrom(buf))
            .map(|opt| opt.map(|(n, a)| (n, Address::from(a))))
            .map_err(|e| NetError::runtime("recvfrom", e))
    }

    pub fn local_address(&self) -> Result<Address> {
        self.raw()?.local_addr().map(Address::from).map_err(|e| NetError::runtime("local_addr", e))
    }

    pub fn peer_address(&self) -> Result<Address> {
        self.raw()?.peer_addr().map(Address::from).map_err(|e| NetError::runtime("peer_addr", e))
    }

    /// Consume and clear the socket's pending error, used to learn the
    /// outcome of a non-blocking connect once the descriptor is writable.
    pub fn take_error(&self) -> Result<Option<std::io::Error>> {
        self.raw()?.take_error().map_err(|e| NetError::runtime("getsockopt(SO_ERROR)", e))
    }

    pub fn set_blocking(&self, blocking: bool) -> Result<()> {
        self.raw()?
            .set_nonblocking(!blocking)
            .map_err(|e| NetError::runtime("set_nonblocking", e))
    }

    pub fn set_reuse_address(&self, value: bool) -> Result<()> {
        self.raw()?.set_reuse_address(value).map_err(|e| NetError::runtime("SO_REUSEADDR", e))
    }

    pub fn set_reuse_port(&self, value: bool) -> Result<()> {
        self.raw()?.set_reuse_port(value).map_err(|e| NetError::runtime("SO_REUSEPORT", e))
    }

    pub fn set_no_delay(&self, value: bool) -> Result<()> {
        self.raw()?.set_no_delay(value).map_err(|e| NetError::runtime("TCP_NODELAY", e))
    }

    pub fn set_keep_alive(&self, value: bool) -> Result<()> {
        self.raw()?.set_keep_alive(value).map_err(|e| NetError::runtime("SO_KEEPALIVE", e))
    }

    pub fn set_send_buffer_size(&self, size: i32) -> Result<()> {
        self.raw()?.set_send_buffer_size(size).map_err(|e| NetError::runtime("SO_SNDBUF", e))
    }

    pub fn set_recv_buffer_size(&self, size: i32) -> Result<()> {
        self.raw()?.set_recv_buffer_size(size).map_err(|e| NetError::runtime("SO_RCVBUF", e))
    }

    pub(crate) fn raw_descriptor(&self) -> Option<crate::sys::RawDescriptor> {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            self.inner.as_ref().map(|r| r.as_raw_fd())
        }
        #[cfg(windows)]
        {
            self.inner.as_ref().map(|r| r.raw())
        }
    }
}

#[cfg(unix)]
fn tcp_type() -> libc::c_int {
    libc::SOCK_STREAM
}
#[cfg(unix)]
fn tcp_protocol() -> libc::c_int {
    0
}
#[cfg(unix)]
fn udp_type() -> libc::c_int {
    libc::SOCK_DGRAM
}
#[cfg(unix)]
fn udp_protocol() -> libc::c_int {
    0
}

#[cfg(windows)]
fn tcp_type() -> i32 {
    windows_sys::Win32::Networking::WinSock::SOCK_STREAM as i32
}
#[cfg(windows)]
fn tcp_protocol() -> i32 {
    0
}
#[cfg(windows)]
fn udp_type() -> i32 {
    windows_sys::Win32::Networking::WinSock::SOCK_DGRAM as i32
}
#[cfg(windows)]
fn udp_protocol() -> i32 {
    0
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket").field("state", &self.state).finish()
    }
}

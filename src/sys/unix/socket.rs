//! A raw, non-blocking BSD socket, owning exactly one descriptor.
//!
//! Sockets are created non-blocking and close-on-exec up front
//! (`SOCK_NONBLOCK | SOCK_CLOEXEC` where the platform supports it in the
//! `socket(2)` call itself, `fcntl` fallback on Darwin).

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

use crate::macros::syscall;
use crate::sys::unix::net::{domain_for, from_sockaddr, to_sockaddr};

/// A raw, owned, non-blocking socket descriptor.
#[derive(Debug)]
pub struct RawSocket {
    fd: RawFd,
}

impl RawSocket {
    pub fn new(domain: libc::c_int, socket_type: libc::c_int, protocol: libc::c_int) -> io::Result<RawSocket> {
        #[cfg(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        let socket_type = socket_type | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;

        let fd = syscall!(socket(domain, socket_type, protocol))?;

        #[cfg(any(target_os = "ios", target_os = "macos", target_os = "solaris"))]
        {
            if let Err(err) = syscall!(fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK))
                .and_then(|_| syscall!(fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC)))
            {
                let _ = syscall!(close(fd));
                return Err(err);
            }
        }

        Ok(unsafe { RawSocket::from_raw_fd(fd) })
    }

    pub fn for_addr(addr: &SocketAddr, socket_type: libc::c_int, protocol: libc::c_int) -> io::Result<RawSocket> {
        RawSocket::new(domain_for(addr), socket_type, protocol)
    }

    pub fn bind(&self, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = to_sockaddr(addr);
        syscall!(bind(
            self.fd,
            &storage as *const _ as *const libc::sockaddr,
            len
        ))
        .map(|_| ())
    }

    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        syscall!(listen(self.fd, backlog)).map(|_| ())
    }

    /// Non-blocking connect. An `EINPROGRESS` result is folded into `Ok(())`:
    /// the caller is expected to await writability and then check
    /// `take_error` to learn the outcome.
    pub fn connect(&self, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = to_sockaddr(addr);
        match syscall!(connect(
            self.fd,
            &storage as *const _ as *const libc::sockaddr,
            len
        )) {
            Ok(_) => Ok(()),
            Err(ref err) if err.raw_os_error() == Some(libc::EINPROGRESS) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Accept a pending connection. Returns `Ok(None)` on would-block.
    pub fn accept(&self) -> io::Result<Option<(RawSocket, SocketAddr)>> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

        #[cfg(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux",
            target_os = "openbsd"
        ))]
        let accepted = syscall!(accept4(
            self.fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
            libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
        ));

        #[cfg(any(target_os = "ios", target_os = "macos", target_os = "netbsd", target_os = "solaris"))]
        let accepted = syscall!(accept(
            self.fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
        ))
        .and_then(|fd| {
            syscall!(fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC))?;
            syscall!(fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK))?;
            Ok(fd)
        });

        match accepted {
            Ok(fd) => {
                let peer = from_sockaddr(&storage)?;
                Ok(Some((unsafe { RawSocket::from_raw_fd(fd) }, peer)))
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// `Ok(0)` on would-block, `Err` on any other failure.
    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        match syscall!(send(
            self.fd,
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
            0
        )) {
            Ok(n) => Ok(n as usize),
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// `Ok(0)` on would-block *or* peer shutdown (the caller must
    /// distinguish would-block from "peer closed" using readiness state; see
    /// `crate::net::tcp_stream` which only calls this when read-ready).
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match syscall!(recv(
            self.fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
            0
        )) {
            Ok(n) => Ok(n as usize),
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(err) => Err(err),
        }
    }

    pub fn sendto(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize> {
        let (storage, len) = to_sockaddr(addr);
        match syscall!(sendto(
            self.fd,
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
            0,
            &storage as *const _ as *const libc::sockaddr,
            len
        )) {
            Ok(n) => Ok(n as usize),
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Returns `Ok(None)` on would-block.
    pub fn recvfrom(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        match syscall!(recvfrom(
            self.fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
            0,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len
        )) {
            Ok(n) => {
                let peer = from_sockaddr(&storage)?;
                Ok(Some((n as usize, peer)))
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn shutdown(&self, how: std::net::Shutdown) -> io::Result<()> {
        let how = match how {
            std::net::Shutdown::Read => libc::SHUT_RD,
            std::net::Shutdown::Write => libc::SHUT_WR,
            std::net::Shutdown::Both => libc::SHUT_RDWR,
        };
        syscall!(shutdown(self.fd, how)).map(|_| ())
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        syscall!(getsockname(
            self.fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len
        ))?;
        from_sockaddr(&storage)
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        syscall!(getpeername(
            self.fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len
        ))?;
        from_sockaddr(&storage)
    }

    /// The pending error stored by the kernel for this socket, consumed in
    /// the process (the standard way to learn whether a non-blocking
    /// `connect` succeeded once the descriptor becomes writable).
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut errno: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        syscall!(getsockopt(
            self.fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut errno as *mut _ as *mut libc::c_void,
            &mut len
        ))?;
        if errno == 0 {
            Ok(None)
        } else {
            Ok(Some(io::Error::from_raw_os_error(errno)))
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let flags = syscall!(fcntl(self.fd, libc::F_GETFL))?;
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        syscall!(fcntl(self.fd, libc::F_SETFL, flags)).map(|_| ())
    }

    fn set_bool_opt(&self, level: libc::c_int, name: libc::c_int, value: bool) -> io::Result<()> {
        let v: libc::c_int = value as libc::c_int;
        syscall!(setsockopt(
            self.fd,
            level,
            name,
            &v as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t
        ))
        .map(|_| ())
    }

    pub fn set_reuse_address(&self, value: bool) -> io::Result<()> {
        self.set_bool_opt(libc::SOL_SOCKET, libc::SO_REUSEADDR, value)
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "macos", target_os = "ios"))]
    pub fn set_reuse_port(&self, value: bool) -> io::Result<()> {
        self.set_bool_opt(libc::SOL_SOCKET, libc::SO_REUSEPORT, value)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "macos", target_os = "ios")))]
    pub fn set_reuse_port(&self, _value: bool) -> io::Result<()> {
        Ok(())
    }

    pub fn set_no_delay(&self, value: bool) -> io::Result<()> {
        self.set_bool_opt(libc::IPPROTO_TCP, libc::TCP_NODELAY, value)
    }

    pub fn set_keep_alive(&self, value: bool) -> io::Result<()> {
        self.set_bool_opt(libc::SOL_SOCKET, libc::SO_KEEPALIVE, value)
    }

    pub fn set_send_buffer_size(&self, size: i32) -> io::Result<()> {
        syscall!(setsockopt(
            self.fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &size as *const _ as *const libc::c_void,
            mem::size_of::<i32>() as libc::socklen_t
        ))
        .map(|_| ())
    }

    pub fn set_recv_buffer_size(&self, size: i32) -> io::Result<()> {
        syscall!(setsockopt(
            self.fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &size as *const _ as *const libc::c_void,
            mem::size_of::<i32>() as libc::socklen_t
        ))
        .map(|_| ())
    }
}

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl FromRawFd for RawSocket {
    unsafe fn from_raw_fd(fd: RawFd) -> RawSocket {
        RawSocket { fd }
    }
}

impl IntoRawFd for RawSocket {
    fn into_raw_fd(self) -> RawFd {
        let fd = self.fd;
        mem::forget(self);
        fd
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        let _ = syscall!(close(self.fd));
    }
}

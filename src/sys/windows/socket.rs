//! A raw, non-blocking WinSock socket, owning exactly one `SOCKET` handle.
//!
//! Structurally mirrors `crate::sys::unix::socket::RawSocket`; the
//! differences are entirely in which OS entry points do the work
//! (`WSASocketW`/`ioctlsocket`/`closesocket` in place of `socket(2)`/
//! `fcntl`/`close`).

use std::io;
use std::mem;
use std::net::SocketAddr;

use windows_sys::Win32::Networking::WinSock::{
    self, FIONBIO, INVALID_SOCKET, IPPROTO_TCP, SOCKADDR_STORAGE, SOCKET, SOCKET_ERROR,
    SOL_SOCKET, SO_ERROR, SO_KEEPALIVE, SO_RCVBUF, SO_REUSEADDR, SO_SNDBUF, TCP_NODELAY,
};

use super::ensure_winsock;
use super::net::{domain_for, from_sockaddr, to_sockaddr};

fn last_error() -> io::Error {
    io::Error::from_raw_os_error(unsafe { WinSock::WSAGetLastError() })
}

#[derive(Debug)]
pub struct RawSocket {
    sock: SOCKET,
}

impl RawSocket {
    pub fn new(domain: i32, socket_type: i32, protocol: i32) -> io::Result<RawSocket> {
        ensure_winsock();
        let sock = unsafe { WinSock::socket(domain, socket_type, protocol) };
        if sock == INVALID_SOCKET {
            return Err(last_error());
        }
        let socket = RawSocket { sock };
        socket.set_nonblocking(true)?;
        Ok(socket)
    }

    pub fn for_addr(addr: &SocketAddr, socket_type: i32, protocol: i32) -> io::Result<RawSocket> {
        RawSocket::new(domain_for(addr), socket_type, protocol)
    }

    pub fn bind(&self, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = to_sockaddr(addr);
        let res = unsafe {
            WinSock::bind(self.sock, &storage as *const _ as *const WinSock::SOCKADDR, len)
        };
        if res == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        if unsafe { WinSock::listen(self.sock, backlog) } == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn connect(&self, addr: &SocketAddr) -> io::Result<()> {
        let (storage, len) = to_sockaddr(addr);
        let res = unsafe {
            WinSock::connect(self.sock, &storage as *const _ as *const WinSock::SOCKADDR, len)
        };
        if res == SOCKET_ERROR {
            let err = last_error();
            if err.raw_os_error() == Some(WinSock::WSAEWOULDBLOCK) {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn accept(&self) -> io::Result<Option<(RawSocket, SocketAddr)>> {
        let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<SOCKADDR_STORAGE>() as i32;
        let accepted = unsafe {
            WinSock::accept(
                self.sock,
                &mut storage as *mut _ as *mut WinSock::SOCKADDR,
                &mut len,
            )
        };
        if accepted == INVALID_SOCKET {
            let err = last_error();
            if err.raw_os_error() == Some(WinSock::WSAEWOULDBLOCK) {
                return Ok(None);
            }
            return Err(err);
        }
        let socket = RawSocket { sock: accepted };
        socket.set_nonblocking(true)?;
        let peer = from_sockaddr(&storage)?;
        Ok(Some((socket, peer)))
    }

    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { WinSock::send(self.sock, buf.as_ptr(), buf.len() as i32, 0) };
        if n == SOCKET_ERROR {
            let err = last_error();
            if err.raw_os_error() == Some(WinSock::WSAEWOULDBLOCK) {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(n as usize)
    }

    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { WinSock::recv(self.sock, buf.as_mut_ptr(), buf.len() as i32, 0) };
        if n == SOCKET_ERROR {
            let err = last_error();
            if err.raw_os_error() == Some(WinSock::WSAEWOULDBLOCK) {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(n as usize)
    }

    pub fn sendto(&self, buf: &[u8], addr: &SocketAddr) -> io::Result<usize> {
        let (storage, len) = to_sockaddr(addr);
        let n = unsafe {
            WinSock::sendto(
                self.sock,
                buf.as_ptr(),
                buf.len() as i32,
                0,
                &storage as *const _ as *const WinSock::SOCKADDR,
                len,
            )
        };
        if n == SOCKET_ERROR {
            let err = last_error();
            if err.raw_os_error() == Some(WinSock::WSAEWOULDBLOCK) {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(n as usize)
    }

    pub fn recvfrom(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<SOCKADDR_STORAGE>() as i32;
        let n = unsafe {
            WinSock::recvfrom(
                self.sock,
                buf.as_mut_ptr(),
                buf.len() as i32,
                0,
                &mut storage as *mut _ as *mut WinSock::SOCKADDR,
                &mut len,
            )
        };
        if n == SOCKET_ERROR {
            let err = last_error();
            if err.raw_os_error() == Some(WinSock::WSAEWOULDBLOCK) {
                return Ok(None);
            }
            return Err(err);
        }
        let peer = from_sockaddr(&storage)?;
        Ok(Some((n as usize, peer)))
    }

    pub fn shutdown(&self, how: std::net::Shutdown) -> io::Result<()> {
        let how = match how {
            std::net::Shutdown::Read => WinSock::SD_RECEIVE,
            std::net::Shutdown::Write => WinSock::SD_SEND,
            std::net::Shutdown::Both => WinSock::SD_BOTH,
        };
        if unsafe { WinSock::shutdown(self.sock, how) } == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<SOCKADDR_STORAGE>() as i32;
        if unsafe {
            WinSock::getsockname(self.sock, &mut storage as *mut _ as *mut WinSock::SOCKADDR, &mut len)
        } == SOCKET_ERROR
        {
            return Err(last_error());
        }
        from_sockaddr(&storage)
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<SOCKADDR_STORAGE>() as i32;
        if unsafe {
            WinSock::getpeername(self.sock, &mut storage as *mut _ as *mut WinSock::SOCKADDR, &mut len)
        } == SOCKET_ERROR
        {
            return Err(last_error());
        }
        from_sockaddr(&storage)
    }

    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut errno: i32 = 0;
        let mut len = mem::size_of::<i32>() as i32;
        if unsafe {
            WinSock::getsockopt(
                self.sock,
                SOL_SOCKET,
                SO_ERROR,
                &mut errno as *mut _ as *mut u8,
                &mut len,
            )
        } == SOCKET_ERROR
        {
            return Err(last_error());
        }
        if errno == 0 {
            Ok(None)
        } else {
            Ok(Some(io::Error::from_raw_os_error(errno)))
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let mut mode: u32 = nonblocking as u32;
        if unsafe { WinSock::ioctlsocket(self.sock, FIONBIO, &mut mode) } == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    fn set_bool_opt(&self, level: i32, name: i32, value: bool) -> io::Result<()> {
        let v: i32 = value as i32;
        let bytes = v.to_ne_bytes();
        if unsafe { WinSock::setsockopt(self.sock, level, name, bytes.as_ptr(), bytes.len() as i32) }
            == SOCKET_ERROR
        {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn set_reuse_address(&self, value: bool) -> io::Result<()> {
        self.set_bool_opt(SOL_SOCKET, SO_REUSEADDR, value)
    }

    /// WinSock has no `SO_REUSEPORT`; `SO_REUSEADDR` already allows rebinding
    /// on Windows, so this is a no-op that reports success.
    pub fn set_reuse_port(&self, _value: bool) -> io::Result<()> {
        Ok(())
    }

    pub fn set_no_delay(&self, value: bool) -> io::Result<()> {
        self.set_bool_opt(IPPROTO_TCP as i32, TCP_NODELAY, value)
    }

    pub fn set_keep_alive(&self, value: bool) -> io::Result<()> {
        self.set_bool_opt(SOL_SOCKET, SO_KEEPALIVE, value)
    }

    pub fn set_send_buffer_size(&self, size: i32) -> io::Result<()> {
        self.set_bool_opt_raw(SOL_SOCKET, SO_SNDBUF, size)
    }

    pub fn set_recv_buffer_size(&self, size: i32) -> io::Result<()> {
        self.set_bool_opt_raw(SOL_SOCKET, SO_RCVBUF, size)
    }

    fn set_bool_opt_raw(&self, level: i32, name: i32, value: i32) -> io::Result<()> {
        let bytes = value.to_ne_bytes();
        if unsafe { WinSock::setsockopt(self.sock, level, name, bytes.as_ptr(), bytes.len() as i32) }
            == SOCKET_ERROR
        {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub(crate) fn raw(&self) -> SOCKET {
        self.sock
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            WinSock::closesocket(self.sock);
        }
    }
}

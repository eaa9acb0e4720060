//! Async TCP acceptor: a non-blocking listening socket bound to an event
//! loop.

use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::error::{NetError, Result};
use crate::handler::EventHandler;
use crate::macros::{trace, warn};
use crate::reactor::EventLoop;
use crate::socket::Socket;

/// Configuration accepted by [`TcpAcceptor::open`].
#[derive(Clone, Copy, Debug)]
pub struct AcceptorOptions {
    pub reuse_address: bool,
    pub reuse_port: bool,
    pub backlog: i32,
}

impl Default for AcceptorOptions {
    fn default() -> AcceptorOptions {
        AcceptorOptions {
            reuse_address: true,
            reuse_port: false,
            backlog: default_backlog(),
        }
    }
}

#[cfg(unix)]
fn default_backlog() -> i32 {
    libc::SOMAXCONN
}
#[cfg(windows)]
fn default_backlog() -> i32 {
    windows_sys::Win32::Networking::WinSock::SOMAXCONN as i32
}

type AcceptedCallback = Box<dyn FnMut(&Arc<TcpAcceptor>, Socket, Address) -> bool + Send>;
type ErrorCallback = Box<dyn FnMut(&Arc<TcpAcceptor>, &NetError) + Send>;

/// A non-blocking listening socket: opens, accepts in a loop on
/// read-readiness, and hands each accepted connection to a user callback.
///
/// The accepted callback receives the new connection's [`Socket`] by value.
/// If it wants to keep the connection it moves the socket elsewhere (for
/// instance into [`super::TcpConnection::from_accepted`]) and returns
/// `true`; if it returns `false` without moving the socket out, the socket
/// is simply dropped — and closed — when the callback call returns. No
/// separate "close the new descriptor" step is needed on this side of the
/// FFI boundary the original crosses.
pub struct TcpAcceptor {
    event_loop: Arc<EventLoop>,
    socket: Mutex<Socket>,
    handler: Mutex<Option<Arc<EventHandler>>>,
    accepted: Mutex<Option<AcceptedCallback>>,
    on_error: Mutex<Option<ErrorCallback>>,
}

impl TcpAcceptor {
    /// A new, unopened acceptor bound to `event_loop`.
    pub fn new(event_loop: &Arc<EventLoop>) -> Arc<TcpAcceptor> {
        Arc::new(TcpAcceptor {
            event_loop: Arc::clone(event_loop),
            socket: Mutex::new(Socket::empty()),
            handler: Mutex::new(None),
            accepted: Mutex::new(None),
            on_error: Mutex::new(None),
        })
    }

    /// Set the callback invoked for each newly accepted connection.
    pub fn set_accepted_callback<F>(&self, cb: F)
    where
        F: FnMut(&Arc<TcpAcceptor>, Socket, Address) -> bool + Send + 'static,
    {
        *self.accepted.lock().unwrap() = Some(Box::new(cb));
    }

    /// Set the callback invoked on a terminal `accept` failure. If unset,
    /// the error is logged at `warn` level and the listener keeps running.
    pub fn set_error_callback<F>(&self, cb: F)
    where
        F: FnMut(&Arc<TcpAcceptor>, &NetError) + Send + 'static,
    {
        *self.on_error.lock().unwrap() = Some(Box::new(cb));
    }

    /// Create the listening socket (if not already created), apply reuse
    /// options, bind, listen with `options.backlog`, and register
    /// read-interest with the loop.
    pub fn open(self: &Arc<Self>, addr: &Address, options: AcceptorOptions) -> Result<()> {
        let mut socket = Socket::create_tcp(addr.family())?;
        socket.set_reuse_address(options.reuse_address)?;
        socket.set_reuse_port(options.reuse_port)?;
        socket.bind(addr)?;
        socket.listen(options.backlog)?;

        let descriptor = socket
            .raw_descriptor()
            .ok_or_else(|| NetError::logic("acceptor socket has no descriptor after listen"))?;

        *self.socket.lock().unwrap() = socket;

        let handler = EventHandler::new(&self.event_loop, descriptor);
        let this = Arc::clone(self);
        handler.set_read_callback(move || this.on_readable());
        handler.enable_read();
        *self.handler.lock().unwrap() = Some(handler);
        trace!("tcp acceptor: listening on {addr}");
        Ok(())
    }

    /// The address the listening socket is bound to.
    pub fn local_address(&self) -> Result<Address> {
        self.socket.lock().unwrap().local_address()
    }

    fn on_readable(self: &Arc<Self>) {
        loop {
            let accepted = self.socket.lock().unwrap().accept();
            match accepted {
                Ok(Some((new_socket, peer))) => {
                    trace!("tcp acceptor: accepted connection from {peer}");
                    match self.accepted.lock().unwrap().as_mut() {
                        Some(cb) => {
                            let _ = cb(self, new_socket, peer);
                        }
                        None => warn!("tcp acceptor: no accepted callback set, dropping {peer}"),
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    match self.on_error.lock().unwrap().as_mut() {
                        Some(cb) => cb(self, &err),
                        None => warn!("tcp acceptor: accept error: {err}"),
                    }
                    break;
                }
            }
        }
    }

    /// Detach the handler and close the listening socket.
    pub fn close(self: &Arc<Self>) {
        if let Some(handler) = self.handler.lock().unwrap().take() {
            handler.detach();
        }
        self.socket.lock().unwrap().close();
    }
}

impl std::fmt::Debug for TcpAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpAcceptor")
            .field("local_address", &self.local_address().ok())
            .finish()
    }
}

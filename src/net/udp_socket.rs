//! Async UDP endpoint: a non-blocking datagram socket with a deferred-send
//! queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::error::{NetError, Result};
use crate::handler::EventHandler;
use crate::macros::{trace, warn};
use crate::reactor::EventLoop;
use crate::socket::Socket;

/// One receive buffer's worth of scratch space; datagrams are delivered one
/// at a time so a single reusable MTU-sized buffer is enough.
const MTU: usize = 1500;

type ReceivedCallback = Box<dyn FnMut(&Arc<UdpEndpoint>, &[u8], Address) + Send>;

/// Configuration accepted by [`UdpEndpoint::open`].
#[derive(Clone, Copy, Debug, Default)]
pub struct UdpOptions {
    pub reuse_address: bool,
    pub reuse_port: bool,
    pub send_buffer: Option<i32>,
    pub recv_buffer: Option<i32>,
}

/// A non-blocking datagram socket. `send_to`/`send` never block: an empty
/// queue on the loop thread gets one immediate `sendto` attempt, otherwise
/// the datagram is queued and write-interest is enabled.
pub struct UdpEndpoint {
    event_loop: Arc<EventLoop>,
    socket: Mutex<Socket>,
    handler: Mutex<Option<Arc<EventHandler>>>,
    default_peer: Mutex<Option<Address>>,
    outbound: Mutex<VecDeque<(Vec<u8>, Address)>>,
    recv_scratch: Mutex<Vec<u8>>,
    received_cb: Mutex<Option<ReceivedCallback>>,
}

impl UdpEndpoint {
    /// A new, unopened endpoint bound to `event_loop`.
    pub fn new(event_loop: &Arc<EventLoop>) -> Arc<UdpEndpoint> {
        Arc::new(UdpEndpoint {
            event_loop: Arc::clone(event_loop),
            socket: Mutex::new(Socket::empty()),
            handler: Mutex::new(None),
            default_peer: Mutex::new(None),
            outbound: Mutex::new(VecDeque::new()),
            recv_scratch: Mutex::new(vec![0u8; MTU]),
            received_cb: Mutex::new(None),
        })
    }

    pub fn set_received_callback<F>(&self, cb: F)
    where
        F: FnMut(&Arc<UdpEndpoint>, &[u8], Address) + Send + 'static,
    {
        *self.received_cb.lock().unwrap() = Some(Box::new(cb));
    }

    /// Create the datagram socket, apply reuse/buffer options, bind, and
    /// register read-interest.
    pub fn open(self: &Arc<Self>, addr: &Address, options: UdpOptions) -> Result<()> {
        let mut socket = Socket::create_udp(addr.family())?;
        socket.set_reuse_address(options.reuse_address)?;
        socket.set_reuse_port(options.reuse_port)?;
        if let Some(size) = options.send_buffer {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(size) = options.recv_buffer {
            socket.set_recv_buffer_size(size)?;
        }
        socket.bind(addr)?;

        let descriptor = socket
            .raw_descriptor()
            .ok_or_else(|| NetError::logic("udp socket has no descriptor after bind"))?;
        *self.socket.lock().unwrap() = socket;

        let handler = EventHandler::new(&self.event_loop, descriptor);
        let read_ep = Arc::clone(self);
        handler.set_read_callback(move || read_ep.on_readable());
        let write_ep = Arc::clone(self);
        handler.set_write_callback(move || write_ep.on_writable());
        handler.enable_read();
        *self.handler.lock().unwrap() = Some(handler);
        trace!("udp endpoint: bound to {addr}");
        Ok(())
    }

    /// Fix the default peer used by [`UdpEndpoint::send`].
    pub fn associate(&self, peer: &Address) -> Result<()> {
        self.socket.lock().unwrap().associate(peer)?;
        *self.default_peer.lock().unwrap() = Some(*peer);
        Ok(())
    }

    pub fn local_address(&self) -> Result<Address> {
        self.socket.lock().unwrap().local_address()
    }

    /// Send one datagram to `addr`. A partial `sendto` is treated as
    /// "complete for this datagram" (see the UDP partial-send open question);
    /// would-block leaves it at the head of the queue.
    pub fn send_to(self: &Arc<Self>, data: &[u8], addr: &Address) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        if self.event_loop.is_in_loop_thread() && self.outbound.lock().unwrap().is_empty() {
            match self.socket.lock().unwrap().send_to(data, addr) {
                Ok(n) if n > 0 => return Ok(()),
                Ok(_) => {} // would-block: fall through to enqueue
                Err(e) => return Err(e),
            }
        }

        self.outbound.lock().unwrap().push_back((data.to_vec(), *addr));
        self.enable_write();
        Ok(())
    }

    /// Send one datagram to the associated default peer.
    pub fn send(self: &Arc<Self>, data: &[u8]) -> Result<()> {
        let peer = self
            .default_peer
            .lock()
            .unwrap()
            .ok_or_else(|| NetError::logic("send() called without an associated default peer"))?;
        self.send_to(data, &peer)
    }

    /// Detach the handler and close the socket.
    pub fn close(self: &Arc<Self>) {
        if let Some(handler) = self.handler.lock().unwrap().take() {
            handler.detach();
        }
        self.socket.lock().unwrap().close();
    }

    fn enable_write(&self) {
        if let Some(handler) = self.handler.lock().unwrap().as_ref() {
            handler.enable_write();
        }
    }

    fn on_readable(self: &Arc<Self>) {
        let mut scratch = self.recv_scratch.lock().unwrap();
        match self.socket.lock().unwrap().recv_from(&mut scratch) {
            Ok(Some((n, source))) => {
                if let Some(cb) = self.received_cb.lock().unwrap().as_mut() {
                    cb(self, &scratch[..n], source);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("udp endpoint: recvfrom error: {e}"),
        }
    }

    fn on_writable(self: &Arc<Self>) {
        loop {
            let head = self.outbound.lock().unwrap().front().cloned();
            let (payload, addr) = match head {
                Some(entry) => entry,
                None => break,
            };
            match self.socket.lock().unwrap().send_to(&payload, &addr) {
                Ok(0) => break,
                Ok(_) => {
                    self.outbound.lock().unwrap().pop_front();
                }
                Err(e) => {
                    warn!("udp endpoint: sendto error, dropping datagram: {e}");
                    self.outbound.lock().unwrap().pop_front();
                    break;
                }
            }
        }

        if self.outbound.lock().unwrap().is_empty() {
            if let Some(handler) = self.handler.lock().unwrap().as_ref() {
                handler.disable_write();
            }
        }
    }
}

impl std::fmt::Debug for UdpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpEndpoint")
            .field("local_address", &self.local_address().ok())
            .finish()
    }
}

//! Async TCP connection: a non-blocking stream socket with an outbound
//! buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::buffer::StreamBuffer;
use crate::error::{NetError, Result};
use crate::handler::EventHandler;
use crate::macros::{trace, warn};
use crate::reactor::EventLoop;
use crate::socket::{ShutdownMode, Socket, SocketState};

/// At least one MTU's worth of space is reserved in the inbound buffer
/// before every `recv`, per the readiness-reaction contract.
const MTU: usize = 1500;

type ConnectedCallback = Box<dyn FnMut(&Arc<TcpConnection>, bool) + Send>;
type ReceivedCallback = Box<dyn FnMut(&Arc<TcpConnection>, &mut StreamBuffer) + Send>;
type SentCallback = Box<dyn FnMut(&Arc<TcpConnection>, usize) + Send>;

/// Configuration accepted by [`TcpConnection::connect`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectionOptions {
    pub no_delay: bool,
    pub keep_alive: bool,
    pub send_buffer: Option<i32>,
    pub recv_buffer: Option<i32>,
}

/// A non-blocking stream connection: `send` never blocks and never fails
/// because the peer is unready, buffering internally instead; received
/// bytes and connect/disconnect notifications are delivered through
/// callbacks run on the owning loop's thread.
pub struct TcpConnection {
    event_loop: Arc<EventLoop>,
    socket: Mutex<Socket>,
    handler: Mutex<Option<Arc<EventHandler>>>,
    inbound: Mutex<StreamBuffer>,
    outbound: Mutex<StreamBuffer>,
    peer_address: Mutex<Option<Address>>,
    closing: AtomicBool,
    torn_down: AtomicBool,
    connected_cb: Mutex<Option<ConnectedCallback>>,
    received_cb: Mutex<Option<ReceivedCallback>>,
    sent_cb: Mutex<Option<SentCallback>>,
}

impl TcpConnection {
    /// A new, idle connection bound to `event_loop`. Call [`connect`] to
    /// initiate an outbound connection.
    ///
    /// [`connect`]: TcpConnection::connect
    pub fn new(event_loop: &Arc<EventLoop>) -> Arc<TcpConnection> {
        Arc::new(TcpConnection {
            event_loop: Arc::clone(event_loop),
            socket: Mutex::new(Socket::empty()),
            handler: Mutex::new(None),
            inbound: Mutex::new(StreamBuffer::default()),
            outbound: Mutex::new(StreamBuffer::default()),
            peer_address: Mutex::new(None),
            closing: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            connected_cb: Mutex::new(None),
            received_cb: Mutex::new(None),
            sent_cb: Mutex::new(None),
        })
    }

    /// Take ownership of an already-connected descriptor (typically handed
    /// in from [`super::TcpAcceptor`]'s accepted callback), transition
    /// straight to `established`, and register read-interest.
    pub fn from_accepted(
        event_loop: &Arc<EventLoop>,
        socket: Socket,
        peer: Address,
    ) -> Result<Arc<TcpConnection>> {
        let descriptor = socket
            .raw_descriptor()
            .ok_or_else(|| NetError::logic("accepted socket has no descriptor"))?;

        let conn = Arc::new(TcpConnection {
            event_loop: Arc::clone(event_loop),
            socket: Mutex::new(socket),
            handler: Mutex::new(None),
            inbound: Mutex::new(StreamBuffer::default()),
            outbound: Mutex::new(StreamBuffer::default()),
            peer_address: Mutex::new(Some(peer)),
            closing: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            connected_cb: Mutex::new(None),
            received_cb: Mutex::new(None),
            sent_cb: Mutex::new(None),
        });

        let handler = EventHandler::new(event_loop, descriptor);
        let read_conn = Arc::clone(&conn);
        handler.set_read_callback(move || read_conn.on_readable());
        let write_conn = Arc::clone(&conn);
        handler.set_write_callback(move || write_conn.on_writable());
        handler.enable_read();
        *conn.handler.lock().unwrap() = Some(handler);

        Ok(conn)
    }

    /// Begin a non-blocking connect to `addr`. Success/failure is reported
    /// later, from the loop thread, via the `connected` callback.
    pub fn connect(self: &Arc<Self>, addr: &Address, options: ConnectionOptions) -> Result<()> {
        let mut socket = Socket::create_tcp(addr.family())?;
        socket.set_no_delay(options.no_delay)?;
        socket.set_keep_alive(options.keep_alive)?;
        if let Some(size) = options.send_buffer {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(size) = options.recv_buffer {
            socket.set_recv_buffer_size(size)?;
        }
        socket.connect(addr)?;

        let descriptor = socket
            .raw_descriptor()
            .ok_or_else(|| NetError::logic("connecting socket has no descriptor"))?;
        *self.socket.lock().unwrap() = socket;
        *self.peer_address.lock().unwrap() = Some(*addr);

        let handler = EventHandler::new(&self.event_loop, descriptor);
        let read_conn = Arc::clone(self);
        handler.set_read_callback(move || read_conn.on_readable());
        let write_conn = Arc::clone(self);
        handler.set_write_callback(move || write_conn.on_writable());
        handler.enable_write();
        *self.handler.lock().unwrap() = Some(handler);
        trace!("tcp connection: connecting to {addr}");
        Ok(())
    }

    pub fn set_connected_callback<F>(&self, cb: F)
    where
        F: FnMut(&Arc<TcpConnection>, bool) + Send + 'static,
    {
        *self.connected_cb.lock().unwrap() = Some(Box::new(cb));
    }

    pub fn set_received_callback<F>(&self, cb: F)
    where
        F: FnMut(&Arc<TcpConnection>, &mut StreamBuffer) + Send + 'static,
    {
        *self.received_cb.lock().unwrap() = Some(Box::new(cb));
    }

    pub fn set_sent_callback<F>(&self, cb: F)
    where
        F: FnMut(&Arc<TcpConnection>, usize) + Send + 'static,
    {
        *self.sent_cb.lock().unwrap() = Some(Box::new(cb));
    }

    /// The connection's state.
    pub fn state(&self) -> SocketState {
        self.socket.lock().unwrap().state()
    }

    pub fn peer_address(&self) -> Option<Address> {
        *self.peer_address.lock().unwrap()
    }

    pub fn local_address(&self) -> Result<Address> {
        self.socket.lock().unwrap().local_address()
    }

    /// Send `data`. Never blocks and never fails because the peer is
    /// unready: on the loop thread, with an empty outbound buffer, attempts
    /// one non-blocking `send` first; any residual (and every off-thread
    /// call) is appended to the outbound buffer and write-interest is
    /// enabled.
    pub fn send(self: &Arc<Self>, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut remaining = data;
        if self.event_loop.is_in_loop_thread() {
            let empty = self.outbound.lock().unwrap().is_empty();
            if empty {
                match self.socket.lock().unwrap().send(data) {
                    Ok(n) if n == data.len() => {
                        if let Some(cb) = self.sent_cb.lock().unwrap().as_mut() {
                            cb(self, n);
                        }
                        return Ok(());
                    }
                    Ok(n) => remaining = &data[n..],
                    Err(e) => {
                        self.teardown(false);
                        return Err(e);
                    }
                }
            }
        }

        self.outbound.lock().unwrap().write(remaining)?;
        self.enable_write();
        Ok(())
    }

    /// Shut down the write half immediately; the handler detaches (and the
    /// socket closes) once the outbound buffer has fully drained.
    pub fn close(self: &Arc<Self>) {
        self.closing.store(true, Ordering::SeqCst);
        let drained = self.outbound.lock().unwrap().is_empty();
        {
            let socket = self.socket.lock().unwrap();
            if matches!(socket.state(), SocketState::Connected | SocketState::HalfClosed) {
                let _ = socket.shutdown(ShutdownMode::Write);
            }
        }
        self.socket.lock().unwrap().mark_half_closed();
        if drained {
            self.finish_close();
        }
    }

    fn enable_write(&self) {
        if let Some(handler) = self.handler.lock().unwrap().as_ref() {
            handler.enable_write();
        }
    }

    fn finish_close(self: &Arc<Self>) {
        if let Some(handler) = self.handler.lock().unwrap().take() {
            handler.detach();
        }
        self.socket.lock().unwrap().close();
    }

    fn on_readable(self: &Arc<Self>) {
        let mut inbound = self.inbound.lock().unwrap();
        if let Err(e) = inbound.reserve(MTU) {
            drop(inbound);
            warn!("tcp connection: inbound reserve failed: {e}");
            self.teardown(false);
            return;
        }
        let outcome = {
            let socket = self.socket.lock().unwrap();
            let slice = inbound.writable_slice();
            socket.recv(slice)
        };
        match outcome {
            Ok(0) => {
                drop(inbound);
                trace!("tcp connection: peer closed");
                self.teardown(false);
            }
            Ok(n) => {
                inbound
                    .advance_write(n)
                    .expect("reserved capacity covers this recv");
                drop(inbound);
                if let Some(cb) = self.received_cb.lock().unwrap().as_mut() {
                    let mut inbound = self.inbound.lock().unwrap();
                    cb(self, &mut inbound);
                }
            }
            Err(e) => {
                drop(inbound);
                warn!("tcp connection: recv error: {e}");
                self.teardown(false);
            }
        }
    }

    fn on_writable(self: &Arc<Self>) {
        let was_connecting = self.socket.lock().unwrap().state() == SocketState::Connecting;
        if was_connecting {
            let outcome = self.socket.lock().unwrap().take_error();
            match outcome {
                Ok(None) => {
                    self.socket.lock().unwrap().mark_connected();
                    if let Some(handler) = self.handler.lock().unwrap().as_ref() {
                        handler.enable_read();
                    }
                    trace!("tcp connection: established");
                    if let Some(cb) = self.connected_cb.lock().unwrap().as_mut() {
                        cb(self, true);
                    }
                }
                Ok(Some(io_err)) => {
                    warn!("tcp connection: connect failed: {io_err}");
                    self.teardown(false);
                    return;
                }
                Err(e) => {
                    warn!("tcp connection: take_error failed: {e}");
                    self.teardown(false);
                    return;
                }
            }
        }

        loop {
            let mut outbound = self.outbound.lock().unwrap();
            if outbound.is_empty() {
                break;
            }
            let result = {
                let socket = self.socket.lock().unwrap();
                socket.send(outbound.readable_slice())
            };
            match result {
                Ok(0) => break,
                Ok(n) => {
                    outbound.advance_read(n);
                    drop(outbound);
                    if let Some(cb) = self.sent_cb.lock().unwrap().as_mut() {
                        cb(self, n);
                    }
                }
                Err(e) => {
                    drop(outbound);
                    warn!("tcp connection: send error: {e}");
                    self.teardown(false);
                    return;
                }
            }
        }

        if self.outbound.lock().unwrap().is_empty() {
            if let Some(handler) = self.handler.lock().unwrap().as_ref() {
                handler.disable_write();
            }
            if self.closing.load(Ordering::SeqCst) {
                self.finish_close();
            }
        }
    }

    /// Fire `connected(conn, ok)` exactly once, then detach and close. Safe
    /// to call from any read/write-readiness error path; idempotent.
    fn teardown(self: &Arc<Self>, ok: bool) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(cb) = self.connected_cb.lock().unwrap().as_mut() {
            cb(self, ok);
        }
        self.finish_close();
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("state", &self.state())
            .field("peer", &self.peer_address())
            .finish()
    }
}

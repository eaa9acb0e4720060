//! A single-threaded reactor core and the non-blocking TCP/UDP socket
//! wrappers built on it.
//!
//! The crate is organized bottom-up, the same order the design documents
//! walk it in:
//!
//! - [`buffer`] — a growable byte buffer with streaming and random-access
//!   I/O, the data plane for everything above it.
//! - [`address`] and [`socket`] — a protocol-family-tagged socket address and
//!   an owning, non-blocking wrapper over a single OS descriptor.
//! - [`interest`] and [`event`] — the readiness vocabulary the selector and
//!   reactor share.
//! - [`reactor`] and [`handler`] — the event loop itself: one readiness
//!   selector, a handler table, a cross-thread task queue, and the
//!   per-descriptor objects that bridge readiness to user callbacks.
//! - [`net`] (behind the `net` feature) — callback-driven async TCP/UDP
//!   built on the reactor: [`net::TcpAcceptor`], [`net::TcpConnection`],
//!   [`net::UdpEndpoint`].
//!
//! Everything here runs on exactly one thread per [`reactor::EventLoop`];
//! see the loop's own documentation for the cross-thread entry points
//! (`invoke`, `invoke_later`, and the handler/connection mutators) that are
//! safe to call from anywhere else.

pub mod address;
pub mod buffer;
pub mod error;
pub mod event;
pub mod handler;
pub mod interest;
mod macros;
#[cfg(feature = "net")]
pub mod net;
pub mod reactor;
mod self_pipe;
pub mod socket;
mod sys;
pub mod token;

pub use address::{Address, Family};
pub use buffer::StreamBuffer;
pub use error::{NetError, Result};
pub use event::{Event, Events};
pub use handler::EventHandler;
pub use interest::Interest;
pub use reactor::EventLoop;
pub use socket::{ShutdownMode, Socket, SocketState};
pub use token::Token;

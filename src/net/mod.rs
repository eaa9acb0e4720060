//! Callback-driven async TCP/UDP wrappers built on the reactor core.
//!
//! Gated behind the `net` feature, keeping the selector/registration core
//! usable on its own without pulling in the higher-level `net::*`
//! convenience types.

mod tcp_listener;
mod tcp_stream;
mod udp_socket;

pub use tcp_listener::{AcceptorOptions, TcpAcceptor};
pub use tcp_stream::{ConnectionOptions, TcpConnection};
pub use udp_socket::{UdpEndpoint, UdpOptions};

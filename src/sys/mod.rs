//! Platform-specific backends for the readiness selector and raw sockets.
//!
//! Both platforms expose the same shape (`Selector`, `RawSocket`,
//! `RawDescriptor`); everything above `sys` is written against that shape
//! and never branches on `cfg(unix)`/`cfg(windows)` itself.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::{RawDescriptor, RawSocket, Selector};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::{RawDescriptor, RawSocket, Selector};

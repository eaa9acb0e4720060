mod net;
mod selector;
mod socket;

pub(crate) use selector::Selector;
pub(crate) use socket::RawSocket;

use std::sync::Once;
use windows_sys::Win32::Networking::WinSock::{WSAStartup, WSADATA};

/// The OS descriptor type this platform's selector and sockets speak in.
pub type RawDescriptor = windows_sys::Win32::Networking::WinSock::SOCKET;

static WINSOCK_INIT: Once = Once::new();

/// Lazily call `WSAStartup`, once per process. Every entry point that creates
/// a raw socket goes through this first; the crate never asks the caller to
/// initialize the networking stack themselves (that's explicitly out of
/// scope for the rest of the API, but *something* has to call it on
/// Windows).
pub(crate) fn ensure_winsock() {
    WINSOCK_INIT.call_once(|| unsafe {
        let mut data: WSADATA = std::mem::zeroed();
        // 2.2 is the version every modern Windows release ships.
        let _ = WSAStartup(0x0202, &mut data);
    });
}

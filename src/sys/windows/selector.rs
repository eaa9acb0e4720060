//! A `WSAPoll`-based readiness selector, the Windows counterpart of the
//! Unix `poll(2)` backend: one portable, level-triggered primitive per
//! platform rather than a completion-based (IOCP) one, since this crate
//! only ever needs readiness, not completion notification.

use std::io;
use std::time::Instant;

use windows_sys::Win32::Networking::WinSock::{
    self, POLLERR, POLLHUP, POLLNVAL, POLLRDNORM, POLLWRNORM, SOCKET, SOCKET_ERROR, WSAPOLLFD,
};

use crate::event::{Event, Events};
use crate::interest::Interest;
use crate::token::Token;

struct Registration {
    socket: SOCKET,
    token: Token,
    interest: Interest,
}

pub struct Selector {
    registrations: Vec<Registration>,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        super::ensure_winsock();
        Ok(Selector {
            registrations: Vec::new(),
        })
    }

    pub fn set(&mut self, socket: SOCKET, token: Token, interest: Interest) {
        if let Some(existing) = self.registrations.iter_mut().find(|r| r.socket == socket) {
            existing.token = token;
            existing.interest = interest;
        } else {
            self.registrations.push(Registration {
                socket,
                token,
                interest,
            });
        }
    }

    pub fn remove(&mut self, socket: SOCKET) {
        self.registrations.retain(|r| r.socket != socket);
    }

    pub fn select(&mut self, events: &mut Events, timeout_ms: i32) -> io::Result<()> {
        events.clear();
        if self.registrations.is_empty() && timeout_ms == 0 {
            return Ok(());
        }

        let mut fds: Vec<WSAPOLLFD> = self
            .registrations
            .iter()
            .map(|r| WSAPOLLFD {
                fd: r.socket,
                events: interest_to_poll_events(r.interest),
                revents: 0,
            })
            .collect();

        loop {
            let deadline = if timeout_ms > 0 {
                Some(Instant::now() + std::time::Duration::from_millis(timeout_ms as u64))
            } else {
                None
            };

            let n = unsafe { WinSock::WSAPoll(fds.as_mut_ptr(), fds.len() as u32, timeout_ms) };

            if n == 0 {
                return Ok(());
            }
            if n != SOCKET_ERROR {
                break;
            }

            let err = io::Error::from_raw_os_error(unsafe { WinSock::WSAGetLastError() });
            if err.kind() == io::ErrorKind::Interrupted {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Ok(());
                    }
                }
                continue;
            }
            return Err(err);
        }

        for (pfd, reg) in fds.iter().zip(self.registrations.iter()) {
            if pfd.revents == 0 {
                continue;
            }
            let readable = pfd.revents & (POLLRDNORM | POLLHUP) != 0;
            let writable = pfd.revents & POLLWRNORM != 0;
            let error = pfd.revents & (POLLERR | POLLNVAL) != 0;
            if readable || writable || error {
                events.push(Event {
                    token: reg.token,
                    readable,
                    writable,
                    error,
                });
            }
        }
        Ok(())
    }
}

fn interest_to_poll_events(interest: Interest) -> i16 {
    let mut events = 0;
    if interest.is_readable() {
        events |= POLLRDNORM;
    }
    if interest.is_writable() {
        events |= POLLWRNORM;
    }
    events
}

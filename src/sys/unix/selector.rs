//! A `poll(2)`-based readiness selector.
//!
//! A single, portable, level-triggered backend rather than an edge-triggered
//! epoll/kqueue one: this crate does not need edge-triggered readiness (see
//! the selector backend rationale in the design notes), so one backend per
//! platform is enough.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Instant;

use crate::event::{Event, Events};
use crate::interest::Interest;
use crate::macros::syscall;
use crate::token::Token;

struct Registration {
    fd: RawFd,
    token: Token,
    interest: Interest,
}

/// The readiness selector: a descriptor -> interest-mask table plus a
/// `poll(2)` call to demultiplex it.
pub struct Selector {
    registrations: Vec<Registration>,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        Ok(Selector {
            registrations: Vec::new(),
        })
    }

    /// Add or replace the interest mask for `fd`.
    pub fn set(&mut self, fd: RawFd, token: Token, interest: Interest) {
        if let Some(existing) = self.registrations.iter_mut().find(|r| r.fd == fd) {
            existing.token = token;
            existing.interest = interest;
        } else {
            self.registrations.push(Registration { fd, token, interest });
        }
    }

    /// Remove `fd` from the interest table, if present.
    pub fn remove(&mut self, fd: RawFd) {
        self.registrations.retain(|r| r.fd != fd);
    }

    /// Block up to `timeout_ms` (negative: forever, zero: poll) waiting for
    /// readiness, appending ready events to `events`. Retries transparently
    /// on `EINTR`. A zero-length result only happens on an actual timeout.
    pub fn select(&mut self, events: &mut Events, timeout_ms: i32) -> io::Result<()> {
        events.clear();
        if self.registrations.is_empty() {
            // Nothing to wait on; `poll(2)` with an empty set would just
            // sleep for the timeout, which the reactor never wants here
            // (an empty registration set plus timeout=0 must return
            // immediately — see the selector-totality property).
            if timeout_ms == 0 {
                return Ok(());
            }
        }

        let mut pollfds: Vec<libc::pollfd> = self
            .registrations
            .iter()
            .map(|r| libc::pollfd {
                fd: r.fd,
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

            let n = syscall!(poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms
            ));

            match n {
                Ok(0) => return Ok(()),
                Ok(_) => break,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            return Ok(());
                        }
                    }
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        for (pfd, reg) in pollfds.iter().zip(self.registrations.iter()) {
            if pfd.revents == 0 {
                continue;
            }
            let readable = pfd.revents & (libc::POLLIN | libc::POLLHUP | rdhup_bit()) != 0;
            let writable = pfd.revents & libc::POLLOUT != 0;
            let error = pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0;
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

#[cfg(target_os = "linux")]
fn rdhup_bit() -> libc::c_short {
    libc::POLLRDHUP
}

#[cfg(not(target_os = "linux"))]
fn rdhup_bit() -> libc::c_short {
    0
}

fn interest_to_poll_events(interest: Interest) -> libc::c_short {
    let mut events = 0;
    if interest.is_readable() {
        events |= libc::POLLIN;
    }
    if interest.is_writable() {
        events |= libc::POLLOUT;
    }
    events
}

//! A single descriptor's read/write readiness callbacks, bound to one
//! [`EventLoop`](crate::reactor::EventLoop).

use std::sync::{Arc, Condvar, Mutex};

use crate::interest::Interest;
use crate::reactor::EventLoop;
use crate::sys::RawDescriptor;
use crate::token::Token;

type Callback = Box<dyn FnMut() + Send + 'static>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Lifecycle {
    Attached,
    Detaching,
    Detached,
}

#[derive(Default)]
struct Callbacks {
    read: Option<Callback>,
    write: Option<Callback>,
}

/// Bridges one OS descriptor's readiness events to a pair of user callbacks.
///
/// An `EventHandler` is always held behind an `Arc`: the loop keeps one
/// reference in its handler table, the owner keeps another, and dispatch
/// briefly holds a third while it runs callbacks.
pub struct EventHandler {
    event_loop: Arc<EventLoop>,
    token: Token,
    descriptor: RawDescriptor,
    interest: Mutex<Option<Interest>>,
    callbacks: Mutex<Callbacks>,
    lifecycle: Mutex<Lifecycle>,
    detach_cv: Condvar,
}

impl EventHandler {
    /// Bind a new handler to `descriptor` on `event_loop`, posting its
    /// initial (empty-interest) registration as a loop task.
    pub fn new(event_loop: &Arc<EventLoop>, descriptor: RawDescriptor) -> Arc<EventHandler> {
        let token = event_loop.allocate_token();
        let handler = Arc::new(EventHandler {
            event_loop: Arc::clone(event_loop),
            token,
            descriptor,
            interest: Mutex::new(None),
            callbacks: Mutex::new(Callbacks::default()),
            lifecycle: Mutex::new(Lifecycle::Attached),
            detach_cv: Condvar::new(),
        });
        let to_register = Arc::clone(&handler);
        event_loop.post_registration(to_register);
        handler
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub(crate) fn descriptor(&self) -> RawDescriptor {
        self.descriptor
    }

    pub(crate) fn current_interest(&self) -> Option<Interest> {
        *self.interest.lock().unwrap()
    }

    pub fn set_read_callback<F>(&self, cb: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.callbacks.lock().unwrap().read = Some(Box::new(cb));
    }

    pub fn set_write_callback<F>(&self, cb: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.callbacks.lock().unwrap().write = Some(Box::new(cb));
    }

    pub fn enable_read(self: &Arc<Self>) {
        self.mutate_interest(|i| Some(i.unwrap_or(Interest::READABLE).add(Interest::READABLE)));
    }

    pub fn disable_read(self: &Arc<Self>) {
        self.mutate_interest(|i| i.and_then(|i| i.remove(Interest::READABLE)));
    }

    pub fn enable_write(self: &Arc<Self>) {
        self.mutate_interest(|i| Some(i.unwrap_or(Interest::WRITABLE).add(Interest::WRITABLE)));
    }

    pub fn disable_write(self: &Arc<Self>) {
        self.mutate_interest(|i| i.and_then(|i| i.remove(Interest::WRITABLE)));
    }

    fn mutate_interest(self: &Arc<Self>, f: impl FnOnce(Option<Interest>) -> Option<Interest>) {
        {
            let mut guard = self.interest.lock().unwrap();
            *guard = f(*guard);
        }
        let handler = Arc::clone(self);
        if self.event_loop.is_in_loop_thread() {
            self.event_loop.update(&handler);
        } else {
            let event_loop = Arc::clone(&self.event_loop);
            event_loop.invoke_later(move || {
                event_loop.update(&handler);
            });
        }
    }

    /// Remove this handler from the selector and handler table. Blocks the
    /// caller (on a condition variable) until the loop has acknowledged the
    /// removal, unless called from the loop thread itself.
    pub fn detach(self: &Arc<Self>) {
        {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            if *lifecycle == Lifecycle::Detached {
                return;
            }
            *lifecycle = Lifecycle::Detaching;
        }

        if self.event_loop.is_in_loop_thread() {
            self.event_loop.remove(self);
            *self.lifecycle.lock().unwrap() = Lifecycle::Detached;
            return;
        }

        let handler = Arc::clone(self);
        let event_loop = Arc::clone(&self.event_loop);
        event_loop.invoke_later(move || {
            event_loop.remove(&handler);
            let mut lifecycle = handler.lifecycle.lock().unwrap();
            *lifecycle = Lifecycle::Detached;
            handler.detach_cv.notify_all();
        });

        let lifecycle = self.lifecycle.lock().unwrap();
        let _unused = self
            .detach_cv
            .wait_while(lifecycle, |l| *l != Lifecycle::Detached)
            .unwrap();
    }

    pub(crate) fn is_detached(&self) -> bool {
        *self.lifecycle.lock().unwrap() == Lifecycle::Detached
    }

    /// Run the appropriate callback(s) for a ready mask: read before write.
    /// Tolerates a callback detaching the handler mid-dispatch.
    pub(crate) fn handle_events(self: &Arc<Self>, readable: bool, writable: bool) {
        if readable && !self.is_detached() {
            if let Some(cb) = self.callbacks.lock().unwrap().read.as_mut() {
                cb();
            }
        }
        if writable && !self.is_detached() {
            if let Some(cb) = self.callbacks.lock().unwrap().write.as_mut() {
                cb();
            }
        }
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("token", &self.token)
            .field("interest", &self.current_interest())
            .finish()
    }
}

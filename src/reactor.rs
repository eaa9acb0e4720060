//! The reactor: a single-threaded dispatch loop over a readiness selector,
//! with a cross-thread `invoke`/`invoke_later` task queue drained once per
//! dispatch iteration.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use crate::error::{NetError, Result};
use crate::event::Events;
use crate::handler::EventHandler;
use crate::macros::{debug, trace};
use crate::self_pipe::SelfPipe;
use crate::sys::Selector;
use crate::token::Token;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A single-threaded reactor: one readiness selector, a handler table, and a
/// cross-thread task queue.
///
/// All registration mutation (`register`/`update`/`remove`) and dispatch
/// happen on the thread that calls [`EventLoop::run`]; every other public
/// method is safe to call from any thread.
pub struct EventLoop {
    selector: Mutex<Selector>,
    handlers: Mutex<HashMap<Token, Arc<EventHandler>>>,
    next_token: AtomicUsize,
    tasks: Mutex<VecDeque<Task>>,
    self_pipe: SelfPipe,
    self_pipe_token: Token,
    running: AtomicBool,
    draining: AtomicBool,
    owner_thread: Mutex<Option<ThreadId>>,
}

impl EventLoop {
    /// Build a new loop. Fails if the self-pipe wakeup pair cannot be
    /// constructed.
    pub fn new() -> Result<Arc<EventLoop>> {
        let mut selector = Selector::new().map_err(|e| NetError::runtime("create selector", e))?;
        let self_pipe = SelfPipe::new()?;
        let self_pipe_token = Token(0);

        #[cfg(unix)]
        let desc = {
            use std::os::unix::io::AsRawFd;
            self_pipe.reader().as_raw_fd()
        };
        #[cfg(windows)]
        let desc = self_pipe.reader().raw();

        selector.set(desc, self_pipe_token, crate::interest::Interest::READABLE);

        Ok(Arc::new(EventLoop {
            selector: Mutex::new(selector),
            handlers: Mutex::new(HashMap::new()),
            next_token: AtomicUsize::new(1),
            tasks: Mutex::new(VecDeque::new()),
            self_pipe,
            self_pipe_token,
            running: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            owner_thread: Mutex::new(None),
        }))
    }

    pub(crate) fn allocate_token(&self) -> Token {
        Token(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_in_loop_thread(&self) -> bool {
        match *self.owner_thread.lock().unwrap() {
            Some(id) => id == std::thread::current().id(),
            None => false,
        }
    }

    fn sync_handler(&self, handler: &Arc<EventHandler>) {
        let token = handler.token();
        self.handlers
            .lock()
            .unwrap()
            .insert(token, Arc::clone(handler));
        let desc = handler.descriptor();
        let mut selector = self.selector.lock().unwrap();
        match handler.current_interest() {
            Some(interest) => selector.set(desc, token, interest),
            None => selector.remove(desc),
        }
    }

    /// Insert (or refresh) `handler` in the table and synchronize the
    /// selector to its current interest mask. Must run on the loop thread.
    pub(crate) fn register(&self, handler: &Arc<EventHandler>) {
        trace!("registering handler token={:?}", handler.token());
        self.sync_handler(handler);
    }

    /// Refresh the selector state for an already-registered (or
    /// not-yet-registered) handler. Must run on the loop thread.
    pub(crate) fn update(&self, handler: &Arc<EventHandler>) {
        self.sync_handler(handler);
    }

    /// Remove `handler` from the table and the selector. Must run on the
    /// loop thread.
    pub(crate) fn remove(&self, handler: &Arc<EventHandler>) {
        trace!("removing handler token={:?}", handler.token());
        let token = handler.token();
        self.handlers.lock().unwrap().remove(&token);
        self.selector.lock().unwrap().remove(handler.descriptor());
    }

    /// Post the initial registration for a freshly constructed handler.
    pub(crate) fn post_registration(self: &Arc<Self>, handler: Arc<EventHandler>) {
        let event_loop = Arc::clone(self);
        self.invoke_later(move || event_loop.register(&handler));
    }

    /// Run `f` inline if called from the loop thread, otherwise enqueue it
    /// and wake the loop.
    pub fn invoke<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_in_loop_thread() {
            f();
        } else {
            self.enqueue(Box::new(f));
            let _ = self.self_pipe.wake();
        }
    }

    /// Always enqueue `f`; wakes the loop if called off-thread, or if the
    /// loop is currently draining its task queue (so the new task is
    /// guaranteed to run without waiting on an unrelated readiness event).
    pub fn invoke_later<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f));
        if !self.is_in_loop_thread() || self.draining.load(Ordering::SeqCst) {
            let _ = self.self_pipe.wake();
        }
    }

    fn enqueue(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }

    /// Request termination. Safe to call from any thread; if called
    /// off-thread it wakes a blocked `select`.
    pub fn stop(self: &Arc<Self>) {
        self.running.store(false, Ordering::SeqCst);
        if !self.is_in_loop_thread() {
            let _ = self.self_pipe.wake();
        }
    }

    /// Run the dispatch loop until [`EventLoop::stop`] is observed. Must be
    /// called on exactly one thread for the lifetime of the loop.
    pub fn run(self: &Arc<Self>) -> Result<()> {
        *self.owner_thread.lock().unwrap() = Some(std::thread::current().id());
        self.running.store(true, Ordering::SeqCst);
        let mut events = Events::with_capacity(128);
        while self.running.load(Ordering::SeqCst) {
            self.dispatch_once(&mut events)?;
        }
        Ok(())
    }

    fn dispatch_once(self: &Arc<Self>, events: &mut Events) -> Result<()> {
        {
            let mut selector = self.selector.lock().unwrap();
            selector
                .select(events, -1)
                .map_err(|e| NetError::runtime("select", e))?;
        }
        debug!("event loop tick: {} event(s)", events.len());

        for event in events.iter() {
            if event.token() == self.self_pipe_token {
                trace!("self-pipe woke the loop");
                let _ = self.self_pipe.drain();
                continue;
            }
            let handler = self.handlers.lock().unwrap().get(&event.token()).cloned();
            if let Some(handler) = handler {
                // An error-only event (no readable/writable bit) would
                // otherwise never reach a callback; fold it into both so the
                // failure surfaces through the component's own recv/send
                // error handling instead of stalling silently.
                let error = event.is_error();
                handler.handle_events(event.is_readable() || error, event.is_writable() || error);
            }
        }

        self.draining.store(true, Ordering::SeqCst);
        let pending: VecDeque<Task> = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in pending {
            task();
        }
        self.draining.store(false, Ordering::SeqCst);

        Ok(())
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("handlers", &self.handlers.lock().unwrap().len())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

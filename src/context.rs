//! The synchronization engine behind every coroutine.
//!
//! Each coroutine owns one worker thread which runs the body. The caller and
//! the worker share a mutex-protected state block and two condition
//! variables, one per direction. Control is handed over by flipping the
//! lifecycle state and signalling the other side, then blocking until the
//! state flips back. Because every wait is guarded by a predicate on that
//! state, at most one side is ever executing user code.

use std::io;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, trace, warn};

use crate::unwind::{self, CaughtPanic};

/// Lifecycle state of a coroutine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// The worker thread has not been spawned yet.
    NotStarted,

    /// The body is blocked, waiting for the caller to resume it. This is also
    /// the state of a freshly started coroutine whose body has not run yet.
    Parked,

    /// The body is executing and the caller is blocked.
    Running,

    /// The body returned or panicked.
    Finished,

    /// The coroutine was dropped while its body was still alive.
    Interrupted,
}

impl State {
    /// Returns whether the coroutine has started and not yet terminated.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, State::Parked | State::Running)
    }

    /// Returns whether the coroutine can never run again.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Finished | State::Interrupted)
    }
}

struct Inner<T> {
    state: State,

    // Handoff slot. Overwritten by every call, never queued.
    slot: Option<T>,

    // Set when the owning coroutine is dropped while the worker is alive.
    interrupted: bool,

    // Panic raised by the body, waiting to be picked up by the caller.
    failure: Option<CaughtPanic>,
}

/// State shared between the caller and the worker thread.
pub(crate) struct Shared<T> {
    name: String,
    inner: Mutex<Inner<T>>,

    // Wakes the worker: signalled on resume and on interruption.
    resume: Condvar,

    // Wakes the caller: signalled when the worker parks or terminates.
    park: Condvar,
}

impl<T> Shared<T> {
    fn new(name: String) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                state: State::NotStarted,
                slot: None,
                interrupted: false,
                failure: None,
            }),
            resume: Condvar::new(),
            park: Condvar::new(),
        }
    }

    // The only user code run under the lock is `T::clone` in `get`, which
    // reads the slot without touching the state. A panic there cannot leave
    // the state half-updated, so poisoning carries no meaning.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_resumed<'a>(&self, guard: MutexGuard<'a, Inner<T>>) -> MutexGuard<'a, Inner<T>> {
        self.resume
            .wait_while(guard, |inner| inner.state == State::Parked)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> State {
        self.lock().state
    }

    /// Parks the body and hands control back to the caller, blocking until
    /// the caller resumes it.
    ///
    /// If the coroutine is interrupted while parked (or already was), this
    /// unwinds the body instead of returning.
    pub(crate) fn suspend(&self) {
        let mut inner = self.lock();
        if !inner.interrupted {
            debug_assert_eq!(inner.state, State::Running);
            trace!("{}: suspending", self.name);
            inner.state = State::Parked;
            self.park.notify_one();
            inner = self.wait_resumed(inner);
        }

        if inner.interrupted {
            drop(inner);
            debug!("{}: unwinding interrupted body", self.name);
            unwind::interrupt();
        }
    }

    pub(crate) fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.lock().slot.clone()
    }

    pub(crate) fn take(&self) -> Option<T> {
        self.lock().slot.take()
    }
}

/// Entry point of the worker thread.
fn run_worker<T, F>(shared: Arc<Shared<T>>, body: F)
where
    F: FnOnce(),
{
    // However this function exits, leave the coroutine in a terminal state
    // and wake up the caller.
    let shared = scopeguard::guard(shared, |shared| {
        let mut inner = shared.lock();
        if inner.state.is_active() {
            inner.state = State::Finished;
        }
        trace!("{}: worker exiting in state {:?}", shared.name, inner.state);
        shared.park.notify_one();
    });

    let mut inner = shared.lock();
    inner.state = State::Parked;
    shared.park.notify_one();
    let inner = shared.wait_resumed(inner);
    let interrupted = inner.interrupted;
    drop(inner);

    // An interrupted coroutine never runs its body. The closure is still
    // consumed here so that its captures are dropped on this thread.
    let result = unwind::catch_unwind_at_root(move || {
        if !interrupted {
            body();
        }
    });

    let mut inner = shared.lock();
    match result {
        Ok(()) if inner.interrupted => {
            debug!("{}: body returned after interruption", shared.name);
        }
        Ok(()) => inner.state = State::Finished,
        Err(e) if unwind::is_interruption(&e) => inner.state = State::Interrupted,
        Err(_) if inner.interrupted => {
            warn!(
                "{}: body panicked while being interrupted, discarding the panic",
                shared.name
            );
        }
        Err(e) => {
            inner.failure = Some(e);
            inner.state = State::Finished;
        }
    }
}

/// Owner of a coroutine's worker thread.
///
/// Dropping a `Context` interrupts a parked body and joins the worker before
/// the shared state is released.
pub(crate) struct Context<T> {
    shared: Arc<Shared<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Context<T> {
    pub(crate) fn new(name: String) -> Self {
        Self {
            shared: Arc::new(Shared::new(name)),
            worker: None,
        }
    }

    /// Spawns the worker thread which will execute `body`.
    ///
    /// This returns once the worker is parked, before any of `body` has run.
    ///
    /// # Panics
    ///
    /// Panics if the context was already started.
    pub(crate) fn start<F>(&mut self, stack_size: usize, body: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        assert!(self.worker.is_none(), "coroutine already started");

        let shared = self.shared.clone();
        let worker = thread::Builder::new()
            .name(self.shared.name.clone())
            .stack_size(stack_size)
            .spawn(move || run_worker(shared, body))?;
        trace!("{}: spawned worker thread", self.shared.name);

        let inner = self.shared.lock();
        let inner = self
            .shared
            .park
            .wait_while(inner, |inner| inner.state == State::NotStarted)
            .unwrap_or_else(PoisonError::into_inner);
        drop(inner);

        self.worker = Some(worker);
        Ok(())
    }
}

impl<T> Context<T> {
    pub(crate) fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }

    pub(crate) fn state(&self) -> State {
        self.shared.state()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Overwrites the handoff slot.
    pub(crate) fn put(&self, value: T) {
        let old = mem::replace(&mut self.shared.lock().slot, Some(value));
        // Dropped outside of the lock.
        drop(old);
    }

    /// Resumes the body and blocks until it suspends or terminates.
    ///
    /// # Panics
    ///
    /// Panics if the coroutine is not parked. A panic raised by the body is
    /// propagated to the caller.
    pub(crate) fn resume(&self) {
        unwind::maybe_resume_unwind(self.try_resume())
    }

    /// Like `resume`, but returns a panic raised by the body instead of
    /// propagating it.
    pub(crate) fn try_resume(&self) -> Result<(), CaughtPanic> {
        let mut inner = self.shared.lock();
        if inner.state != State::Parked {
            let state = inner.state;
            drop(inner);
            misuse(state);
        }

        trace!("{}: resuming", self.shared.name);
        inner.state = State::Running;
        self.shared.resume.notify_one();
        let mut inner = self
            .shared
            .park
            .wait_while(inner, |inner| inner.state == State::Running)
            .unwrap_or_else(PoisonError::into_inner);

        match inner.failure.take() {
            Some(e) => {
                debug!("{}: body panicked", self.shared.name);
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn teardown(&self, worker: JoinHandle<()>) {
        // Joining from the worker itself would deadlock.
        assert_ne!(
            worker.thread().id(),
            thread::current().id(),
            "a coroutine cannot be dropped from inside its own body"
        );

        {
            let mut inner = self.shared.lock();
            if inner.state.is_active() {
                debug!("{}: interrupting suspended body", self.shared.name);
                inner.interrupted = true;
                inner.state = State::Interrupted;
                self.shared.resume.notify_one();
            }
        }

        if worker.join().is_err() {
            error!(
                "{}: worker thread panicked outside of the coroutine body",
                self.shared.name
            );
        }
        trace!("{}: joined worker thread", self.shared.name);
    }
}

impl<T> Drop for Context<T> {
    fn drop(&mut self) {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return,
        };

        let guard = scopeguard::guard((), |()| {
            // A worker that may still touch the shared state cannot be left
            // behind. Force an abort using a double-panic.
            panic!("coroutine teardown failed, aborting");
        });
        self.teardown(worker);
        mem::forget(guard);
    }
}

#[cold]
fn misuse(state: State) -> ! {
    match state {
        State::NotStarted => panic!("attempt to resume a coroutine that was never started"),
        State::Running => panic!("attempt to resume a coroutine from inside its own body"),
        State::Finished | State::Interrupted => panic!("attempt to resume a completed coroutine"),
        State::Parked => unreachable!(),
    }
}

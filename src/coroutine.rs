use std::cell::Cell;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use crate::context::{Context, Shared, State};

/// Default size of the stack of a coroutine's worker thread.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Minimum size of the stack of a coroutine's worker thread.
pub const MIN_STACK_SIZE: usize = 4096;

/// Coroutine configuration.
///
/// This mirrors [`std::thread::Builder`]: the settings apply to the worker
/// thread that executes the coroutine body.
///
/// ```rust
/// use corothread::Builder;
///
/// let mut coroutine = Builder::new()
///     .name("worker".into())
///     .stack_size(64 * 1024)
///     .spawn(|yielder| {
///         assert_eq!(yielder.get(), 1);
///     })
///     .unwrap();
/// coroutine.call(1);
/// assert!(coroutine.done());
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the worker thread. Defaults to `"coroutine"`.
    ///
    /// The name is also used to tag log messages.
    pub fn name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Sets the stack size of the worker thread, in bytes.
    ///
    /// Values below [`MIN_STACK_SIZE`] are rounded up. Defaults to
    /// [`DEFAULT_STACK_SIZE`].
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Creates a new coroutine which will execute `f` on its own thread.
    ///
    /// The worker thread is spawned and parked before this returns, but `f`
    /// does not start executing until the first call to [`Coroutine::call`].
    ///
    /// # Errors
    ///
    /// Returns an error if the OS fails to create the thread.
    pub fn spawn<T, F>(self, f: F) -> io::Result<Coroutine<T>>
    where
        F: FnOnce(&Yielder<T>) + Send + 'static,
        T: Send + 'static,
    {
        let name = self.name.unwrap_or_else(|| "coroutine".to_owned());
        let stack_size = self
            .stack_size
            .unwrap_or(DEFAULT_STACK_SIZE)
            .max(MIN_STACK_SIZE);

        let mut context = Context::new(name);
        let yielder = Yielder {
            shared: context.shared().clone(),
            marker: PhantomData,
        };
        context.start(stack_size, move || f(&yielder))?;

        Ok(Coroutine {
            context: Some(context),
        })
    }
}

/// A symmetric coroutine backed by a dedicated thread.
///
/// The body of the coroutine and its caller take turns: [`Coroutine::call`]
/// places a value in the coroutine's handoff slot and runs the body until it
/// suspends itself with [`Yielder::suspend`] or returns. The body can read the
/// last value it was given with [`Yielder::get`].
///
/// Although the body runs on another thread, the caller is blocked for as long
/// as the body executes, so the two never run concurrently.
///
/// # Handoff slot
///
/// The slot holds a single value which every call overwrites. A value that the
/// body did not read before the next call is lost.
///
/// # Dropping a coroutine
///
/// When a coroutine is dropped while its body is suspended, the body is woken
/// up and unwound from its suspension point as if by a panic, so that all the
/// objects it holds are properly dropped. The worker thread is then joined.
///
/// Bodies that catch panics must let this unwinding continue: a payload that
/// was not raised by the body itself has to be re-thrown with
/// [`std::panic::resume_unwind`].
///
/// # Panics
///
/// If the body panics, the panic is propagated to the caller which resumed
/// it, and the coroutine is considered complete.
pub struct Coroutine<T> {
    // None when this handle was never given a body.
    context: Option<Context<T>>,
}

impl<T: Send + 'static> Coroutine<T> {
    /// Creates a new coroutine which will execute `f` on its own thread.
    ///
    /// This uses the default [`Builder`] configuration.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create the thread. Use [`Builder::spawn`] to
    /// recover from such errors.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&Yielder<T>) + Send + 'static,
    {
        Builder::new()
            .spawn(f)
            .expect("failed to spawn coroutine thread")
    }
}

impl<T> Coroutine<T> {
    /// Passes `value` to the coroutine and resumes its execution.
    ///
    /// This blocks until the body suspends itself or returns. The returned
    /// reference allows chaining calls.
    ///
    /// # Panics
    ///
    /// Panics if the coroutine was never given a body or has already
    /// completed.
    ///
    /// If the body panics during execution then the panic is propagated to
    /// this caller.
    pub fn call(&mut self, value: T) -> &mut Self {
        let context = self.context();
        context.put(value);
        context.resume();
        self
    }

    /// Like [`Coroutine::call`], but returns a panic raised by the body as an
    /// error instead of propagating it.
    ///
    /// The error is the original panic payload, which can be inspected with
    /// `downcast_ref`.
    ///
    /// # Panics
    ///
    /// Panics if the coroutine was never given a body or has already
    /// completed.
    pub fn try_call(&mut self, value: T) -> thread::Result<&mut Self> {
        let context = self.context();
        context.put(value);
        context.try_resume()?;
        Ok(self)
    }

    /// Returns whether the coroutine has started and has not yet completed.
    ///
    /// A handle created with [`Default::default`] is never active.
    pub fn is_active(&self) -> bool {
        self.context.as_ref().map_or(false, Context::is_active)
    }

    /// Returns whether this coroutine has finished executing, either because
    /// its body returned or because it panicked.
    pub fn done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns the current lifecycle state of the coroutine.
    pub fn state(&self) -> State {
        self.context
            .as_ref()
            .map_or(State::NotStarted, Context::state)
    }

    fn context(&self) -> &Context<T> {
        match &self.context {
            Some(context) => context,
            None => panic!("attempt to resume a coroutine that was never started"),
        }
    }
}

impl Coroutine<()> {
    /// Resumes a coroutine which does not exchange any data.
    ///
    /// See [`Coroutine::call`].
    pub fn resume(&mut self) -> &mut Self {
        self.call(())
    }

    /// Resumes a coroutine which does not exchange any data, returning a
    /// panic raised by the body as an error.
    ///
    /// See [`Coroutine::try_call`].
    pub fn try_resume(&mut self) -> thread::Result<&mut Self> {
        self.try_call(())
    }
}

impl<T> Default for Coroutine<T> {
    /// Creates a handle which is not attached to any body.
    fn default() -> Self {
        Self { context: None }
    }
}

impl<T> fmt::Debug for Coroutine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Coroutine");
        if let Some(context) = &self.context {
            s.field("name", &context.shared().name());
        }
        s.field("state", &self.state()).finish()
    }
}

/// `Yielder` is the interface provided to a coroutine body which allows it to
/// suspend itself and read the values passed in by its caller.
///
/// A `Yielder` cannot be shared with other threads.
pub struct Yielder<T> {
    shared: Arc<Shared<T>>,

    // Yielder must be !Sync.
    /// ```compile_fail
    /// fn sync<T: Sync>() {}
    /// sync::<corothread::Yielder<()>>();
    /// ```
    marker: PhantomData<Cell<()>>,
}

impl<T> Yielder<T> {
    /// Suspends the execution of the coroutine.
    ///
    /// This switches control back to the caller of [`Coroutine::call`] and
    /// returns once the coroutine is called again. The value passed by that
    /// call is available through [`Yielder::get`].
    ///
    /// If the coroutine is dropped while suspended then this function does
    /// not return; instead the body is unwound.
    pub fn suspend(&self) {
        self.shared.suspend();
    }

    /// Returns a copy of the value most recently passed to
    /// [`Coroutine::call`].
    ///
    /// # Panics
    ///
    /// Panics if no value has been passed to the coroutine, or if it was
    /// moved out with [`Yielder::take`].
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        match self.shared.get() {
            Some(value) => value,
            None => panic!("no value has been passed to the coroutine"),
        }
    }

    /// Moves the value most recently passed to [`Coroutine::call`] out of the
    /// handoff slot, leaving it empty.
    pub fn take(&self) -> Option<T> {
        self.shared.take()
    }

    /// Returns whether the coroutine is still active.
    ///
    /// This is `false` only while the body is being unwound after its
    /// coroutine was dropped.
    pub fn is_active(&self) -> bool {
        self.shared.state().is_active()
    }

    /// Passes `value` to another coroutine, runs it until it suspends, then
    /// suspends the current coroutine.
    ///
    /// Any panic raised by `other` is propagated into the current body.
    pub fn transfer<U>(&self, other: &mut Coroutine<U>, value: U) {
        other.call(value);
        self.suspend();
    }
}

impl<T> fmt::Debug for Yielder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Yielder")
            .field("name", &self.shared.name())
            .finish()
    }
}

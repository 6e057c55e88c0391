//! This file contains the logic for propagating panics from a coroutine body
//! up to the caller which resumed it, and for unwinding a suspended body when
//! its coroutine is dropped.
//!
//! Panics raised by the body are caught with `catch_unwind` at the root of the
//! worker thread, handed across as a `Result` and then re-thrown in the caller
//! with `resume_unwind`.
//!
//! Interruption uses the same mechanism in the other direction: a parked body
//! that is woken up because its coroutine is being dropped unwinds with an
//! `Interrupted` payload, which only the worker root knows how to swallow.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Payload of a panic caught at the root of a coroutine.
pub type CaughtPanic = Box<dyn Any + Send + 'static>;

/// Payload used to unwind a body whose coroutine is being torn down.
pub struct Interrupted;

#[inline]
pub fn catch_unwind_at_root<T, F: FnOnce() -> T>(f: F) -> Result<T, CaughtPanic> {
    panic::catch_unwind(AssertUnwindSafe(f))
}

#[inline]
pub fn maybe_resume_unwind<T>(val: Result<T, CaughtPanic>) -> T {
    match val {
        Ok(val) => val,
        Err(e) => panic::resume_unwind(e),
    }
}

/// Unwinds the current body back to the worker root.
///
/// `resume_unwind` does not invoke the panic hook, so nothing is printed.
#[cold]
pub fn interrupt() -> ! {
    panic::resume_unwind(Box::new(Interrupted))
}

#[inline]
pub fn is_interruption(payload: &CaughtPanic) -> bool {
    payload.is::<Interrupted>()
}

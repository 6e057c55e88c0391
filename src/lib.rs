//! ## Overview
//!
//! This crate provides symmetric, stackful [coroutines] built on top of native threads. A coroutine is a function that can be paused and resumed: its caller hands it a value and control, the coroutine runs until it suspends itself, and control comes back to the caller. A coroutine can suspend itself from any point in its call stack, since its body keeps running on its own thread with its own stack.
//!
//! Caller and body never run at the same time: every coroutine has a private lock and a two-way wake-up protocol which guarantees strict alternation between the two sides.
//!
//! [coroutines]: https://en.wikipedia.org/wiki/Coroutine
//!
//! ## Example
//!
//! ```rust
//! use corothread::Coroutine;
//!
//! fn main() {
//!     println!("[main] creating coroutine");
//!
//!     let mut coroutine = Coroutine::new(|yielder| {
//!         for _ in 0..3 {
//!             println!("[coroutine] got {} from parent", yielder.get());
//!             yielder.suspend();
//!         }
//!         println!("[coroutine] exiting coroutine");
//!     });
//!
//!     let mut counter = 100;
//!     while !coroutine.done() {
//!         println!("[main] resuming coroutine with argument {}", counter);
//!         coroutine.call(counter);
//!         counter += 1;
//!     }
//!
//!     println!("[main] exiting");
//! }
//! ```
//!
//! #### Output
//!
//! ```text
//! [main] creating coroutine
//! [main] resuming coroutine with argument 100
//! [coroutine] got 100 from parent
//! [main] resuming coroutine with argument 101
//! [coroutine] got 101 from parent
//! [main] resuming coroutine with argument 102
//! [coroutine] got 102 from parent
//! [main] resuming coroutine with argument 103
//! [coroutine] exiting coroutine
//! [main] exiting
//! ```
//!
//! ## Features
//!
//! #### Panic propagation
//!
//! If a panic occurs in a coroutine then it is caught at the root of the coroutine's thread and continues to unwind out of the caller which last resumed it. The original payload is preserved. Once this has happened, the coroutine is considered complete and can no longer be resumed.
//!
//! [`Coroutine::try_call`] returns the payload as an error instead.
//!
//! #### Cleanup on drop
//!
//! If a coroutine is dropped while it is suspended then its body is woken up and unwound from the suspension point using the same mechanism as panics, which will drop any local variables on its stack. The worker thread is joined before the coroutine's shared state is released.
//!
//! #### Nesting
//!
//! Every coroutine has its own thread and its own lock, so a coroutine body can freely create and drive other coroutines. Resuming an outer coroutine never resumes an inner one.
//!
//! ## Utilities
//!
//! The crate also ships a few standalone value types with no relation to coroutines: a fixed-width bit set ([`bits::BitArray`]), a fixed-point scaled integer ([`fixed::ShiftedInt`]) and an allocator interface ([`allocator::Allocator`]).
//!
//! ## Logging
//!
//! State transitions are reported through the [`log`] facade, tagged with the coroutine's name.

#![warn(missing_docs)]

mod unwind;

mod context;
mod coroutine;

pub mod allocator;
pub mod bits;
pub mod fixed;

pub use context::State;
pub use coroutine::*;

#[cfg(test)]
mod tests;

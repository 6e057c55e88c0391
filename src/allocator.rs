//! A minimal pluggable allocation interface.
//!
//! An [`Allocator`] hands out raw blocks of memory together with an opaque
//! handle which is later used to release them. The handle lets an allocator
//! keep whatever bookkeeping it needs without a lookup from the address.

use std::ptr::NonNull;

/// A block of memory returned by an [`Allocator`].
#[derive(Debug)]
pub struct Allocation<Aux> {
    /// Opaque handle to pass back to [`Allocator::deallocate`].
    pub aux: Aux,

    /// Address of the first byte of the block.
    pub addr: NonNull<u8>,
}

/// A trait for objects which allocate raw memory.
///
/// # Safety
///
/// The memory returned by `allocate` must be valid for reads and writes of
/// `size` bytes, aligned at least like the platform's `malloc`, and must not
/// overlap any other live allocation until it is passed to `deallocate`.
pub unsafe trait Allocator {
    /// Handle identifying an allocation.
    type Aux;

    /// Allocates a block of at least `size` bytes, or returns `None` if the
    /// memory is exhausted.
    fn allocate(&mut self, size: usize) -> Option<Allocation<Self::Aux>>;

    /// Releases an allocation.
    ///
    /// # Safety
    ///
    /// `aux` must come from a call to `allocate` on this allocator, must not
    /// have been released already, and the memory must no longer be in use.
    unsafe fn deallocate(&mut self, aux: Self::Aux);
}

unsafe impl<'a, A: Allocator> Allocator for &'a mut A {
    type Aux = A::Aux;

    #[inline]
    fn allocate(&mut self, size: usize) -> Option<Allocation<Self::Aux>> {
        (**self).allocate(size)
    }

    #[inline]
    unsafe fn deallocate(&mut self, aux: Self::Aux) {
        (**self).deallocate(aux)
    }
}

/// Allocator backed by the C library's `malloc` and `free`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAllocator;

unsafe impl Allocator for DefaultAllocator {
    type Aux = NonNull<u8>;

    fn allocate(&mut self, size: usize) -> Option<Allocation<Self::Aux>> {
        // malloc(0) may legitimately return null.
        let ptr = unsafe { libc::malloc(size.max(1)) };
        let addr = NonNull::new(ptr.cast::<u8>())?;
        Some(Allocation { aux: addr, addr })
    }

    unsafe fn deallocate(&mut self, aux: Self::Aux) {
        libc::free(aux.as_ptr().cast());
    }
}

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-frame bump arena.
//!
//! [`ScopeAllocator`] services `new::<T>()` by advancing a pointer into a
//! cache-line-aligned backing buffer and frees everything at once on
//! [`reset`](ScopeAllocator::reset), running any registered destructors in
//! LIFO order first. It backs the Frame Graph's per-pass execute closures,
//! but has no notion of passes or frames itself — just typed allocations and
//! teardown order.
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | Backing storage | raw `alloc`/`dealloc` with an explicit `Layout`, not `Vec<u8>` — a `Vec`'s allocation is only byte-aligned, and the contract requires cache-line alignment |
//! | Destructor chain | `Vec<(offset, unsafe fn(*mut u8))>`, walked in reverse on `reset` |
//! | Thread check | always on (no `debug_assert!` gate), per §4.C's "the check is always on, not only in debug builds" |

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::NonNull;
use std::thread::{self, ThreadId};

use framesched_errors::ErrorKind;
use tracing::debug;

/// Cache-line size assumed for backing-buffer alignment. Matches common x86
/// and ARM L1 line sizes; allocations narrower than this are still placed at
/// their own natural alignment within the buffer.
const CACHE_LINE: usize = 64;

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// A monotonic, single-owner bump allocator for one frame's worth of
/// transient storage.
///
/// Must be constructed and used (`new`, `reset`) from a single thread; any
/// other thread attempting `new` or `reset` receives
/// `ErrorKind::ThreadViolation`.
pub struct ScopeAllocator {
    ptr: NonNull<u8>,
    capacity: usize,
    layout: Layout,
    offset: usize,
    destructors: Vec<(usize, unsafe fn(*mut u8))>,
    owner: ThreadId,
}

impl ScopeAllocator {
    /// Allocate a `capacity`-byte backing buffer, cache-line aligned, owned
    /// by the calling thread.
    pub fn new(capacity: usize) -> Self {
        let size = capacity.max(1);
        let layout = Layout::from_size_align(size, CACHE_LINE)
            .expect("scope allocator capacity overflowed alignment requirements");
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));

        Self {
            ptr,
            capacity: size,
            layout,
            offset: 0,
            destructors: Vec::new(),
            owner: thread::current().id(),
        }
    }

    fn check_owner(&self, op: &str) -> Result<(), ErrorKind> {
        let current = thread::current().id();
        if current != self.owner {
            return Err(ErrorKind::thread_violation(format!(
                "ScopeAllocator::{op} called from a thread other than its owner"
            )));
        }
        Ok(())
    }

    /// Placement-construct `value` into the arena and return a stable
    /// pointer to it (stable until the next `reset`). If `T` has a
    /// destructor, it is registered and run during `reset`, in LIFO order
    /// relative to other registered destructors.
    pub fn new_value<T>(&mut self, value: T) -> Result<*mut T, ErrorKind> {
        self.check_owner("new")?;

        let align = mem::align_of::<T>();
        let size = mem::size_of::<T>();
        let aligned_offset = align_up(self.offset, align);
        let end = aligned_offset.checked_add(size).ok_or_else(|| {
            ErrorKind::out_of_memory("requested allocation size overflowed usize")
        })?;

        if end > self.capacity {
            return Err(ErrorKind::out_of_memory(format!(
                "allocation of {size} bytes (aligned offset {aligned_offset}) exceeds remaining capacity ({} of {} bytes used)",
                self.offset, self.capacity
            )));
        }

        // SAFETY: aligned_offset + size <= capacity, and ptr owns `capacity`
        // bytes starting at `ptr`.
        let slot = unsafe { self.ptr.as_ptr().add(aligned_offset) as *mut T };
        unsafe { slot.write(value) };

        if mem::needs_drop::<T>() {
            unsafe fn drop_glue<T>(p: *mut u8) {
                // SAFETY: p was produced by `new_value::<T>` above.
                std::ptr::drop_in_place(p as *mut T);
            }
            self.destructors.push((aligned_offset, drop_glue::<T>));
        }

        self.offset = end;
        Ok(slot)
    }

    /// Run the destructor chain in LIFO order and rewind the bump pointer to
    /// zero. Backing buffer capacity is unchanged.
    pub fn reset(&mut self) -> Result<(), ErrorKind> {
        self.check_owner("reset")?;
        self.run_destructors();
        self.offset = 0;
        Ok(())
    }

    fn run_destructors(&mut self) {
        for (offset, drop_fn) in self.destructors.drain(..).rev() {
            // SAFETY: each entry was registered by `new_value` with a valid
            // offset into `self.ptr`'s buffer, and has not been dropped yet
            // (destructors only run here or in `Drop`, both of which drain
            // the list).
            unsafe { drop_fn(self.ptr.as_ptr().add(offset)) };
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.offset
    }
}

impl Drop for ScopeAllocator {
    fn drop(&mut self) {
        self.run_destructors();
        // SAFETY: `layout` matches the one used in `alloc::alloc` above, and
        // `self.ptr` has not been freed before.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        debug!(capacity = self.capacity, "scope allocator freed");
    }
}

// Deliberately neither `Send` nor `Sync`: the always-on thread check exists
// precisely because this type is meant to stay on one thread, and the
// absence of these impls makes accidental cross-thread moves a compile error
// rather than a runtime `ThreadViolation`.

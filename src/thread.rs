//! Holds the [`ThreadRecord`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::{Stack, StackRegion};

/// The entry point of a thread
///
/// Threads are infinite loops, so the type does not allow them to return.
pub type ThreadEntry = fn() -> !;

/// Identifies a thread by its position in the thread table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ThreadId(usize);

impl ThreadId {
    /// Represents the Thread ID we produce when the scheduler isn't running
    const INVALID_ID: usize = usize::MAX;

    /// Is this the invalid Thread ID?
    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID_ID
    }

    /// Create an invalid Thread ID
    pub(crate) const fn invalid() -> ThreadId {
        ThreadId(Self::INVALID_ID)
    }

    pub(crate) const fn new(index: usize) -> ThreadId {
        ThreadId(index)
    }

    /// Position of this thread in the thread table
    pub const fn index(self) -> usize {
        self.0
    }
}

#[cfg(target_os = "none")]
impl defmt::Format for ThreadId {
    fn format(&self, fmt: defmt::Formatter) {
        if self.is_invalid() {
            defmt::write!(fmt, "T---");
        } else {
            defmt::write!(fmt, "T{=usize:03}", self.0);
        }
    }
}

impl core::fmt::Display for ThreadId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_invalid() {
            write!(fmt, "T---")
        } else {
            write!(fmt, "T{:03}", self.0)
        }
    }
}

/// The scheduling state of one thread
///
/// The saved stack pointer is only meaningful while the thread is not
/// running. The successor link and ID are written when the thread set is
/// built and never change once the scheduler is launched.
pub struct ThreadRecord {
    /// Top of the saved register image
    saved_sp: AtomicPtr<u32>,
    /// Index of the thread that runs after this one
    next: AtomicUsize,
    /// Informational ID, equal to this record's table index once built
    id: AtomicUsize,
    /// The stack this thread runs on, for the life of the device
    stack: StackRegion,
}

impl ThreadRecord {
    /// Create a new [`ThreadRecord`] bound to the given stack
    pub const fn new<const LEN: usize>(stack: &'static Stack<LEN>) -> ThreadRecord {
        ThreadRecord {
            saved_sp: AtomicPtr::new(core::ptr::null_mut()),
            next: AtomicUsize::new(0),
            id: AtomicUsize::new(ThreadId::INVALID_ID),
            stack: stack.region(),
        }
    }

    /// Get the saved stack pointer for this thread
    pub fn saved_sp(&self) -> *mut u32 {
        self.saved_sp.load(Ordering::Relaxed)
    }

    /// Set the saved stack pointer for this thread
    ///
    /// # Safety
    ///
    /// The thread will resume using the stack given, so it must point to the
    /// last item in a valid Arm EABI stack, with a full saved frame
    /// proceeding it.
    pub(crate) unsafe fn set_saved_sp(&self, new_sp: *mut u32) {
        self.saved_sp.store(new_sp, Ordering::Relaxed)
    }

    /// Get the thread that follows this one
    pub fn next(&self) -> ThreadId {
        ThreadId(self.next.load(Ordering::Relaxed))
    }

    /// Get the ID of this thread
    pub fn id(&self) -> ThreadId {
        ThreadId(self.id.load(Ordering::Relaxed))
    }

    /// Get the stack this thread runs on
    pub fn stack(&self) -> &StackRegion {
        &self.stack
    }

    /// Give this record its place in the run cycle
    pub(crate) fn link(&self, id: ThreadId, next: ThreadId) {
        self.id.store(id.0, Ordering::Relaxed);
        self.next.store(next.0, Ordering::Relaxed);
    }
}

/// SAFETY: The stack pointers are only dereferenced by the scheduler, with
/// interrupts masked or from the context switch handler.
unsafe impl Sync for ThreadRecord {}


// End of File

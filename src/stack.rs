//! Holds the [`Stack`] and [`StackRegion`] types and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::UnsafeCell;

use crate::config::{MIN_STACK_SIZE, STACK_SENTINEL};

/// A thread stack, with the given size `LEN` bytes.
///
/// The value of `LEN` must be a multiple of 8, and at least
/// [`MIN_STACK_SIZE`], which is checked with an assert. A `Stack` in a
/// `static` therefore fails to compile if it is too small.
///
/// We align stacks on 8-byte boundaries, as required by AAPCS.
#[repr(align(8))]
pub struct Stack<const LEN: usize> {
    /// The memory reserved for the thread stack
    contents: UnsafeCell<[u8; LEN]>,
}

impl<const LEN: usize> Stack<LEN> {
    /// Create a new stack
    pub const fn new() -> Self {
        assert!(LEN.is_multiple_of(8));
        assert!(LEN >= MIN_STACK_SIZE);
        Self {
            contents: UnsafeCell::new([0u8; LEN]),
        }
    }

    /// Get the top of the stack
    pub const fn top(&self) -> *mut u32 {
        // SAFETY: Pointing one past this object is allowed, as this is full
        // descending stack and we never write to the 'top' address - only
        // below it
        unsafe { self.contents.get().add(1) as *mut u32 }
    }

    /// Get the lowest word of the stack
    pub const fn base(&self) -> *mut u32 {
        self.contents.get() as *mut u32
    }

    /// Describe the memory this stack covers
    ///
    /// Taking a `'static` borrow means the region can never be reclaimed.
    pub const fn region(&'static self) -> StackRegion {
        StackRegion {
            base: self.base(),
            top: self.top(),
        }
    }
}

/// SAFETY: Our stack object only exposes pointers to itself, so is thread-safe
/// despite containing an `UnsafeCell`.
unsafe impl<const LEN: usize> Sync for Stack<LEN> {}

impl<const LEN: usize> Default for Stack<LEN> {
    fn default() -> Self {
        Stack::new()
    }
}

/// The memory covered by one [`Stack`], independent of its size
///
/// Each region belongs to exactly one [`ThreadRecord`](crate::ThreadRecord)
/// for the life of the device.
#[derive(Debug)]
pub struct StackRegion {
    base: *mut u32,
    top: *mut u32,
}

impl StackRegion {
    /// One past the highest word of the region
    pub const fn top(&self) -> *mut u32 {
        self.top
    }

    /// The lowest word of the region
    pub const fn base(&self) -> *mut u32 {
        self.base
    }

    /// Size of the region in 32-bit words
    pub fn len_words(&self) -> usize {
        (self.top as usize - self.base as usize) / 4
    }

    /// Do these two regions share any memory?
    pub fn overlaps(&self, other: &StackRegion) -> bool {
        (self.base as usize) < (other.top as usize) && (other.base as usize) < (self.top as usize)
    }

    /// Write the overflow sentinel into the lowest word
    ///
    /// # Safety
    ///
    /// The thread owning this region must not be running.
    pub(crate) unsafe fn plant_sentinel(&self) {
        unsafe { self.base.write_volatile(STACK_SENTINEL) }
    }

    /// Is the overflow sentinel still in place?
    pub fn sentinel_intact(&self) -> bool {
        // SAFETY: the base is a valid, aligned word inside the stack
        unsafe { self.base.read_volatile() == STACK_SENTINEL }
    }
}


// End of File

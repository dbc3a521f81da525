//! Holds the [`StackPusher`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// A helper for pushing words into a full-descending Arm EABI stack
pub(crate) struct StackPusher {
    current: *mut u32,
    pushed: usize,
}

impl StackPusher {
    /// Make a new full-descending stack from the given pointer
    ///
    /// It will not write to the given pointer, but it will write immediately
    /// below it - because this is a Full Descending stack.
    ///
    /// # Safety
    ///
    /// There must be enough free space below the given pointer to accept all
    /// the items you are going to push.
    pub(crate) unsafe fn new(stack_top: *mut u32) -> StackPusher {
        StackPusher {
            current: stack_top,
            pushed: 0,
        }
    }

    /// Push a word onto the stack, moving the stack pointer down
    pub(crate) fn push(&mut self, value: u32) {
        // SAFETY: the caller of `new` promised us the space
        unsafe {
            self.current = self.current.offset(-1);
            self.current.write_volatile(value);
        }
        self.pushed += 1;
    }

    /// Get the current stack pointer
    pub(crate) fn current(&self) -> *mut u32 {
        self.current
    }

    /// How many words have been pushed so far
    pub(crate) fn pushed(&self) -> usize {
        self.pushed
    }
}

// End of File

//! Holds the [`CriticalSection`] type
//!
//! A critical section masks interrupts so that scheduler state can be
//! changed without the tick handler seeing it half-way through.
//!
//! This is not a counting lock. Each section remembers whether interrupts
//! were enabled when it was entered, and puts exactly that back when it is
//! dropped. An inner section therefore leaves interrupts masked if an outer
//! one is still open.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::marker::PhantomData;

use crate::Port;

/// A scope in which interrupts are masked
///
/// Interrupts are restored to their previous state when this is dropped.
pub struct CriticalSection<'p, P: Port + ?Sized> {
    port: &'p P,
    was_enabled: bool,
    /// Interrupt state is per-core, so this must not move between contexts
    _not_send: PhantomData<*const ()>,
}

impl<'p, P: Port + ?Sized> CriticalSection<'p, P> {
    /// Mask interrupts, remembering whether they were enabled
    pub fn enter(port: &'p P) -> Self {
        let was_enabled = port.interrupts_enabled();
        port.disable_interrupts();
        CriticalSection {
            port,
            was_enabled,
            _not_send: PhantomData,
        }
    }

    /// Were interrupts enabled when this section was entered?
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<P: Port + ?Sized> Drop for CriticalSection<'_, P> {
    fn drop(&mut self) {
        if self.was_enabled {
            // SAFETY: they were enabled when we came in, so whoever masked
            // them since has also restored their own state by now.
            unsafe { self.port.enable_interrupts() }
        }
    }
}

/// Run a closure with interrupts masked
pub fn free<P, F, R>(port: &P, f: F) -> R
where
    P: Port + ?Sized,
    F: FnOnce(&CriticalSection<'_, P>) -> R,
{
    let cs = CriticalSection::enter(port);
    f(&cs)
}


// End of File

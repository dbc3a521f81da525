//! The hardware the scheduler relies on
//!
//! The scheduler needs very little from its environment: a way to mask
//! interrupts, a periodic tick, a way to ask for a context switch, and a way
//! to dispatch the first thread. [`Port`] collects those, and [`CortexM`]
//! provides them on Arm M-profile processors.
//!
//! The busy-wait delays in [`crate::delay`] need a one-shot countdown, which
//! is [`OneShotTimer`].

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use cortex_m::peripheral::{SCB, SYST, scb::SystemHandler, syst::SystClkSource};

use crate::TimeSlice;

/// What the scheduler needs from the processor it runs on
pub trait Port {
    /// Are interrupts currently enabled?
    fn interrupts_enabled(&self) -> bool;

    /// Mask all interrupts of configurable priority
    fn disable_interrupts(&self);

    /// Unmask interrupts
    ///
    /// # Safety
    ///
    /// Must not be called inside a critical section that somebody else
    /// opened.
    unsafe fn enable_interrupts(&self);

    /// Start the periodic tick, firing once every `slice`
    fn arm_tick(&mut self, slice: TimeSlice);

    /// Ask for a context switch once the current interrupt has finished
    fn request_switch(&self);

    /// Enable interrupts and dispatch the first thread
    ///
    /// Called with interrupts masked and the tick already armed. Anything
    /// the context switch needs must be set up before interrupts are
    /// unmasked. Control passes to the thread set and never comes back.
    fn first_dispatch(&mut self) -> !;
}

/// A one-shot down-counter, used for busy-wait delays
pub trait OneShotTimer {
    /// Start counting down from `reload`
    fn start(&mut self, reload: u32);

    /// Has the count since the last `start` run out?
    fn expired(&self) -> bool;
}

/// The [`Port`] for Arm Cortex-M processors
///
/// Owns the SysTick peripheral, which provides the tick. Context switches
/// happen in the PendSV handler.
pub struct CortexM {
    syst: SYST,
}

impl CortexM {
    /// The lowest exception priority, used for both SysTick and PendSV so
    /// neither can pre-empt the other
    const LOWEST_PRIORITY: u8 = 0xFF;

    /// Take ownership of SysTick for the scheduler
    pub fn new(syst: SYST) -> CortexM {
        CortexM { syst }
    }

    /// Conjure up a port from thin air
    ///
    /// # Safety
    ///
    /// Only for use in exception handlers, which must not call
    /// [`Port::arm_tick`] or [`Port::first_dispatch`] on it.
    pub(crate) unsafe fn steal() -> CortexM {
        CortexM {
            syst: unsafe { cortex_m::Peripherals::steal() }.SYST,
        }
    }
}

impl Port for CortexM {
    fn interrupts_enabled(&self) -> bool {
        cortex_m::register::primask::read().is_active()
    }

    fn disable_interrupts(&self) {
        cortex_m::interrupt::disable();
    }

    unsafe fn enable_interrupts(&self) {
        unsafe { cortex_m::interrupt::enable() }
    }

    fn arm_tick(&mut self, slice: TimeSlice) {
        self.syst.disable_counter();
        self.syst.set_reload(slice.reload());
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.clear_current();
        self.syst.enable_counter();
        self.syst.enable_interrupt();
    }

    fn request_switch(&self) {
        SCB::set_pendsv();
    }

    fn first_dispatch(&mut self) -> ! {
        // SAFETY: we only touch the system handler priorities, which nobody
        // else in this crate uses
        let mut scb = unsafe { cortex_m::Peripherals::steal() }.SCB;
        unsafe {
            scb.set_priority(SystemHandler::PendSV, Self::LOWEST_PRIORITY);
            scb.set_priority(SystemHandler::SysTick, Self::LOWEST_PRIORITY);
        }

        // A zero PSP tells PendSV that there is no thread context to save
        unsafe {
            cortex_m::register::psp::write(0);
        }

        // Fire the PendSV exception - the PendSV handler will pick up the
        // current thread and run it. A tick that came in while we were masked
        // is also pending, but PendSV has the lower exception number so it
        // goes first.
        debug!("Hit PendSV");
        SCB::set_pendsv();
        unsafe {
            cortex_m::interrupt::enable();
        }
        // flush the pipeline to ensure the PendSV fires before we reach the end of this function
        cortex_m::asm::isb();
        // impossible to get here
        unreachable!();
    }
}

/// A [`OneShotTimer`] built on the DWT cycle counter
///
/// The counter itself is shared, so copies can time independent waits.
/// Armv6-M and Armv8-M Baseline have no cycle counter.
#[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
#[derive(Copy, Clone, Debug)]
pub struct DwtTimer {
    started_at: u32,
    reload: u32,
}

#[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
impl DwtTimer {
    /// Turn on the cycle counter
    pub fn new(dcb: &mut cortex_m::peripheral::DCB, dwt: &mut cortex_m::peripheral::DWT) -> DwtTimer {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        DwtTimer {
            started_at: 0,
            reload: 0,
        }
    }
}

#[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
impl OneShotTimer for DwtTimer {
    fn start(&mut self, reload: u32) {
        self.reload = reload;
        self.started_at = cortex_m::peripheral::DWT::cycle_count();
    }

    fn expired(&self) -> bool {
        cortex_m::peripheral::DWT::cycle_count().wrapping_sub(self.started_at) >= self.reload
    }
}

// End of File

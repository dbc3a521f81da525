//! rrtos: a Round-Robin RTOS for Arm Cortex-M
//!
//! Runs a fixed, build-time set of never-returning threads, giving each one
//! an equal time slice in a fixed cyclic order. There are no priorities, no
//! blocking and no inter-thread communication.
//!
//! ```rust,ignore
//! static THREADS: [ThreadRecord; 3] = [
//!     ThreadRecord::new(&STACK_A),
//!     ThreadRecord::new(&STACK_B),
//!     ThreadRecord::new(&STACK_C),
//! ];
//! static SCHEDULER: Scheduler = Scheduler::new(&THREADS);
//!
//! let mut port = CortexM::new(cp.SYST);
//! SCHEDULER.build_thread_set(&port, &[task_a, task_b, task_c])?;
//! let Err(e) = SCHEDULER.launch(port, TimeSlice::new(8_000_000)?);
//! ```

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

mod asm;
pub mod config;
pub mod critical;
pub mod delay;
mod error;
pub mod frame;
pub mod port;
mod scheduler;
mod stack;
mod stack_pusher;
mod thread;

#[cfg(test)]
mod sim;

pub use config::TimeSlice;
pub use error::Error;
pub use port::{CortexM, Port};
pub use scheduler::{Lifecycle, Scheduler};
pub use stack::{Stack, StackRegion};
use stack_pusher::StackPusher;
pub use thread::{ThreadEntry, ThreadId, ThreadRecord};

/// Get the current time in scheduler ticks
///
/// Returns zero if no scheduler has been launched.
pub fn now() -> u32 {
    match Scheduler::get_scheduler() {
        Some(scheduler) => scheduler.now(),
        None => 0,
    }
}

/// Get the ID of the running thread
///
/// Returns an invalid ID if no scheduler has been launched.
pub fn current_thread() -> ThreadId {
    match Scheduler::get_scheduler() {
        Some(scheduler) => scheduler.current_thread_id(),
        None => ThreadId::invalid(),
    }
}

/// SysTick Handler
///
/// Fires once per time slice and asks for a context switch.
#[unsafe(no_mangle)]
extern "C" fn SysTick() {
    if let Some(scheduler) = Scheduler::get_scheduler() {
        // SAFETY: the tick only uses the PendSV request and PRIMASK, which
        // are safe to touch from any context on a single core.
        let port = unsafe { CortexM::steal() };
        scheduler.tick(&port);
    }
}

// End of File

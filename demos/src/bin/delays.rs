//! Three threads that wait in different ways
//!
//! Threads never block, so waiting means spinning through your own time
//! slices. Needs a core with a DWT cycle counter (QEMU does not emulate
//! one), such as a TM4C123 at 16 MHz.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::cell::Cell;

use cortex_m::interrupt::Mutex;
use rrtos::{
    CortexM, Scheduler, Stack, ThreadRecord, TimeSlice,
    delay::{self, busy_wait_ms},
    port::DwtTimer,
};

use rrtos_demos as _;

/// Core clock frequency
const CLOCK_HZ: u32 = 16_000_000;

/// 10ms time slices
const TIME_SLICE: u32 = CLOCK_HZ / 100;

static SCHEDULER: Scheduler = Scheduler::new({
    static THREAD_LIST: [ThreadRecord; 3] = [
        ThreadRecord::new({
            static STACK: Stack<1024> = Stack::new();
            &STACK
        }),
        ThreadRecord::new({
            static STACK: Stack<1024> = Stack::new();
            &STACK
        }),
        ThreadRecord::new({
            static STACK: Stack<1024> = Stack::new();
            &STACK
        }),
    ];
    &THREAD_LIST
});

/// A timer on the running cycle counter, which each busy-waiting thread copies
static TIMER: Mutex<Cell<Option<DwtTimer>>> = Mutex::new(Cell::new(None));

#[cortex_m_rt::entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();
    defmt::info!("Hello!");
    let timer = DwtTimer::new(&mut cp.DCB, &mut cp.DWT);
    cortex_m::interrupt::free(|cs| TIMER.borrow(cs).set(Some(timer)));

    let port = CortexM::new(cp.SYST);
    if let Err(e) = SCHEDULER.build_thread_set(&port, &[rabbits, hamsters, cats]) {
        defmt::panic!("Failed to build threads: {}", e);
    }
    let slice = match TimeSlice::new(TIME_SLICE) {
        Ok(slice) => slice,
        Err(e) => defmt::panic!("Bad time slice: {}", e),
    };
    let Err(e) = SCHEDULER.launch(port, slice);
    defmt::panic!("Failed to launch: {}", e);
}

/// Waits five ticks between messages
fn rabbits() -> ! {
    loop {
        defmt::info!("Rabbit! (back in 5 ticks)");
        delay::sleep_ticks(5);
    }
}

/// Waits for 250ms of its own time between messages
fn hamsters() -> ! {
    let mut timer = own_timer();
    loop {
        defmt::info!("Hamster! (back in 250ms)");
        busy_wait_ms(&mut timer, CLOCK_HZ, 250);
    }
}

/// Waits for 100ms of its own time between messages
fn cats() -> ! {
    let mut timer = own_timer();
    loop {
        defmt::info!("Cat! (back in 100ms)");
        busy_wait_ms(&mut timer, CLOCK_HZ, 100);
    }
}

/// Get a private copy of the cycle counter timer
fn own_timer() -> DwtTimer {
    cortex_m::interrupt::free(|cs| TIMER.borrow(cs).get()).unwrap()
}

// End of File

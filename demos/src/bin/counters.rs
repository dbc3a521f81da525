//! Three threads each count as fast as they can
//!
//! None of them ever yields or shares anything. After 300 ticks the first
//! thread reports how far each one got; with equal time slices each should
//! have roughly a third of the total.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use rrtos::{CortexM, Scheduler, Stack, ThreadRecord, TimeSlice};

use rrtos_demos as _;

/// Core clock cycles per time slice
const TIME_SLICE: u32 = 100_000;

/// How long to run before reporting
const RUN_TICKS: u32 = 300;

static THREADS: [ThreadRecord; 3] = [
    ThreadRecord::new(&STACK1),
    ThreadRecord::new(&STACK2),
    ThreadRecord::new(&STACK3),
];

static SCHEDULER: Scheduler = Scheduler::new(&THREADS);

static COUNT1: AtomicU32 = AtomicU32::new(0);
static COUNT2: AtomicU32 = AtomicU32::new(0);
static COUNT3: AtomicU32 = AtomicU32::new(0);

#[cortex_m_rt::entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();
    defmt::info!("Hello!");
    let port = CortexM::new(cp.SYST);
    if let Err(e) = SCHEDULER.build_thread_set(&port, &[task1, task2, task3]) {
        defmt::panic!("Failed to build threads: {}", e);
    }
    let slice = match TimeSlice::new(TIME_SLICE) {
        Ok(slice) => slice,
        Err(e) => defmt::panic!("Bad time slice: {}", e),
    };
    let Err(e) = SCHEDULER.launch(port, slice);
    defmt::panic!("Failed to launch: {}", e);
}

static STACK1: Stack<1024> = Stack::new();

/// Counts, and reports once enough ticks have gone by
fn task1() -> ! {
    loop {
        COUNT1.fetch_add(1, Ordering::Relaxed);
        if rrtos::now() >= RUN_TICKS {
            report();
        }
    }
}

static STACK2: Stack<1024> = Stack::new();

/// Counts
fn task2() -> ! {
    loop {
        COUNT2.fetch_add(1, Ordering::Relaxed);
    }
}

static STACK3: Stack<1024> = Stack::new();

/// Counts
fn task3() -> ! {
    loop {
        COUNT3.fetch_add(1, Ordering::Relaxed);
    }
}

/// Print the counts and exit QEMU
fn report() -> ! {
    let counts = [
        COUNT1.load(Ordering::Relaxed),
        COUNT2.load(Ordering::Relaxed),
        COUNT3.load(Ordering::Relaxed),
    ];
    let total: u32 = counts.iter().sum();
    defmt::info!("Counts {} (total {=u32})", counts, total);
    let fair = counts
        .iter()
        .all(|count| count.abs_diff(total / 3) <= total / 30);
    for id in SCHEDULER.thread_ids() {
        if SCHEDULER.stack_overflowed(id) {
            defmt::warn!("{} overflowed its stack", id);
        }
    }
    if fair {
        semihosting::process::exit(0);
    } else {
        defmt::error!("Threads did not get equal time");
        semihosting::process::exit(1);
    }
}

// End of File

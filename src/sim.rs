//! A host simulation of the Cortex-M context switch
//!
//! [`SimPort`] stands in for the interrupt mask and the tick timer.
//! [`SimCpu`] plays the part of exception entry, PendSV and exception return:
//! it stacks and unstacks register contexts in exactly the layout described
//! in [`crate::frame`], so a scheduler can be driven through thousands of
//! ticks on the host.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::Cell;

use crate::config::FRAME_WORDS;
use crate::frame::offset;
use crate::{Port, Scheduler, Stack, StackPusher, ThreadId, ThreadRecord, TimeSlice};

/// Make a scheduler with `n` threads, each with its own leaked stack
pub(crate) fn leak_scheduler(n: usize) -> &'static Scheduler {
    let threads: Vec<ThreadRecord> = (0..n)
        .map(|_| {
            let stack: &'static Stack<512> = Box::leak(Box::new(Stack::new()));
            ThreadRecord::new(stack)
        })
        .collect();
    Box::leak(Box::new(Scheduler::new(threads.leak())))
}

/// A [`Port`] that just records what was asked of it
pub(crate) struct SimPort {
    enabled: Cell<bool>,
    disables: Cell<usize>,
    switch_requests: Cell<usize>,
    armed: Option<TimeSlice>,
    /// Were interrupts enabled when the tick was armed?
    armed_unmasked: Option<bool>,
}

impl SimPort {
    /// Interrupts start enabled
    pub(crate) fn new() -> SimPort {
        SimPort {
            enabled: Cell::new(true),
            disables: Cell::new(0),
            switch_requests: Cell::new(0),
            armed: None,
            armed_unmasked: None,
        }
    }

    pub(crate) fn disable_count(&self) -> usize {
        self.disables.get()
    }

    pub(crate) fn switch_requests(&self) -> usize {
        self.switch_requests.get()
    }

    pub(crate) fn armed_slice(&self) -> Option<TimeSlice> {
        self.armed
    }

    pub(crate) fn armed_unmasked(&self) -> Option<bool> {
        self.armed_unmasked
    }
}

impl Port for SimPort {
    fn interrupts_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn disable_interrupts(&self) {
        self.disables.set(self.disables.get() + 1);
        self.enabled.set(false);
    }

    unsafe fn enable_interrupts(&self) {
        self.enabled.set(true);
    }

    fn arm_tick(&mut self, slice: TimeSlice) {
        self.armed = Some(slice);
        self.armed_unmasked = Some(self.enabled.get());
    }

    fn request_switch(&self) {
        self.switch_requests.set(self.switch_requests.get() + 1);
    }

    fn first_dispatch(&mut self) -> ! {
        unimplemented!("the simulation dispatches through SimCpu");
    }
}

/// The registers of a simulated Cortex-M core
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Registers {
    /// R0 to R12
    pub(crate) r: [u32; 13],
    pub(crate) lr: u32,
    pub(crate) pc: u32,
    pub(crate) xpsr: u32,
    /// What the core would hold in LR inside the exception handler
    pub(crate) exc_return: u32,
}

/// A simulated core running threads from one scheduler
pub(crate) struct SimCpu<'s> {
    scheduler: &'s Scheduler,
    psp: *mut u32,
    pub(crate) regs: Registers,
}

impl<'s> SimCpu<'s> {
    /// A core that has not dispatched anything yet
    pub(crate) fn new(scheduler: &'s Scheduler) -> SimCpu<'s> {
        SimCpu {
            scheduler,
            psp: core::ptr::null_mut(),
            regs: Registers::default(),
        }
    }

    /// The PendSV path: save (if a thread is running), switch, restore
    pub(crate) fn pend_sv(&mut self) {
        let saved = if self.psp.is_null() {
            core::ptr::null_mut()
        } else {
            self.save()
        };
        // SAFETY: `save` just stacked a full frame there
        let next = unsafe { self.scheduler.switch_context(saved) };
        self.restore(next);
    }

    /// The thread the scheduler has on the core
    pub(crate) fn running(&self) -> ThreadId {
        self.scheduler.current_thread_id()
    }

    /// Exception entry followed by the PendSV pushes
    fn save(&mut self) -> *mut u32 {
        // SAFETY: the thread stack has room for a frame below PSP
        let mut stack_pusher = unsafe { StackPusher::new(self.psp) };
        stack_pusher.push(self.regs.xpsr);
        stack_pusher.push(self.regs.pc);
        stack_pusher.push(self.regs.lr);
        stack_pusher.push(self.regs.r[12]);
        for reg in (0..=3).rev() {
            stack_pusher.push(self.regs.r[reg]);
        }
        stack_pusher.push(self.regs.exc_return);
        for reg in (4..=11).rev() {
            stack_pusher.push(self.regs.r[reg]);
        }
        assert_eq!(stack_pusher.pushed(), FRAME_WORDS);
        stack_pusher.current()
    }

    /// The PendSV pops followed by exception return
    fn restore(&mut self, sp: *mut u32) {
        let word = |idx: usize| unsafe { sp.add(idx).read_volatile() };
        for reg in 4..=11 {
            self.regs.r[reg] = word(offset::R4 + reg - 4);
        }
        self.regs.exc_return = word(offset::EXC_RETURN);
        for reg in 0..=3 {
            self.regs.r[reg] = word(offset::R0 + reg);
        }
        self.regs.r[12] = word(offset::R12);
        self.regs.lr = word(offset::LR);
        self.regs.pc = word(offset::PC);
        self.regs.xpsr = word(offset::XPSR);
        self.psp = unsafe { sp.add(FRAME_WORDS) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThreadEntry;
    use crate::frame::{EXC_RETURN_THREAD_PSP, INITIAL_XPSR};

    fn counter_a() -> ! {
        loop {
            core::hint::black_box(10);
        }
    }

    fn counter_b() -> ! {
        loop {
            core::hint::black_box(20);
        }
    }

    fn counter_c() -> ! {
        loop {
            core::hint::black_box(30);
        }
    }

    const ENTRIES: [ThreadEntry; 3] = [counter_a, counter_b, counter_c];

    /// The placeholder R4 value from a fresh frame
    const R4_START: u32 = 0x0404_0404;

    #[test]
    fn fresh_thread_resumes_at_entry() {
        let scheduler = leak_scheduler(3);
        scheduler.build_thread_set(&SimPort::new(), &ENTRIES).unwrap();
        let mut cpu = SimCpu::new(scheduler);
        cpu.pend_sv();
        assert_eq!(cpu.regs.pc, counter_a as usize as u32);
        assert_eq!(cpu.regs.xpsr, INITIAL_XPSR);
        assert_eq!(cpu.regs.exc_return, EXC_RETURN_THREAD_PSP);
        assert_eq!(cpu.regs.r[4], R4_START);

        // The other two come up fresh as well, through the same path
        cpu.pend_sv();
        assert_eq!(cpu.regs.pc, counter_b as usize as u32);
        cpu.pend_sv();
        assert_eq!(cpu.regs.pc, counter_c as usize as u32);
        assert_eq!(cpu.regs.xpsr, INITIAL_XPSR);
    }

    #[test]
    fn context_survives_a_round_trip() {
        let scheduler = leak_scheduler(2);
        scheduler
            .build_thread_set(&SimPort::new(), &ENTRIES[..2])
            .unwrap();
        let mut cpu = SimCpu::new(scheduler);
        cpu.pend_sv();
        // Thread 0 does some work
        for (idx, reg) in cpu.regs.r.iter_mut().enumerate() {
            *reg = 0xA000_0000 + idx as u32;
        }
        cpu.regs.pc = cpu.regs.pc.wrapping_add(0x40);
        let before = cpu.regs.clone();

        cpu.pend_sv();
        assert_eq!(cpu.running(), ThreadId::new(1));
        assert_ne!(cpu.regs, before);

        cpu.pend_sv();
        assert_eq!(cpu.running(), ThreadId::new(0));
        assert_eq!(cpu.regs, before);
    }

    #[test]
    fn three_counters_share_equally() {
        const TICKS: u32 = 300;

        let scheduler = leak_scheduler(3);
        let mut port = SimPort::new();
        scheduler.build_thread_set(&port, &ENTRIES).unwrap();
        let slice = TimeSlice::new(1000).unwrap();
        port.arm_tick(slice);

        let mut cpu = SimCpu::new(scheduler);
        cpu.pend_sv();
        for _ in 0..TICKS {
            // Each thread bumps a private counter, kept in R4, once per cycle
            for _ in 0..slice.cycles() {
                cpu.regs.r[4] += 1;
            }
            scheduler.tick(&port);
            cpu.pend_sv();
        }
        assert_eq!(port.switch_requests(), TICKS as usize);
        assert_eq!(scheduler.now(), TICKS);

        // Put the running thread away so every count is in its frame
        let running = cpu.running();
        let mut counts = [0u32; 3];
        for (idx, count) in counts.iter_mut().enumerate() {
            let r4 = if ThreadId::new(idx) == running {
                cpu.regs.r[4]
            } else {
                unsafe { scheduler.thread(ThreadId::new(idx)).unwrap().saved_sp().read() }
            };
            *count = r4 - R4_START;
        }

        let total: u32 = counts.iter().sum();
        assert_eq!(total, TICKS * slice.cycles());
        for count in counts {
            let third = total / 3;
            assert!(count.abs_diff(third) <= slice.cycles(), "{:?}", counts);
        }
        for idx in 0..3 {
            assert!(!scheduler.stack_overflowed(ThreadId::new(idx)));
        }
    }

    #[test]
    fn window_runs_each_thread_once() {
        let scheduler = leak_scheduler(3);
        scheduler.build_thread_set(&SimPort::new(), &ENTRIES).unwrap();
        let mut cpu = SimCpu::new(scheduler);
        cpu.pend_sv();
        // Skip a few ticks so the window does not start at thread 0
        cpu.pend_sv();
        cpu.pend_sv();
        cpu.pend_sv();
        cpu.pend_sv();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(cpu.running().index());
            cpu.pend_sv();
        }
        assert_eq!(seen, [1, 2, 0]);
    }

    #[test]
    fn overflow_is_noticed() {
        let scheduler = leak_scheduler(3);
        scheduler.build_thread_set(&SimPort::new(), &ENTRIES).unwrap();
        let victim = scheduler.thread(ThreadId::new(2)).unwrap();
        unsafe { victim.stack().base().write_volatile(0x5555_5555) };
        assert!(scheduler.stack_overflowed(ThreadId::new(2)));
        assert!(!scheduler.stack_overflowed(ThreadId::new(0)));
    }
}

// End of File

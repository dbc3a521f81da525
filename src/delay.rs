//! Busy-wait delays
//!
//! Threads never block, so the only way for one to wait is to spin. These
//! burn the calling thread's own time slices; the other threads keep
//! running in between.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Scheduler;
use crate::port::OneShotTimer;

/// Spin for `cycles` core clock cycles
///
/// Requests of zero or one cycle return at once, without touching the timer.
pub fn busy_wait<T: OneShotTimer + ?Sized>(timer: &mut T, cycles: u32) {
    if cycles <= 1 {
        return;
    }
    timer.start(cycles - 1);
    while !timer.expired() {
        core::hint::spin_loop();
    }
}

/// Spin for `ms` milliseconds, given the core clock frequency
pub fn busy_wait_ms<T: OneShotTimer + ?Sized>(timer: &mut T, clock_hz: u32, ms: u32) {
    for _ in 0..ms {
        busy_wait(timer, clock_hz / 1000);
    }
}

/// Spin until at least `ticks` scheduler ticks have passed
///
/// Returns at once if no scheduler is running, as the tick count would
/// never move.
pub fn sleep_ticks(ticks: u32) {
    sleep_ticks_on(Scheduler::get_scheduler(), ticks);
}

/// Spin until `scheduler` has counted at least `ticks` more ticks
fn sleep_ticks_on(scheduler: Option<&Scheduler>, ticks: u32) {
    let Some(scheduler) = scheduler else {
        return;
    };
    let start = scheduler.now();
    while scheduler.now().wrapping_sub(start) < ticks {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts down one step each time it is polled
    #[derive(Default)]
    struct FakeTimer {
        starts: Vec<u32>,
        remaining: core::cell::Cell<u32>,
        polls: core::cell::Cell<u32>,
    }

    impl OneShotTimer for FakeTimer {
        fn start(&mut self, reload: u32) {
            self.starts.push(reload);
            self.remaining.set(reload);
        }

        fn expired(&self) -> bool {
            self.polls.set(self.polls.get() + 1);
            let left = self.remaining.get();
            self.remaining.set(left.saturating_sub(1));
            left == 0
        }
    }

    #[test]
    fn tiny_waits_leave_timer_alone() {
        let mut timer = FakeTimer::default();
        busy_wait(&mut timer, 0);
        busy_wait(&mut timer, 1);
        assert!(timer.starts.is_empty());
        assert_eq!(timer.polls.get(), 0);
    }

    #[test]
    fn wait_loads_one_less_than_requested() {
        let mut timer = FakeTimer::default();
        busy_wait(&mut timer, 100);
        assert_eq!(timer.starts, [99]);
        assert_eq!(timer.polls.get(), 100);
    }

    #[test]
    fn millisecond_waits_repeat() {
        let mut timer = FakeTimer::default();
        busy_wait_ms(&mut timer, 8_000_000, 3);
        assert_eq!(timer.starts, [7999, 7999, 7999]);
    }

    #[test]
    fn zero_ticks_is_immediate() {
        sleep_ticks(0);
    }

    #[test]
    fn no_scheduler_means_no_wait() {
        sleep_ticks_on(None, 1_000_000);
    }

    #[test]
    fn sleep_waits_for_enough_ticks() {
        use core::sync::atomic::{AtomicBool, Ordering};

        let scheduler = crate::sim::leak_scheduler(1);
        let stop = AtomicBool::new(false);
        std::thread::scope(|s| {
            // Plays the part of the SysTick interrupt
            s.spawn(|| {
                let port = crate::sim::SimPort::new();
                while !stop.load(Ordering::Relaxed) {
                    scheduler.tick(&port);
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
            });
            let start = scheduler.now();
            sleep_ticks_on(Some(scheduler), 5);
            let waited = scheduler.now().wrapping_sub(start);
            stop.store(true, Ordering::Relaxed);
            assert!(waited >= 5, "woke after {} ticks", waited);
        });
    }
}

// End of File

//! Contains the [`Scheduler`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, AtomicU32, AtomicUsize, Ordering};

use crate::critical::{self, CriticalSection};
use crate::{Error, Port, ThreadEntry, ThreadId, ThreadRecord, TimeSlice, frame};

/// The location of our one and only launched [`Scheduler`] object.
///
/// We need this so that the free-standing SysTick and PendSV handlers know
/// where all our system state is.
pub(crate) static SCHEDULER_PTR: AtomicPtr<Scheduler> = AtomicPtr::new(core::ptr::null_mut());

/// Where the scheduler is in its life
///
/// There is no way back from `Running`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[repr(u8)]
pub enum Lifecycle {
    /// The thread set can be built (or rebuilt); nothing is running yet
    Preparing = 0,
    /// The threads own the processor, forever
    Running = 1,
}

/// A pre-emptive thread-switching scheduler
///
/// It time slices threads in a round-robin fashion, whether or not they have
/// work to do. The thread table is fixed when the scheduler is declared, so
/// the number of threads is a build-time constant.
///
/// The Arm hardware will push {xPSR, PC, LR, R12, R3, R2, R1, R0} to PSP when
/// an exception occurs. PendSV then pushes the rest (R11 to R4, and
/// EXC_RETURN).
pub struct Scheduler {
    /// A fixed, static list of all our threads
    thread_list: &'static [ThreadRecord],
    /// Which thread is currently running
    current_thread: AtomicUsize,
    /// Current tick count
    ticks: AtomicU32,
    /// Has the thread set been built?
    built: AtomicBool,
    /// A [`Lifecycle`] value
    lifecycle: AtomicU8,
}

impl Scheduler {
    /// Build the scheduler
    pub const fn new(thread_list: &'static [ThreadRecord]) -> Scheduler {
        // Cannot schedule without at least one thread
        assert!(!thread_list.is_empty());
        Scheduler {
            thread_list,
            current_thread: AtomicUsize::new(0),
            ticks: AtomicU32::new(0),
            built: AtomicBool::new(false),
            lifecycle: AtomicU8::new(Lifecycle::Preparing as u8),
        }
    }

    /// Bind one entry point to each thread record, and link them into a cycle
    ///
    /// Thread `i` is followed by thread `i + 1`, and the last thread by the
    /// first. Each thread gets an initial stack frame that starts it at its
    /// entry point, and thread 0 becomes the current thread.
    ///
    /// The whole table is built with interrupts masked, so the tick never
    /// sees it half-finished. Nothing is written if the number of entry
    /// points does not match the thread table.
    pub fn build_thread_set<P: Port + ?Sized>(
        &self,
        port: &P,
        entries: &[ThreadEntry],
    ) -> Result<(), Error> {
        if self.lifecycle() == Lifecycle::Running {
            return Err(Error::AlreadyRunning);
        }
        let num_threads = self.thread_list.len();
        if entries.len() != num_threads {
            warn!(
                "Got {=usize} entry points for {=usize} threads",
                entries.len(),
                num_threads
            );
            return Err(Error::CapacityMismatch {
                expected: num_threads,
                found: entries.len(),
            });
        }
        self.check_stacks_disjoint()?;

        critical::free(port, |_cs| {
            for (thread_idx, (thread, entry)) in self.thread_list.iter().zip(entries).enumerate() {
                thread.link(
                    ThreadId::new(thread_idx),
                    ThreadId::new((thread_idx + 1) % num_threads),
                );

                // SAFETY: nothing is running, each region belongs to this one
                // record, and `Stack` does not let us make stacks too small
                // for a frame.
                unsafe {
                    thread.stack().plant_sentinel();
                    let sp = frame::build_initial_frame(thread.stack(), *entry);
                    thread.set_saved_sp(sp);
                }

                debug!(
                    "Init thread frame {=usize}, with stack @ 0x{=usize:08x}",
                    thread_idx,
                    thread.saved_sp() as usize
                );
            }
            self.current_thread.store(0, Ordering::Relaxed);
            self.built.store(true, Ordering::Release);
        });

        Ok(())
    }

    /// Run the scheduler
    ///
    /// Arms the tick and dispatches thread 0. You may only call this once, and
    /// you should call it from `fn main()` once all your hardware is
    /// configured. We should be in Privileged Thread mode on the Main stack.
    ///
    /// This only returns if the scheduler cannot start.
    pub fn launch<P: Port>(&'static self, mut port: P, slice: TimeSlice) -> Result<Infallible, Error> {
        self.start(&mut port, slice)?;
        port.first_dispatch()
    }

    /// Everything [`Scheduler::launch`] does, short of dispatching the first thread
    ///
    /// On success interrupts are left masked, and only
    /// [`Port::first_dispatch`] unmasks them. A tick taken before then would
    /// try to save a thread that never ran. On failure the interrupt state is
    /// put back as it was.
    pub(crate) fn start<P: Port>(&'static self, port: &mut P, slice: TimeSlice) -> Result<(), Error> {
        if !self.built.load(Ordering::Acquire) {
            return Err(Error::NotBuilt);
        }

        // remember where this object is - it cannot move because it is 'static
        let self_addr = self as *const Scheduler as *mut Scheduler;
        let cs = CriticalSection::enter(&*port);
        if !SCHEDULER_PTR.load(Ordering::Relaxed).is_null() {
            return Err(Error::AlreadyRunning);
        }
        SCHEDULER_PTR.store(self_addr, Ordering::Release);
        self.lifecycle
            .store(Lifecycle::Running as u8, Ordering::Relaxed);
        // Stay masked until the first dispatch
        core::mem::forget(cs);
        info!("Scheduler @ {=usize:08x}", self_addr as usize);

        // Must do this /after/ setting SCHEDULER_PTR because the SysTick
        // exception handler will use SCHEDULER_PTR
        port.arm_tick(slice);
        info!(
            "Running {=usize} threads, {=u32} cycles each",
            self.thread_list.len(),
            slice.cycles()
        );
        Ok(())
    }

    /// Call once per time slice, to get the scheduler to move on to the next thread
    ///
    /// Call this from the SysTick handler. The switch itself happens in
    /// PendSV, once every other interrupt has finished.
    pub fn tick<P: Port + ?Sized>(&self, port: &P) {
        trace!("Tick!");

        #[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
        self.ticks.fetch_add(1, Ordering::Relaxed);

        #[cfg(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))]
        critical::free(port, |_cs| {
            self.ticks.store(
                self.ticks.load(Ordering::Relaxed).wrapping_add(1),
                Ordering::Relaxed,
            );
        });

        port.request_switch();
    }

    /// Save the running thread, advance, and hand back the next thread's frame
    ///
    /// `saved_sp` is where the context switch code stacked the running
    /// thread's registers. A null `saved_sp` means no thread has run yet, so
    /// nothing is saved and the current thread (thread 0) is dispatched.
    ///
    /// Must be called with interrupts masked, or from an exception handler
    /// that nothing else touching the scheduler can pre-empt.
    ///
    /// # Safety
    ///
    /// A non-null `saved_sp` must point to a complete saved frame on the
    /// current thread's stack.
    pub(crate) unsafe fn switch_context(&self, saved_sp: *mut u32) -> *mut u32 {
        if !saved_sp.is_null() {
            let current = &self.thread_list[self.current_thread.load(Ordering::Relaxed)];
            // SAFETY: passed on from our caller
            unsafe {
                current.set_saved_sp(saved_sp);
            }
            self.advance();
        }
        self.thread_list[self.current_thread.load(Ordering::Relaxed)].saved_sp()
    }

    /// Move on to the next thread in the cycle
    ///
    /// There is no readiness check and no priority - the next thread always
    /// runs.
    fn advance(&self) {
        let current = self.current_thread.load(Ordering::Relaxed);
        let next = self.thread_list[current].next();
        self.current_thread.store(next.index(), Ordering::Relaxed);
    }

    /// Which thread runs after the given one?
    ///
    /// Gives `None` for an ID that is not in this scheduler's table.
    pub fn successor(&self, thread_id: ThreadId) -> Option<ThreadId> {
        self.thread(thread_id).map(ThreadRecord::next)
    }

    /// Get current tick count
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Get the current Thread ID
    pub fn current_thread_id(&self) -> ThreadId {
        ThreadId::new(self.current_thread.load(Ordering::Relaxed))
    }

    /// How many threads this scheduler runs
    pub fn thread_count(&self) -> usize {
        self.thread_list.len()
    }

    /// The IDs of every thread, in table order
    pub fn thread_ids(&self) -> impl Iterator<Item = ThreadId> + use<> {
        (0..self.thread_list.len()).map(ThreadId::new)
    }

    /// Get the record for a thread, if the ID is in this scheduler's table
    pub fn thread(&self, thread_id: ThreadId) -> Option<&ThreadRecord> {
        self.thread_list.get(thread_id.index())
    }

    /// Where is the scheduler in its life?
    pub fn lifecycle(&self) -> Lifecycle {
        match self.lifecycle.load(Ordering::Relaxed) {
            0 => Lifecycle::Preparing,
            _ => Lifecycle::Running,
        }
    }

    /// Has this thread written below the bottom of its stack?
    ///
    /// Only meaningful once the thread set is built. A thread can of course
    /// overflow without touching the lowest word, so this can miss things.
    /// An ID that is not in the table has no stack, so never overflowed.
    pub fn stack_overflowed(&self, thread_id: ThreadId) -> bool {
        self.thread(thread_id)
            .is_some_and(|thread| !thread.stack().sentinel_intact())
    }

    /// Get the handler to the global scheduler
    pub(crate) fn get_scheduler() -> Option<&'static Scheduler> {
        // Get our stashed pointer
        let scheduler_ptr = SCHEDULER_PTR.load(Ordering::Acquire);
        // Are we intialised?
        if scheduler_ptr.is_null() {
            None
        } else {
            // SAFETY: Only [`Scheduler::start`] writes to [`SCHEDULER_PTR`] and it
            // always sets it to be a valid pointer to a `'static` [`Scheduler`].
            Some(unsafe { &*scheduler_ptr })
        }
    }

    /// Make sure no two threads were given the same stack memory
    fn check_stacks_disjoint(&self) -> Result<(), Error> {
        for (first, a) in self.thread_list.iter().enumerate() {
            for (offset, b) in self.thread_list[first + 1..].iter().enumerate() {
                if a.stack().overlaps(b.stack()) {
                    return Err(Error::StackAliased {
                        first,
                        second: first + 1 + offset,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Called by the PendSV handler to swap threads
///
/// Takes the stack pointer of the interrupted thread (or zero on the first
/// dispatch) and returns the stack pointer of the thread to resume.
///
/// # Safety
///
/// Only the PendSV handler may call this.
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub(crate) unsafe extern "C" fn switch_context(saved_sp: *mut u32) -> *mut u32 {
    let Some(scheduler) = Scheduler::get_scheduler() else {
        panic!("Context switch with no scheduler running!");
    };
    // SAFETY: PendSV stacked a full frame at `saved_sp`, unless it is null
    unsafe { scheduler.switch_context(saved_sp) }
}


// End of File

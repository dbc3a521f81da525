//! Builds the saved context of a thread that has never run
//!
//! A fresh thread is dispatched by the same PendSV restore path as a thread
//! that was pre-empted, so its stack must look exactly as if it had been
//! interrupted just before executing its first instruction.
//!
//! ## Frame layout (frame base = lowest address, stack grows down)
//!
//! ```text
//! [Hardware stacked frame]   <- popped by exception return
//!   xPSR  (Thumb bit set)      word 16
//!   PC    (thread entry)       word 15
//!   LR    (thread_returned)    word 14
//!   R12                        word 13
//!   R3                         word 12
//!   R2                         word 11
//!   R1                         word 10
//!   R0                         word 9
//! [Software saved context]   <- popped by PendSV
//!   EXC_RETURN                 word 8
//!   R11                        word 7
//!   ...
//!   R4                         word 0  <- saved stack pointer
//! ```
//!
//! On the eabihf targets, PendSV also saves S16-S31 between the two parts
//! when the thread used the FPU. A fresh frame never has FPU state, which
//! `EXC_RETURN` records.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::config::FRAME_WORDS;
use crate::{StackPusher, StackRegion, ThreadEntry};

/// The value of the Processor Status Register when a thread starts
///
/// The only bit we need to set is the T bit, to indicate that the thread
/// should run in Thumb mode (the only supported mode on M-profile)
pub const INITIAL_XPSR: u32 = 1 << 24;

/// Return to Thread Mode, on the Process Stack, with no FPU state
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Word offsets of each register within a saved frame
pub mod offset {
    /// R4 is the lowest word; R5 to R11 follow it
    pub const R4: usize = 0;
    /// R11, the last of the software saved registers
    pub const R11: usize = 7;
    /// The EXC_RETURN value PendSV will `bx` to
    pub const EXC_RETURN: usize = 8;
    /// R0, the start of the hardware frame
    pub const R0: usize = 9;
    /// R12
    pub const R12: usize = 13;
    /// Link register
    pub const LR: usize = 14;
    /// Resume address
    pub const PC: usize = 15;
    /// Program status register
    pub const XPSR: usize = 16;
}

/// Write the initial context for `entry` at the top of `region`
///
/// Returns the frame base, which is the value the thread's saved stack
/// pointer must hold. The general purpose registers get placeholder values
/// (R4 holds 0x04040404 and so on) so a debugger can tell them apart.
///
/// # Safety
///
/// The region must belong to a thread that is not running, and must have
/// room for [`FRAME_WORDS`] words. A [`Stack`](crate::Stack) always does.
pub unsafe fn build_initial_frame(region: &StackRegion, entry: ThreadEntry) -> *mut u32 {
    // SAFETY: the caller promised us at least a frame's worth of stack
    let mut stack_pusher = unsafe { StackPusher::new(region.top()) };

    // Standard Arm exception frame

    // xPSR
    stack_pusher.push(INITIAL_XPSR);
    // PC
    stack_pusher.push(entry as usize as u32);
    // LR - only used if the thread returns, which it must not
    stack_pusher.push(thread_returned as usize as u32);
    // R12
    stack_pusher.push(0x1212_1212);
    // R3 - R0
    stack_pusher.push(0x0303_0303);
    stack_pusher.push(0x0202_0202);
    stack_pusher.push(0x0101_0101);
    stack_pusher.push(0x0000_0000);

    // Additional thread state we persist

    // Extra copy of LR so PendSV knows how to return. This copy does not
    // have the FPU bit set, so we don't need to push an Extended Frame
    // above.
    stack_pusher.push(EXC_RETURN_THREAD_PSP);

    // R11 - R4
    for reg in (4..=11u32).rev() {
        stack_pusher.push(placeholder(reg));
    }

    debug_assert_eq!(stack_pusher.pushed(), FRAME_WORDS);
    stack_pusher.current()
}

/// The placeholder value for a general purpose register
///
/// Each byte holds the register number in binary coded decimal, so R11 is
/// 0x11111111.
const fn placeholder(reg: u32) -> u32 {
    let bcd = ((reg / 10) << 4) | (reg % 10);
    bcd * 0x0101_0101
}

/// Where a thread ends up if it returns from its entry point
///
/// [`ThreadEntry`] cannot return, so getting here means something has gone
/// badly wrong.
extern "C" fn thread_returned() -> ! {
    panic!("Thread returned from its entry point");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Stack;

    fn entry() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn build() -> (*mut u32, StackRegion) {
        let stack: &'static Stack<256> = Box::leak(Box::new(Stack::new()));
        let region = stack.region();
        let sp = unsafe { build_initial_frame(&region, entry) };
        (sp, region)
    }

    fn word(sp: *mut u32, idx: usize) -> u32 {
        unsafe { sp.add(idx).read() }
    }

    #[test]
    fn frame_sits_at_top_of_stack() {
        let (sp, region) = build();
        assert_eq!(unsafe { sp.add(FRAME_WORDS) }, region.top());
        // The hardware frame must be 8-byte aligned for exception return
        assert_eq!(unsafe { sp.add(offset::R0) } as usize % 8, 0);
    }

    #[test]
    fn frame_resumes_at_entry() {
        let (sp, _region) = build();
        assert_eq!(word(sp, offset::PC), entry as usize as u32);
        assert_eq!(word(sp, offset::XPSR), INITIAL_XPSR);
        assert_eq!(word(sp, offset::EXC_RETURN), EXC_RETURN_THREAD_PSP);
        assert_eq!(word(sp, offset::LR), thread_returned as usize as u32);
    }

    #[test]
    fn placeholders_in_register_order() {
        let (sp, _region) = build();
        assert_eq!(word(sp, offset::R4), 0x0404_0404);
        assert_eq!(word(sp, offset::R4 + 5), 0x0909_0909);
        assert_eq!(word(sp, offset::R11), 0x1111_1111);
        assert_eq!(word(sp, offset::R0), 0);
        assert_eq!(word(sp, offset::R0 + 3), 0x0303_0303);
        assert_eq!(word(sp, offset::R12), 0x1212_1212);
    }
}

// End of File

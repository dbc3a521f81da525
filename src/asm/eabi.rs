//! Armv7-M EABI code

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::scheduler;

/// PendSV Handler for Armv7-M or Armv8-M Mainline EABI
///
/// This is the thread switch code. It is called by hardware when the PendSV
/// bit is set and all other interrupts have finished.
///
/// On entry, we will find that xPSR, PC, LR, R12, R3, R2, R1 and R0 will
/// have been pushed onto the PSP. We thus push the remaining registers (which
/// are as the running thread left them), and hand the resulting stack
/// pointer to the scheduler. It gives us back the stack pointer of the next
/// thread, which we unstack. Exiting from this function will cause the
/// hardware to restore the rest from the new thread's PSP, and so the new
/// thread will resume.
///
/// Before the first dispatch PSP is zero, and there is nothing to save.
///
/// It is a naked function because we do not want the compiler pushing
/// anything else to the stack and re-using registers containing precious
/// thread state.
#[unsafe(no_mangle)]
#[unsafe(naked)]
unsafe extern "C" fn PendSV() {
    // NOTE: This code must NOT touch r4-r11 until they are saved. It can ONLY
    // touch r0-r3 and r12, because those registers were stacked by the
    // hardware on exception entry.

    core::arch::naked_asm!(r#"
    // r0 = the interrupted thread's stack pointer
    mrs     r0, psp

    // if PSP is zero, no thread has run yet, so skip the stacking
    cbz     r0, 1f

    // Push the additional state into stack at r0
    stmdb   r0!, {{ r4 - r11, lr }}

    1:

    // r0 = the next thread's stack pointer. The scheduler state must not
    // change under our feet while we do this.
    cpsid   i
    bl      {switch_context}
    cpsie   i

    // Pop the additional state from it
    ldmia   r0!, {{ r4 - r11, lr }}

    // Set the current thread stack pointer
    msr     psp, r0

    //
    // return to the thread
    //

    bx      lr
    "#,
    switch_context = sym scheduler::switch_context,
    );
}

// End of File

//! Armv6-M EABI code

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::scheduler;

/// PendSV Handler for Armv6-M or Armv8-M Baseline EABI
///
/// This is the thread switch code. It is called by hardware when the PendSV
/// bit is set and all other interrupts have finished. It uses only the
/// Armv6-M subset instructions, so there is no `stmdb` and no `cbz`, and the
/// high registers have to go via the low ones.
///
/// On entry, we will find that xPSR, PC, LR, R12, R3, R2, R1 and R0 will
/// have been pushed onto the PSP. We thus store the remaining registers
/// (which are as the running thread left them) below it, in the same order
/// the Armv7-M `stmdb` would, and hand the resulting stack pointer to the
/// scheduler. It gives us back the stack pointer of the next thread, which
/// we unstack. Exiting from this function will cause the hardware to restore
/// the rest from the new thread's PSP, and so the new thread will resume.
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
    cmp     r0, #0
    beq     1f

    // Make room for nine words: r4 - r11, then lr
    subs    r0, #36

    // Words 0 - 3 are r4 - r7
    stmia   r0!, {{ r4 - r7 }}

    // Words 4 - 7 are r8 - r11
    mov     r4, r8
    mov     r5, r9
    mov     r6, r10
    mov     r7, r11
    stmia   r0!, {{ r4 - r7 }}

    // Word 8 is lr
    mov     r1, lr
    str     r1, [r0]

    // r0 = the bottom of the frame again
    subs    r0, #32

    1:

    // r0 = the next thread's stack pointer. The scheduler state must not
    // change under our feet while we do this.
    cpsid   i
    bl      {switch_context}
    cpsie   i

    // Words 4 - 7 go back into r8 - r11
    adds    r0, #16
    ldmia   r0!, {{ r4 - r7 }}
    mov     r8, r4
    mov     r9, r5
    mov     r10, r6
    mov     r11, r7

    // Word 8 goes back into lr
    ldmia   r0!, {{ r1 }}
    mov     lr, r1

    // Set the current thread stack pointer, just above the frame
    msr     psp, r0

    // Words 0 - 3 go back into r4 - r7
    subs    r0, #36
    ldmia   r0!, {{ r4 - r7 }}

    //
    // return to the thread
    //

    bx      lr
    "#,
    switch_context = sym scheduler::switch_context,
    );
}

// End of File

//! Build-time constants and the [`TimeSlice`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Error;

/// The largest value the SysTick reload register can hold
pub const MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Written to the lowest word of every thread stack
///
/// If it changes, the thread has run off the bottom of its stack.
pub const STACK_SENTINEL: u32 = 0xDEAD_C0DE;

/// Number of 32-bit words in a saved thread context
///
/// Nine pushed by PendSV (R4-R11 and EXC_RETURN) plus eight pushed by the
/// hardware on exception entry.
pub const FRAME_WORDS: usize = 17;

/// This is the minimum stack we can support, because of the state we need to push
///
/// Make space for a saved context and the sentinel word, plus some headroom
#[cfg(not(arm_abi = "eabihf"))]
pub const MIN_STACK_SIZE: usize = (4 * (FRAME_WORDS + 1)) + 8;

/// This is the minimum stack we can support, because of the state we need to push
///
/// Make space for a saved context, sixteen low and sixteen high FPU
/// registers, the FPU status register and its padding word, the sentinel
/// word, plus some headroom
#[cfg(arm_abi = "eabihf")]
pub const MIN_STACK_SIZE: usize = (4 * (FRAME_WORDS + 34 + 1)) + 8;

/// How many core clock cycles each thread runs before it is pre-empted
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct TimeSlice(u32);

impl TimeSlice {
    /// Shortest slice the tick timer can produce
    pub const MIN_CYCLES: u32 = 2;

    /// Longest slice the tick timer can produce
    pub const MAX_CYCLES: u32 = MAX_RELOAD + 1;

    /// Make a time slice from a number of core clock cycles
    ///
    /// Values which do not fit the 24-bit reload register are refused rather
    /// than truncated.
    pub const fn new(cycles: u32) -> Result<TimeSlice, Error> {
        if cycles < Self::MIN_CYCLES || cycles > Self::MAX_CYCLES {
            Err(Error::TimeSliceOutOfRange(cycles))
        } else {
            Ok(TimeSlice(cycles))
        }
    }

    /// Length of the slice in core clock cycles
    pub const fn cycles(self) -> u32 {
        self.0
    }

    /// The value to program into a down-counter that wraps through zero
    pub const fn reload(self) -> u32 {
        self.0 - 1
    }
}


// End of File

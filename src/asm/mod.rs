//! Appropriate assembly language routines for the architecture
//!
//! Each variant saves the interrupted thread below its PSP, calls
//! [`switch_context`](crate::scheduler::switch_context) to pick the next
//! thread, and restores that thread from the frame it gets back. The word
//! order must match [`crate::frame`] exactly.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(all(
    arm_abi = "eabi",
    any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")
))]
mod eabi_v6;

#[cfg(all(
    arm_abi = "eabi",
    not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))
))]
mod eabi;

#[cfg(arm_abi = "eabihf")]
mod eabihf;

// End of File

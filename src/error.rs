//! Holds the [`Error`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// The ways building or launching the scheduler can fail
///
/// Everything else (a thread overrunning its stack, a thread returning) is
/// undetected or fatal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Error {
    /// The number of entry points does not match the thread table
    CapacityMismatch {
        /// Number of records in the thread table
        expected: usize,
        /// Number of entry points supplied
        found: usize,
    },
    /// Two thread records were given overlapping stacks
    StackAliased {
        /// The first record
        first: usize,
        /// The record whose stack overlaps the first one's
        second: usize,
    },
    /// Tried to launch before the thread set was built
    NotBuilt,
    /// A scheduler is already running on this device
    AlreadyRunning,
    /// The time slice does not fit the 24-bit tick reload register
    TimeSliceOutOfRange(u32),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::CapacityMismatch { expected, found } => {
                write!(fmt, "expected {} entry points, got {}", expected, found)
            }
            Error::StackAliased { first, second } => {
                write!(fmt, "threads {} and {} share stack memory", first, second)
            }
            Error::NotBuilt => write!(fmt, "thread set has not been built"),
            Error::AlreadyRunning => write!(fmt, "scheduler is already running"),
            Error::TimeSliceOutOfRange(cycles) => {
                write!(fmt, "time slice of {} cycles is out of range", cycles)
            }
        }
    }
}

impl core::error::Error for Error {}

// End of File

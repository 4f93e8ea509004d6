/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Simulated time.
//!
//! The engine's clock only ever jumps to event timestamps, so time is a
//! plain `f64` count of simulated time units.  [`SimTime`] wraps it with a
//! total order (`f64::total_cmp`) so it can key a `BinaryHeap` directly.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A point on the simulated timeline, in simulated time units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    /// The start of every run.
    pub const ZERO: SimTime = SimTime(0.0);

    #[inline]
    pub fn new(t: f64) -> Self {
        SimTime(t)
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// The instant `delta` time units after `self`.
    #[inline]
    pub fn plus(self, delta: f64) -> SimTime {
        SimTime(self.0 + delta)
    }

    /// Elapsed time from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}

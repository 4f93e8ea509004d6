/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Event queue entries.
//!
//! `BinaryHeap` is a max-heap, so [`Event`] reverses its ordering: the heap
//! top is the event with the smallest [`EventKey`].

use std::cmp::Ordering;

use serde::Serialize;

use crate::message::{InstanceId, Qos};
use crate::time::SimTime;

/// Total order of queued events.
///
/// `(time, rank, deadline, seq)`: same-instant events run HIGH class
/// first, then earliest absolute deadline, then insertion order.  `seq`
/// is unique per run, so no two keys compare equal.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventKey {
    pub time: SimTime,
    pub rank: u8,
    pub deadline: SimTime,
    pub seq: u64,
}

impl EventKey {
    pub fn new(time: SimTime, qos: Qos, deadline: SimTime, seq: u64) -> Self {
        Self {
            time,
            rank: qos.priority.rank(),
            deadline,
            seq,
        }
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.rank.cmp(&other.rank))
            .then(self.deadline.cmp(&other.deadline))
            .then(self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Source `source` (index into the scenario's source list) fires.
    Emit { source: usize },
    /// `instance` has pushed its last byte onto the current link.  Only
    /// honoured while `generation` matches the instance's; every share
    /// change on the link reschedules it with a fresh generation.
    Transmitted { instance: InstanceId, generation: u64 },
    /// `instance` reached the next node on its path (or its destination).
    Arrive { instance: InstanceId },
    ServiceComplete { instance: InstanceId },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Emit { .. } => "EMIT",
            EventKind::Transmitted { .. } => "TRANSMITTED",
            EventKind::Arrive { .. } => "ARRIVE",
            EventKind::ServiceComplete { .. } => "SERVICE_COMPLETE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub key: EventKey,
    pub kind: EventKind,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key)
    }
}

/// One processed event, as recorded by the optional event trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub time: SimTime,
    pub seq: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Message templates, message instances and their QoS.
//!
//! Two types model the two sides of a message's life:
//!
//! ```text
//! Application ──(MessageTemplate)──► Engine EMIT ──► MessageInstance ──► Router / Node
//!                  ↑ immutable, shared               ↑ one per emission, carries QoS
//! ```
//!
//! The priority class and deadline are *not* part of the template: they come
//! from an externally supplied [`QosTable`] and are looked up by message name
//! when an instance is created.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::time::SimTime;
use crate::topology::NodeId;

// ── Priority ──────────────────────────────────────────────────────────────────

/// Ordinal priority class.
///
/// Variant order is service order: `High < Medium < Low`, so sorting
/// ascending puts the most urgent class first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Numeric rank used in event ordering keys (0 = most urgent).
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        };
        f.write_str(s)
    }
}

// ── QoS ───────────────────────────────────────────────────────────────────────

/// Priority class plus relative deadline (simulated time units, measured
/// from emission).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Qos {
    pub priority: Priority,
    pub deadline: f64,
}

impl Qos {
    /// Priority and deadline historically applied to unknown names.
    pub const LEGACY_DEFAULT: Qos = Qos {
        priority: Priority::Low,
        deadline: 999.0,
    };
}

/// Message name → [`Qos`], immutable during a run.
///
/// Without a fallback, [`get`](Self::get) returns `None` for unknown names
/// and scenario construction rejects messages that lack an entry.
#[derive(Debug, Clone, Default)]
pub struct QosTable {
    entries: BTreeMap<String, Qos>,
    fallback: Option<Qos>,
}

impl QosTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `qos` for any name without an explicit entry.
    pub fn with_fallback(mut self, qos: Qos) -> Self {
        self.fallback = Some(qos);
        self
    }

    pub fn insert(&mut self, message: impl Into<String>, qos: Qos) {
        self.entries.insert(message.into(), qos);
    }

    /// Explicit entry for `message`, else the fallback, else `None`.
    pub fn get(&self, message: &str) -> Option<Qos> {
        self.entries.get(message).copied().or(self.fallback)
    }

    pub fn fallback(&self) -> Option<Qos> {
        self.fallback
    }

    pub fn entries(&self) -> &BTreeMap<String, Qos> {
        &self.entries
    }
}

// ── MessageTemplate ───────────────────────────────────────────────────────────

/// A message type declared by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub name: String,
    /// Producing module (e.g. the sensor); not required to be a service.
    pub source: String,
    /// Consuming service; must exist in the same application.
    pub destination: String,
    /// Computational cost in instructions.
    pub instructions: u64,
    /// Payload size in bytes.
    pub bytes: u64,
}

impl MessageTemplate {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        instructions: u64,
        bytes: u64,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
            instructions,
            bytes,
        }
    }
}

// ── MessageInstance ───────────────────────────────────────────────────────────

/// Monotonic per-run instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new(raw: u64) -> Self {
        InstanceId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M#{}", self.0)
    }
}

/// One occurrence of a message on the simulated timeline.
#[derive(Debug, Clone)]
pub struct MessageInstance {
    pub id: InstanceId,
    pub template: Arc<MessageTemplate>,
    /// Node the emitting source sits on.
    pub source_node: NodeId,
    pub emitted_at: SimTime,
    pub qos: Qos,
    /// Set when the router projected an arrival past the deadline.
    pub deadline_missed: bool,
}

impl MessageInstance {
    pub fn new(
        id: InstanceId,
        template: Arc<MessageTemplate>,
        source_node: NodeId,
        emitted_at: SimTime,
        qos: Qos,
    ) -> Self {
        Self {
            id,
            template,
            source_node,
            emitted_at,
            qos,
            deadline_missed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Absolute instant by which the instance must complete.
    pub fn absolute_deadline(&self) -> SimTime {
        self.emitted_at.plus(self.qos.deadline)
    }

    /// Budget left at `now` (negative once the deadline has passed).
    pub fn remaining_budget(&self, now: SimTime) -> f64 {
        self.absolute_deadline().as_f64() - now.as_f64()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

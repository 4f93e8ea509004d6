/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Observability output: structured records and the sinks that receive them.
//!
//! The router and the engine never log results through a global; they are
//! handed a [`SharedSink`] at construction and push [`Record`]s into it.
//! `tracing` events are emitted alongside for humans, but the record stream
//! is the contract.
//!
//! The simulation is single-threaded, so the shared handle is
//! `Rc<RefCell<dyn RecordSink>>`.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use serde::Serialize;

use crate::message::{InstanceId, Priority};
use crate::offload::OffloadDecision;
use crate::time::SimTime;
use crate::topology::{NodeId, Path};

// ── Records ───────────────────────────────────────────────────────────────────

/// One routing decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingRecord {
    pub at: SimTime,
    pub instance: InstanceId,
    pub message: String,
    pub priority: Priority,
    pub deadline: f64,
    pub source: NodeId,
    pub destination: NodeId,
    pub path: Path,
    pub projected_latency: f64,
    pub projected_arrival: SimTime,
    pub deadline_missed: bool,
}

/// An instance that could not be routed and was dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub at: SimTime,
    pub instance: InstanceId,
    pub message: String,
    pub priority: Priority,
    pub deadline: f64,
    pub source: NodeId,
    pub reason: String,
    pub detail: String,
}

/// A local/remote verdict taken for an instance on arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffloadRecord {
    pub at: SimTime,
    pub instance: InstanceId,
    pub message: String,
    #[serde(flatten)]
    pub decision: OffloadDecision,
}

/// A finished instance with its achieved latency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRecord {
    pub instance: InstanceId,
    pub message: String,
    pub priority: Priority,
    pub deadline: f64,
    pub node: NodeId,
    /// Node the emitting source sits on.
    pub source: NodeId,
    pub emitted_at: SimTime,
    pub arrived_at: SimTime,
    pub started_at: SimTime,
    pub completed_at: SimTime,
    pub latency: f64,
    pub met: bool,
    /// The router already projected a late arrival (DEADLINE_MISSED).
    pub projected_miss: bool,
    pub offloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Routing(RoutingRecord),
    RoutingFailure(FailureRecord),
    Offload(OffloadRecord),
    Completion(CompletionRecord),
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

pub trait RecordSink {
    fn record(&mut self, record: &Record);
}

pub type SharedSink = Rc<RefCell<dyn RecordSink>>;

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn record(&mut self, _record: &Record) {}
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<Record>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn routing(&self) -> impl Iterator<Item = &RoutingRecord> + '_ {
        self.records.iter().filter_map(|r| match r {
            Record::Routing(r) => Some(r),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> + '_ {
        self.records.iter().filter_map(|r| match r {
            Record::RoutingFailure(r) => Some(r),
            _ => None,
        })
    }

    pub fn offloads(&self) -> impl Iterator<Item = &OffloadRecord> + '_ {
        self.records.iter().filter_map(|r| match r {
            Record::Offload(r) => Some(r),
            _ => None,
        })
    }

    pub fn completions(&self) -> impl Iterator<Item = &CompletionRecord> + '_ {
        self.records.iter().filter_map(|r| match r {
            Record::Completion(r) => Some(r),
            _ => None,
        })
    }
}

impl RecordSink for MemorySink {
    fn record(&mut self, record: &Record) {
        self.records.push(record.clone());
    }
}

/// Streams records as JSON, one object per line.
///
/// `record` cannot fail; the first serialisation or I/O error is kept and
/// every later record is skipped.  [`flush`](Self::flush) reports it.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
            written: 0,
        }
    }

    /// Records successfully written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush the writer, or return the first error seen while recording.
    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn record(&mut self, record: &Record) {
        if self.error.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        match result {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Aggregated run metrics.
//!
//! The engine feeds a [`Collector`] while it runs and turns it into a
//! [`RunMetrics`] snapshot at the end.  `RunMetrics` is `PartialEq` so two
//! runs of the same scenario can be compared directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::Priority;
use crate::topology::{NodeId, Topology};

/// Latency distribution of one priority class.
///
/// Percentiles use the nearest-rank method on the sorted samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl LatencySummary {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let rank = |p: f64| -> f64 {
            let idx = ((p / 100.0) * n as f64).ceil() as usize;
            sorted[idx.clamp(1, n) - 1]
        };

        Self {
            count: n as u64,
            min: sorted[0],
            max: sorted[n - 1],
            mean: sorted.iter().sum::<f64>() / n as f64,
            p50: rank(50.0),
            p90: rank(90.0),
            p99: rank(99.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub latency: LatencySummary,
    pub deadline_misses: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUtilization {
    /// Service time spent inside `[0, horizon]`.
    pub busy_time: f64,
    /// `busy_time / horizon`.
    pub utilization: f64,
    pub completed: u64,
    pub peak_memory: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub horizon: f64,
    pub events_processed: u64,
    pub emitted: u64,
    pub completed: u64,
    pub deadline_misses: u64,
    /// Emitted and routed, but not completed when the run stopped.
    pub in_flight_at_horizon: u64,
    /// Dropped instances by reason (`unplaced`, `no_path`).
    pub routing_failures: BTreeMap<String, u64>,
    pub offloaded: u64,
    pub per_priority: BTreeMap<Priority, ClassMetrics>,
    pub per_node: BTreeMap<NodeId, NodeUtilization>,
}

impl RunMetrics {
    pub fn routing_failure_total(&self) -> u64 {
        self.routing_failures.values().sum()
    }
}

// ── Collector ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct Collector {
    pub events_processed: u64,
    pub emitted: u64,
    pub offloaded: u64,
    routing_failures: BTreeMap<String, u64>,
    latencies: BTreeMap<Priority, Vec<f64>>,
    misses: BTreeMap<Priority, u64>,
}

impl Collector {
    pub fn routing_failure(&mut self, reason: &str) {
        *self.routing_failures.entry(reason.to_string()).or_default() += 1;
    }

    pub fn completion(&mut self, priority: Priority, latency: f64, met: bool) {
        self.latencies.entry(priority).or_default().push(latency);
        if !met {
            *self.misses.entry(priority).or_default() += 1;
        }
    }

    pub fn finish(self, horizon: f64, in_flight: u64, topology: &Topology) -> RunMetrics {
        let per_priority: BTreeMap<Priority, ClassMetrics> = self
            .latencies
            .iter()
            .map(|(&p, samples)| {
                let metrics = ClassMetrics {
                    latency: LatencySummary::from_samples(samples),
                    deadline_misses: self.misses.get(&p).copied().unwrap_or(0),
                };
                (p, metrics)
            })
            .collect();

        let per_node = topology
            .nodes()
            .map(|node| {
                let util = NodeUtilization {
                    busy_time: node.state.busy_time,
                    utilization: if horizon > 0.0 {
                        node.state.busy_time / horizon
                    } else {
                        0.0
                    },
                    completed: node.state.completed,
                    peak_memory: node.state.peak_memory,
                };
                (node.id, util)
            })
            .collect();

        RunMetrics {
            horizon,
            events_processed: self.events_processed,
            emitted: self.emitted,
            completed: per_priority.values().map(|c| c.latency.count).sum(),
            deadline_misses: self.misses.values().sum(),
            in_flight_at_horizon: in_flight,
            routing_failures: self.routing_failures,
            offloaded: self.offloaded,
            per_priority,
            per_node,
        }
    }
}

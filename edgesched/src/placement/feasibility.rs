/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Steady-state load analysis of a deployment.
//!
//! Each periodic source offers its destination's primary node a utilisation
//!
//! $$U = \frac{instructions / rate}{period}$$
//!
//! and a node's offered load is the sum over all sources landing on it.
//! A single FIFO server with `U > 1` cannot keep up: its queue, and every
//! latency measured behind it, grows for the whole run.
//!
//! The check is a **warning only**.  The engine still runs the scenario;
//! the per-instance deadline flags then show the consequence.

use std::collections::BTreeMap;

use crate::message::MessageTemplate;
use crate::topology::{NodeId, Topology};

/// Offered load above which a node is saturated.
pub const SATURATION_THRESHOLD: f64 = 1.0;

/// One periodic flow: a message type emitted every `period` time units.
#[derive(Debug, Clone, Copy)]
pub struct Flow<'a> {
    pub message: &'a MessageTemplate,
    pub period: f64,
}

/// Offered utilisation per primary node.
///
/// Flows with a non-positive period, an unplaced destination service or a
/// primary node unknown to `topology` contribute nothing.
pub fn offered_load(
    flows: &[Flow<'_>],
    allocations: &BTreeMap<String, Vec<NodeId>>,
    topology: &Topology,
) -> BTreeMap<NodeId, f64> {
    let mut load: BTreeMap<NodeId, f64> = BTreeMap::new();
    for flow in flows.iter().filter(|f| f.period > 0.0) {
        let Some(&primary) = allocations
            .get(&flow.message.destination)
            .and_then(|nodes| nodes.first())
        else {
            continue;
        };
        let Some(node) = topology.node(primary) else {
            continue;
        };
        *load.entry(primary).or_default() +=
            node.service_time(flow.message.instructions) / flow.period;
    }
    load
}

/// Nodes whose offered load exceeds [`SATURATION_THRESHOLD`], with the load.
pub fn saturated(load: &BTreeMap<NodeId, f64>) -> Vec<(NodeId, f64)> {
    load.iter()
        .filter(|&(_, &u)| u > SATURATION_THRESHOLD)
        .map(|(&id, &u)| (id, u))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

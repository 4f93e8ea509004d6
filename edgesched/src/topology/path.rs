/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Deterministic shortest-path search.
//!
//! Edge weight is `delay + (in_flight_bytes + bytes) / bandwidth`, i.e. the
//! projected latency of pushing the payload across that link right now.
//! Dijkstra runs over the lexicographic cost
//!
//! ```text
//! (total weight, hop count, sum of node ids on the path)
//! ```
//!
//! All three components are non-negative and additive, so the lexicographic
//! order is compatible with path extension and Dijkstra stays exact.  Any
//! remaining tie keeps the lowest-id predecessor.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use serde::{Deserialize, Serialize};

use super::{LinkKey, NodeId, Topology};
use crate::error::NoPathError;

// ── Path ──────────────────────────────────────────────────────────────────────

/// An ordered node sequence from source to destination.
///
/// A path of one node (`src == dst`) is a local delivery with no links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    nodes: Vec<NodeId>,
}

impl Path {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn source(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// The traversed links, in order.
    pub fn links(&self) -> impl Iterator<Item = LinkKey> + '_ {
        self.nodes.windows(2).map(|w| LinkKey::new(w[0], w[1]))
    }

    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_local(&self) -> bool {
        self.hops() == 0
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.nodes.iter().map(|n| n.to_string()).collect();
        write!(f, "[{}]", parts.join(" → "))
    }
}

// ── Cost ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Cost {
    weight: f64,
    hops: u32,
    id_sum: u64,
}

impl Cost {
    fn origin(node: NodeId) -> Self {
        Cost {
            weight: 0.0,
            hops: 0,
            id_sum: u64::from(node.raw()),
        }
    }

    fn extend(self, weight: f64, next: NodeId) -> Self {
        Cost {
            weight: self.weight + weight,
            hops: self.hops + 1,
            id_sum: self.id_sum + u64::from(next.raw()),
        }
    }

    fn cmp_key(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then(self.hops.cmp(&other.hops))
            .then(self.id_sum.cmp(&other.id_sum))
    }
}

/// Heap entry; reversed so `BinaryHeap` pops the cheapest node first.
struct Frontier {
    cost: Cost,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp_key(&self.cost)
            .then(other.node.cmp(&self.node))
    }
}

// ── Search ────────────────────────────────────────────────────────────────────

/// Cheapest path from `src` to `dst` for a payload of `bytes`.
///
/// # Errors
/// [`NoPathError`] if either endpoint is unknown or no chain of links
/// connects them.
pub fn shortest_path(
    topology: &Topology,
    src: NodeId,
    dst: NodeId,
    bytes: u64,
) -> Result<Path, NoPathError> {
    if !topology.contains(src) || !topology.contains(dst) {
        return Err(NoPathError { src, dst });
    }
    if src == dst {
        return Ok(Path::new(vec![src]));
    }

    // node -> (best cost, predecessor)
    let mut best: BTreeMap<NodeId, (Cost, Option<NodeId>)> = BTreeMap::new();
    let mut heap = BinaryHeap::new();

    best.insert(src, (Cost::origin(src), None));
    heap.push(Frontier {
        cost: Cost::origin(src),
        node: src,
    });

    while let Some(Frontier { cost, node }) = heap.pop() {
        // stale entry
        if let Some((known, _)) = best.get(&node) {
            if cost.cmp_key(known) == Ordering::Greater {
                continue;
            }
        }
        if node == dst {
            break;
        }

        for link in topology.out_links(node) {
            let next = link.key.dst;
            let candidate = cost.extend(link.weight(bytes), next);
            match best.get(&next).copied() {
                Some((known, pred)) => match candidate.cmp_key(&known) {
                    Ordering::Less => {
                        best.insert(next, (candidate, Some(node)));
                        heap.push(Frontier {
                            cost: candidate,
                            node: next,
                        });
                    }
                    Ordering::Equal if pred.map_or(true, |p| node < p) => {
                        best.insert(next, (candidate, Some(node)));
                    }
                    _ => {}
                },
                None => {
                    best.insert(next, (candidate, Some(node)));
                    heap.push(Frontier {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }
    }

    if !best.contains_key(&dst) {
        return Err(NoPathError { src, dst });
    }

    let mut nodes = vec![dst];
    let mut cursor = dst;
    while let Some((_, Some(pred))) = best.get(&cursor) {
        nodes.push(*pred);
        cursor = *pred;
    }
    nodes.reverse();
    Ok(Path::new(nodes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

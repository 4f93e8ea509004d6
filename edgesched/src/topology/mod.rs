/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Physical topology: compute nodes and directed, weighted links.
//!
//! Storage is an arena rather than a pointer graph:
//!
//! * nodes live in a `Vec<Node>` addressed through a `BTreeMap<NodeId, usize>`;
//! * links live in a `BTreeMap<LinkKey, Link>` keyed by `(src, dst)`, so a
//!   range query over `(src, *)` yields a node's out-edges in id order.
//!
//! `BTreeMap` everywhere keeps iteration order independent of insertion
//! order, which the deterministic tie-breaks in [`path`] depend on.
//!
//! Static attributes ([`NodeAttrs`], [`LinkAttrs`]) are fixed once added.
//! Runtime counters ([`NodeState`], [`LinkState`]) are mutated by the engine
//! and read by every later path computation, so load changes are visible
//! without rebuilding anything.  A link's bandwidth is split between the
//! transfers on it in proportion to their payload sizes; see [`Link`].

pub mod path;

pub use path::Path;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NoPathError, TopologyError};
use crate::message::InstanceId;
use crate::time::SimTime;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Stable node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        NodeId(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// A directed link is identified by its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub src: NodeId,
    pub dst: NodeId,
}

impl LinkKey {
    pub fn new(src: NodeId, dst: NodeId) -> Self {
        Self { src, dst }
    }
}

// ── Node ──────────────────────────────────────────────────────────────────────

/// Static capacity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Instructions executed per simulated time unit.
    pub compute_rate: f64,
    /// Memory capacity, in bytes of buffered payload.
    pub memory: u64,
}

/// Mutable per-run counters, maintained by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeState {
    /// Instructions admitted but not yet completed.
    pub queued_instructions: u64,
    /// Instances admitted but not yet completed.
    pub queue_depth: u32,
    /// The single FIFO server is busy until this instant.
    pub busy_until: SimTime,
    /// Service time accumulated inside the run horizon.
    pub busy_time: f64,
    pub memory_in_use: u64,
    pub peak_memory: u64,
    pub completed: u64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub attrs: NodeAttrs,
    pub state: NodeState,
}

impl Node {
    /// Memory not currently holding queued payloads.
    pub fn available_memory(&self) -> u64 {
        self.attrs.memory.saturating_sub(self.state.memory_in_use)
    }

    /// Time the current backlog needs to drain, measured from `now`.
    pub fn backlog(&self, now: SimTime) -> f64 {
        self.state.busy_until.since(now)
    }

    /// Queued work expressed in time units: `queued_instructions / rate`.
    pub fn load(&self) -> f64 {
        self.state.queued_instructions as f64 / self.attrs.compute_rate
    }

    /// Time to execute `instructions` on this node, ignoring the queue.
    pub fn service_time(&self, instructions: u64) -> f64 {
        instructions as f64 / self.attrs.compute_rate
    }
}

// ── Link ──────────────────────────────────────────────────────────────────────

/// Static link characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkAttrs {
    /// Bytes per simulated time unit.
    pub bandwidth: f64,
    /// Propagation delay in simulated time units.
    pub delay: f64,
}

/// One payload being pushed onto a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transmission {
    /// Payload size; the transfer's weight in the pool.
    pub bytes: u64,
    /// Bytes still to send as of [`LinkState::updated_at`].
    pub remaining: f64,
    /// Current share of the bandwidth, bytes per time unit.
    pub rate: f64,
}

/// Transfers currently on a link.
///
/// Bandwidth is a shared pool: every active transfer gets a share
/// proportional to its payload size, `bandwidth * bytes / in_flight_bytes`.
/// Shares are recomputed whenever a transfer starts or finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkState {
    /// Sum of the payload sizes of the active transfers.
    pub in_flight_bytes: u64,
    /// Instant the `remaining` counters were last brought up to date.
    pub updated_at: SimTime,
    pub active: BTreeMap<InstanceId, Transmission>,
}

impl LinkState {
    pub fn in_flight(&self) -> usize {
        self.active.len()
    }
}

#[derive(Debug, Clone)]
pub struct Link {
    pub key: LinkKey,
    pub attrs: LinkAttrs,
    pub state: LinkState,
}

impl Link {
    /// Time to push `bytes` over this link if it joined the current pool
    /// and the pool stayed as it is.
    pub fn transmission_delay(&self, bytes: u64) -> f64 {
        (self.state.in_flight_bytes + bytes) as f64 / self.attrs.bandwidth
    }

    /// Edge weight used by shortest-path search: propagation plus
    /// transmission.
    pub fn weight(&self, bytes: u64) -> f64 {
        self.attrs.delay + self.transmission_delay(bytes)
    }

    /// Put `bytes` for `instance` on the wire at `now`.
    pub fn start_transmission(&mut self, instance: InstanceId, bytes: u64, now: SimTime) {
        self.advance(now);
        self.state.in_flight_bytes += bytes;
        self.state.active.insert(
            instance,
            Transmission {
                bytes,
                remaining: bytes as f64,
                rate: 0.0,
            },
        );
        self.rebalance();
    }

    /// Take `instance` off the wire at `now`; the others speed up.
    pub fn finish_transmission(
        &mut self,
        instance: InstanceId,
        now: SimTime,
    ) -> Option<Transmission> {
        self.advance(now);
        let done = self.state.active.remove(&instance)?;
        self.state.in_flight_bytes = self.state.in_flight_bytes.saturating_sub(done.bytes);
        self.rebalance();
        Some(done)
    }

    /// When each active transfer finishes at its current rate.
    pub fn completion_times(&self) -> impl Iterator<Item = (InstanceId, SimTime)> + '_ {
        let from = self.state.updated_at;
        self.state.active.iter().map(move |(&id, t)| {
            let left = if t.remaining <= 0.0 || t.rate <= 0.0 {
                0.0
            } else {
                t.remaining / t.rate
            };
            (id, from.plus(left))
        })
    }

    fn advance(&mut self, now: SimTime) {
        let elapsed = now.since(self.state.updated_at);
        for t in self.state.active.values_mut() {
            t.remaining = (t.remaining - t.rate * elapsed).max(0.0);
        }
        self.state.updated_at = now;
    }

    fn rebalance(&mut self) {
        let total = self.state.in_flight_bytes as f64;
        let bandwidth = self.attrs.bandwidth;
        for t in self.state.active.values_mut() {
            t.rate = if total > 0.0 {
                bandwidth * t.bytes as f64 / total
            } else {
                bandwidth
            };
        }
    }
}

// ── Topology ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    index: BTreeMap<NodeId, usize>,
    links: BTreeMap<LinkKey, Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        attrs: NodeAttrs,
    ) -> Result<(), TopologyError> {
        if self.index.contains_key(&id) {
            return Err(TopologyError::DuplicateNode(id));
        }
        if !(attrs.compute_rate.is_finite() && attrs.compute_rate > 0.0) {
            return Err(TopologyError::InvalidComputeRate {
                node: id,
                rate: attrs.compute_rate,
            });
        }
        let name = name.into();
        debug!(node = %id, name = %name, rate = attrs.compute_rate, memory = attrs.memory, "node added");
        self.index.insert(id, self.nodes.len());
        self.nodes.push(Node {
            id,
            name,
            attrs,
            state: NodeState::default(),
        });
        Ok(())
    }

    /// Add the directed link `src -> dst`.  Add the reverse direction
    /// separately; the two may have different attributes.
    pub fn add_link(
        &mut self,
        src: NodeId,
        dst: NodeId,
        attrs: LinkAttrs,
    ) -> Result<(), TopologyError> {
        for end in [src, dst] {
            if !self.index.contains_key(&end) {
                return Err(TopologyError::UnknownEndpoint {
                    src,
                    dst,
                    missing: end,
                });
            }
        }
        if src == dst {
            return Err(TopologyError::SelfLoop { node: src });
        }
        if !(attrs.bandwidth.is_finite() && attrs.bandwidth > 0.0) {
            return Err(TopologyError::InvalidLinkAttr {
                src,
                dst,
                field: "bandwidth",
                value: attrs.bandwidth,
            });
        }
        if !(attrs.delay.is_finite() && attrs.delay >= 0.0) {
            return Err(TopologyError::InvalidLinkAttr {
                src,
                dst,
                field: "delay",
                value: attrs.delay,
            });
        }
        let key = LinkKey::new(src, dst);
        if self.links.contains_key(&key) {
            return Err(TopologyError::DuplicateLink { src, dst });
        }
        debug!(src = %src, dst = %dst, bandwidth = attrs.bandwidth, delay = attrs.delay, "link added");
        self.links.insert(
            key,
            Link {
                key,
                attrs,
                state: LinkState::default(),
            },
        );
        Ok(())
    }

    /// Remove the directed link `src -> dst`, returning it if it existed.
    pub fn remove_link(&mut self, src: NodeId, dst: NodeId) -> Option<Link> {
        self.links.remove(&LinkKey::new(src, dst))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let i = *self.index.get(&id)?;
        self.nodes.get_mut(i)
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.index.values().map(move |&i| &self.nodes[i])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link(&self, key: LinkKey) -> Option<&Link> {
        self.links.get(&key)
    }

    pub fn link_mut(&mut self, key: LinkKey) -> Option<&mut Link> {
        self.links.get_mut(&key)
    }

    /// All links in `(src, dst)` order.
    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.links.values()
    }

    /// Out-edges of `src`, in ascending destination order.
    pub fn out_links(&self, src: NodeId) -> impl Iterator<Item = &Link> + '_ {
        let lo = LinkKey::new(src, NodeId::new(u32::MIN));
        let hi = LinkKey::new(src, NodeId::new(u32::MAX));
        self.links.range(lo..=hi).map(|(_, l)| l)
    }

    /// Cheapest path from `src` to `dst` for a payload of `bytes`.
    ///
    /// See [`path::shortest_path`] for the cost model and tie-breaks.
    pub fn shortest_path(
        &self,
        src: NodeId,
        dst: NodeId,
        bytes: u64,
    ) -> Result<Path, NoPathError> {
        path::shortest_path(self, src, dst, bytes)
    }

    /// Current latency of `path` for `bytes`: the sum of link weights.
    ///
    /// Links missing from the topology contribute nothing; paths produced by
    /// [`shortest_path`](Self::shortest_path) never contain such links.
    pub fn path_latency(&self, path: &Path, bytes: u64) -> f64 {
        path.links()
            .filter_map(|key| self.links.get(&key))
            .map(|l| l.weight(bytes))
            .sum()
    }

    /// Zero every runtime counter (used before a fresh run on the same
    /// topology).
    pub fn reset_state(&mut self) {
        for node in &mut self.nodes {
            node.state = NodeState::default();
        }
        for link in self.links.values_mut() {
            link.state = LinkState::default();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

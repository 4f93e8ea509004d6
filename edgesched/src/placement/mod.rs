/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Service placement: binding logical services to physical nodes.
//!
//! The capability is the [`Allocate`] trait; the set of implementations is
//! closed and selected from configuration through the [`Placement`] enum:
//!
//! | Variant | Behaviour |
//! |---|---|
//! | [`StaticPlacement`] | fixed `service → [node…]` table (the edge/cloud split) |
//! | [`PolicyPlacement`] | per-service candidates, re-ordered by current node load on every query |
//!
//! The first element of an allocation is the primary node.  An empty
//! allocation means "unplaced"; messages for that service are recorded as
//! routing failures.  Ids unknown to the topology are never returned.

pub mod feasibility;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::topology::{NodeId, Topology};

// ── Capability ────────────────────────────────────────────────────────────────

pub trait Allocate {
    /// Ordered nodes hosting `service` of application `app`; primary first.
    fn initial_allocation(&self, app: &str, service: &str, topology: &Topology) -> Vec<NodeId>;
}

/// Drop ids the topology does not know, warning about each.
fn retain_known(service: &str, nodes: &[NodeId], topology: &Topology) -> Vec<NodeId> {
    nodes
        .iter()
        .copied()
        .filter(|id| {
            let known = topology.contains(*id);
            if !known {
                warn!(service, node = %id, "placement names a node missing from the topology; ignored");
            }
            known
        })
        .collect()
}

fn validate_table(
    kind: &str,
    table: &BTreeMap<String, Vec<NodeId>>,
    topology: &Topology,
) -> Result<(), ConfigError> {
    for (service, nodes) in table {
        if let Some(&node) = nodes.iter().find(|id| !topology.contains(**id)) {
            return Err(ConfigError::UnknownNode {
                context: format!("{kind} placement of service '{service}'"),
                node,
            });
        }
    }
    Ok(())
}

// ── StaticPlacement ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticPlacement {
    mapping: BTreeMap<String, Vec<NodeId>>,
}

impl StaticPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `service` to `nodes` (primary first), replacing any previous
    /// binding.
    pub fn bind(&mut self, service: impl Into<String>, nodes: Vec<NodeId>) {
        self.mapping.insert(service.into(), nodes);
    }

    pub fn mapping(&self) -> &BTreeMap<String, Vec<NodeId>> {
        &self.mapping
    }
}

impl Allocate for StaticPlacement {
    fn initial_allocation(&self, app: &str, service: &str, topology: &Topology) -> Vec<NodeId> {
        let nodes = self
            .mapping
            .get(service)
            .map(|n| retain_known(service, n, topology))
            .unwrap_or_default();
        debug!(app, service, nodes = ?nodes, "static allocation");
        nodes
    }
}

// ── PolicyPlacement ───────────────────────────────────────────────────────────

/// Load-aware placement.
///
/// Each service has a candidate set; every query orders it by current node
/// load (`queued_instructions / compute_rate`), lightest first, ties by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyPlacement {
    candidates: BTreeMap<String, Vec<NodeId>>,
}

impl PolicyPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, service: impl Into<String>, nodes: Vec<NodeId>) {
        self.candidates.insert(service.into(), nodes);
    }

    pub fn candidates(&self) -> &BTreeMap<String, Vec<NodeId>> {
        &self.candidates
    }
}

impl Allocate for PolicyPlacement {
    fn initial_allocation(&self, app: &str, service: &str, topology: &Topology) -> Vec<NodeId> {
        let Some(candidates) = self.candidates.get(service) else {
            return Vec::new();
        };
        let mut nodes = retain_known(service, candidates, topology);
        nodes.sort_by(|a, b| {
            let la = topology.node(*a).map_or(f64::MAX, |n| n.load());
            let lb = topology.node(*b).map_or(f64::MAX, |n| n.load());
            la.total_cmp(&lb).then(a.cmp(b))
        });
        nodes.dedup();
        debug!(app, service, nodes = ?nodes, "policy allocation");
        nodes
    }
}

// ── Placement ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Static(StaticPlacement),
    Policy(PolicyPlacement),
}

impl Placement {
    pub fn kind(&self) -> &'static str {
        match self {
            Placement::Static(_) => "static",
            Placement::Policy(_) => "policy",
        }
    }

    /// The configured `service → nodes` table.
    pub fn table(&self) -> &BTreeMap<String, Vec<NodeId>> {
        match self {
            Placement::Static(p) => p.mapping(),
            Placement::Policy(p) => p.candidates(),
        }
    }

    /// Reject tables that reference nodes absent from `topology`.
    pub fn validate(&self, topology: &Topology) -> Result<(), ConfigError> {
        validate_table(self.kind(), self.table(), topology)
    }
}

impl Allocate for Placement {
    fn initial_allocation(&self, app: &str, service: &str, topology: &Topology) -> Vec<NodeId> {
        match self {
            Placement::Static(p) => p.initial_allocation(app, service, topology),
            Placement::Policy(p) => p.initial_allocation(app, service, topology),
        }
    }
}

impl From<StaticPlacement> for Placement {
    fn from(p: StaticPlacement) -> Self {
        Placement::Static(p)
    }
}

impl From<PolicyPlacement> for Placement {
    fn from(p: PolicyPlacement) -> Self {
        Placement::Policy(p)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

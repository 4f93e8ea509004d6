/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-stage offload decisions: run a pipeline stage locally or ship it to
//! a remote node.
//!
//! For each stage the scheduler compares two completion estimates against
//! the remaining deadline budget:
//!
//! ```text
//! local  = (queue_depth + 1) × instructions / local_rate
//! remote = max(now + path_latency, remote_busy_until) + instructions / remote_rate − now
//! ```
//!
//! 1. LOCAL if `local ≤ budget`;
//! 2. else REMOTE if `remote ≤ budget`;
//! 3. else whichever overruns less, flagged `at_risk` (LOCAL wins a tie).
//!
//! The scheduler keeps no state between ticks.  The only changing inputs are
//! the snapshot handed in by the caller and the node/link counters the
//! engine maintains in the [`Topology`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::time::SimTime;
use crate::topology::{Node, NodeId, Topology};

// ── Decision types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Local,
    Remote,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Verdict::Local => "LOCAL",
            Verdict::Remote => "REMOTE",
        })
    }
}

/// Why a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    LocalWithinBudget,
    RemoteWithinBudget,
    /// Neither option fits; the smaller overrun was chosen.
    LeastOverrun,
    /// Local overruns and the remote node cannot be reached.
    RemoteUnreachable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffloadDecision {
    pub stage: String,
    pub frame_id: u64,
    pub verdict: Verdict,
    pub reason: Reason,
    /// Remaining budget the decision was taken against.
    pub budget: f64,
    pub local_estimate: f64,
    pub remote_estimate: Option<f64>,
    /// Set when the chosen option still overruns the budget.
    pub at_risk: bool,
}

impl OffloadDecision {
    /// Completion estimate of the chosen option.
    pub fn chosen_estimate(&self) -> f64 {
        match self.verdict {
            Verdict::Local => self.local_estimate,
            Verdict::Remote => self.remote_estimate.unwrap_or(f64::INFINITY),
        }
    }
}

// ── Stage inputs ──────────────────────────────────────────────────────────────

/// Static description of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    /// Service whose arrivals trigger this stage inside the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub instructions: u64,
    pub bytes: u64,
    pub local_node: NodeId,
    pub remote_node: NodeId,
}

/// Resource snapshot of the local device for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSnapshot {
    pub local_queue_depth: u32,
    pub local_compute_rate: f64,
}

impl StageSnapshot {
    /// Snapshot taken from the engine's bookkeeping for `node`.
    pub fn of_node(node: &Node) -> Self {
        Self {
            local_queue_depth: node.state.queue_depth,
            local_compute_rate: node.attrs.compute_rate,
        }
    }
}

// ── OffloadScheduler ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct OffloadScheduler {
    /// End-to-end pipeline deadline used as the starting budget of a tick.
    deadline: f64,
    /// Stages in execution order.
    stages: Vec<StageSpec>,
}

impl OffloadScheduler {
    pub fn new(deadline: f64, stages: Vec<StageSpec>) -> Self {
        Self { deadline, stages }
    }

    pub fn deadline(&self) -> f64 {
        self.deadline
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The stage bound to `service`, if any.
    pub fn stage_for_service(&self, service: &str) -> Option<&StageSpec> {
        self.stages
            .iter()
            .find(|s| s.service.as_deref() == Some(service))
    }

    /// Every stage must name known nodes and a unique name.
    pub fn validate(&self, topology: &Topology) -> Result<(), ConfigError> {
        if !(self.deadline.is_finite() && self.deadline > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "offload.deadline".into(),
                reason: format!("{} is not a positive time", self.deadline),
            });
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].iter().any(|s| s.name == stage.name) {
                return Err(ConfigError::InvalidValue {
                    field: "offload.stages".into(),
                    reason: format!("stage '{}' is declared twice", stage.name),
                });
            }
            for node in [stage.local_node, stage.remote_node] {
                if !topology.contains(node) {
                    return Err(ConfigError::UnknownNode {
                        context: format!("offload stage '{}'", stage.name),
                        node,
                    });
                }
            }
        }
        Ok(())
    }

    /// Estimated completion time (relative to `now`) of running `stage` on
    /// its remote node, or `None` if the remote node is unreachable.
    pub fn remote_estimate(&self, stage: &StageSpec, topology: &Topology, now: SimTime) -> Option<f64> {
        let path = topology
            .shortest_path(stage.local_node, stage.remote_node, stage.bytes)
            .ok()?;
        let remote = topology.node(stage.remote_node)?;
        // queued behind the remote backlog if it outlasts the transfer
        let wait = topology
            .path_latency(&path, stage.bytes)
            .max(remote.backlog(now));
        Some(wait + remote.service_time(stage.instructions))
    }

    /// Decide where `stage` runs for `frame_id` given `budget` time units.
    pub fn decide(
        &self,
        stage: &StageSpec,
        frame_id: u64,
        snapshot: StageSnapshot,
        budget: f64,
        topology: &Topology,
        now: SimTime,
    ) -> OffloadDecision {
        let local = if snapshot.local_compute_rate > 0.0 {
            f64::from(snapshot.local_queue_depth + 1) * stage.instructions as f64
                / snapshot.local_compute_rate
        } else {
            f64::INFINITY
        };
        let remote = self.remote_estimate(stage, topology, now);

        let (verdict, reason) = if local <= budget {
            (Verdict::Local, Reason::LocalWithinBudget)
        } else {
            match remote {
                Some(r) if r <= budget => (Verdict::Remote, Reason::RemoteWithinBudget),
                Some(r) if r < local => (Verdict::Remote, Reason::LeastOverrun),
                Some(_) => (Verdict::Local, Reason::LeastOverrun),
                None => (Verdict::Local, Reason::RemoteUnreachable),
            }
        };
        let at_risk = matches!(reason, Reason::LeastOverrun | Reason::RemoteUnreachable);

        let decision = OffloadDecision {
            stage: stage.name.clone(),
            frame_id,
            verdict,
            reason,
            budget,
            local_estimate: local,
            remote_estimate: remote,
            at_risk,
        };

        if at_risk {
            warn!(
                stage = %stage.name,
                frame = frame_id,
                verdict = %verdict,
                budget,
                local,
                remote = ?remote,
                "DEADLINE_AT_RISK: no option completes within budget"
            );
        } else {
            debug!(
                stage = %stage.name,
                frame = frame_id,
                verdict = %verdict,
                budget,
                local,
                remote = ?remote,
                "offload decision"
            );
        }
        decision
    }

    /// [`decide`](Self::decide) for a stage looked up by name.
    pub fn decide_by_name(
        &self,
        stage: &str,
        frame_id: u64,
        snapshot: StageSnapshot,
        budget: f64,
        topology: &Topology,
        now: SimTime,
    ) -> Option<OffloadDecision> {
        let spec = self.stage(stage)?;
        Some(self.decide(spec, frame_id, snapshot, budget, topology, now))
    }

    /// Decide every stage of one pipeline tick, in stage order.
    ///
    /// The budget starts at the pipeline deadline and shrinks by each
    /// stage's chosen estimate, so later stages see what upstream stages
    /// left them.  Stages without a snapshot are skipped.
    pub fn tick(
        &self,
        frame_id: u64,
        snapshots: &BTreeMap<String, StageSnapshot>,
        topology: &Topology,
        now: SimTime,
    ) -> Vec<OffloadDecision> {
        let mut budget = self.deadline;
        let mut elapsed = 0.0;
        let mut decisions = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let Some(&snapshot) = snapshots.get(&stage.name) else {
                continue;
            };
            let decision =
                self.decide(stage, frame_id, snapshot, budget, topology, now.plus(elapsed));
            let spent = decision.chosen_estimate();
            budget -= spent;
            elapsed += spent;
            decisions.push(decision);
        }
        decisions
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Priority router: picks the destination node and network path for one
//! message instance.
//!
//! | Kind | Destination choice |
//! |---|---|
//! | [`RouterKind::Priority`] | reachable candidate with the earliest projected arrival |
//! | [`RouterKind::Primary`] | always the first (primary) candidate |
//!
//! Ties in projected arrival fall back to candidate order.  Priority class
//! and deadline order *between* instances competing for the same links is
//! decided by the engine's event ordering: the instance routed first sees
//! the smaller bandwidth reservation.
//!
//! Lateness never drops a message.  A route whose projected arrival is
//! past the instance's absolute deadline is returned with
//! `deadline_missed = true`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NoPathError, RouteError};
use crate::message::MessageInstance;
use crate::observe::{Record, RoutingRecord, SharedSink};
use crate::time::SimTime;
use crate::topology::{NodeId, Path, Topology};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    #[default]
    Priority,
    Primary,
}

impl FromStr for RouterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "priority" => Ok(RouterKind::Priority),
            "primary" => Ok(RouterKind::Primary),
            other => Err(format!("unknown router '{other}' (expected priority|primary)")),
        }
    }
}

impl std::fmt::Display for RouterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RouterKind::Priority => "priority",
            RouterKind::Primary => "primary",
        })
    }
}

/// Outcome of a successful routing decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub destination: NodeId,
    pub path: Path,
    pub projected_latency: f64,
    pub projected_arrival: SimTime,
    pub deadline_missed: bool,
}

pub struct Router {
    kind: RouterKind,
    sink: SharedSink,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(kind: RouterKind, sink: SharedSink) -> Self {
        Self { kind, sink }
    }

    pub fn kind(&self) -> RouterKind {
        self.kind
    }

    /// Route `instance` from `source` to one of `candidates` (primary first).
    ///
    /// # Errors
    /// * [`RouteError::Unplaced`] for an empty candidate list.
    /// * [`RouteError::NoPath`] when no candidate is reachable; the error
    ///   names the primary candidate.
    pub fn route(
        &self,
        instance: &MessageInstance,
        source: NodeId,
        candidates: &[NodeId],
        topology: &Topology,
        now: SimTime,
    ) -> Result<Route, RouteError> {
        let Some(&primary) = candidates.first() else {
            return Err(RouteError::Unplaced {
                service: instance.template.destination.clone(),
            });
        };
        let bytes = instance.template.bytes;

        let (destination, path, latency) = match self.kind {
            RouterKind::Primary => {
                let path = topology.shortest_path(source, primary, bytes)?;
                let latency = topology.path_latency(&path, bytes);
                (primary, path, latency)
            }
            RouterKind::Priority => {
                let mut best: Option<(NodeId, Path, f64)> = None;
                for &candidate in candidates {
                    let Ok(path) = topology.shortest_path(source, candidate, bytes) else {
                        continue;
                    };
                    let latency = topology.path_latency(&path, bytes);
                    // strict: earlier candidates win ties
                    if best.as_ref().map_or(true, |(_, _, l)| latency < *l) {
                        best = Some((candidate, path, latency));
                    }
                }
                best.ok_or(NoPathError {
                    src: source,
                    dst: primary,
                })?
            }
        };

        let projected_arrival = now.plus(latency);
        let deadline_missed = projected_arrival > instance.absolute_deadline();
        let route = Route {
            destination,
            path,
            projected_latency: latency,
            projected_arrival,
            deadline_missed,
        };
        self.report(instance, source, &route, now);
        Ok(route)
    }

    fn report(&self, instance: &MessageInstance, source: NodeId, route: &Route, now: SimTime) {
        if route.deadline_missed {
            warn!(
                instance = %instance.id,
                message = instance.name(),
                priority = %instance.qos.priority,
                deadline = instance.qos.deadline,
                path = %route.path,
                latency = route.projected_latency,
                "DEADLINE_MISSED: projected arrival past deadline"
            );
        } else {
            info!(
                instance = %instance.id,
                message = instance.name(),
                priority = %instance.qos.priority,
                deadline = instance.qos.deadline,
                path = %route.path,
                latency = route.projected_latency,
                "routed"
            );
        }
        self.sink.borrow_mut().record(&Record::Routing(RoutingRecord {
            at: now,
            instance: instance.id,
            message: instance.name().to_string(),
            priority: instance.qos.priority,
            deadline: instance.qos.deadline,
            source,
            destination: route.destination,
            path: route.path.clone(),
            projected_latency: route.projected_latency,
            projected_arrival: route.projected_arrival,
            deadline_missed: route.deadline_missed,
        }));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

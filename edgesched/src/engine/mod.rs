/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Discrete-event engine.
//!
//! One clock, one thread, one queue.  The clock only moves to the
//! timestamp of the next event popped from a min-ordered `BinaryHeap`
//! (see [`event::EventKey`] for the tie-break order).
//!
//! ```text
//! EMIT ──route──▶ TRANSMITTED ──delay──▶ ARRIVE ──(offload?)──▶ FIFO server ──▶ SERVICE_COMPLETE
//!  │               (per link)              │
//!  └─ next EMIT                            ├─ more links: next TRANSMITTED
//!                                          └─ REMOTE: forward to the remote node
//! ```
//!
//! Each node is a single FIFO server: work admitted at `now` starts at
//! `max(now, busy_until)`.
//!
//! Links are crossed hop by hop.  While an instance is pushing its bytes
//! onto a link it holds a share of the link's bandwidth proportional to its
//! payload size; once the last byte is out it leaves the pool and arrives
//! at the next node after the propagation delay.  Every start or finish on
//! a link changes the shares of the transfers left on it, so their pending
//! TRANSMITTED events are rescheduled under a new per-instance generation
//! and the superseded ones are skipped when popped.
//!
//! Per-instance routing problems never stop the run; they are recorded as
//! `RoutingFailure` records and counted in [`RunMetrics::routing_failures`].

pub mod event;
pub mod metrics;

use std::collections::{BTreeMap, BinaryHeap};

use tracing::{debug, info, warn};

use crate::application::Application;
use crate::error::{ConfigError, RouteError};
use crate::message::{InstanceId, MessageInstance, Qos, QosTable};
use crate::observe::{CompletionRecord, FailureRecord, OffloadRecord, Record, SharedSink};
use crate::offload::{OffloadScheduler, StageSnapshot, Verdict};
use crate::placement::feasibility::{self, Flow};
use crate::placement::{Allocate, Placement};
use crate::router::Router;
use crate::scenario::{Scenario, Source};
use crate::time::SimTime;
use crate::topology::{LinkKey, NodeId, Path, Topology};

use event::{Event, EventKey, EventKind, TraceEntry};
use metrics::Collector;
pub use metrics::{ClassMetrics, LatencySummary, NodeUtilization, RunMetrics};

/// Book-keeping for an instance between EMIT and SERVICE_COMPLETE.
#[derive(Debug, Clone)]
struct InFlight {
    instance: MessageInstance,
    /// Path of the current transfer.
    path: Path,
    /// Index of the link being crossed, or of the node reached once the
    /// transmission on it is done.
    hop: usize,
    /// Tag of the one live TRANSMITTED event for this instance.
    generation: u64,
    /// Node the instance travels to or executes on.
    node: NodeId,
    offloaded: bool,
    arrived_at: SimTime,
    started_at: SimTime,
}

pub struct Engine {
    topology: Topology,
    application: Application,
    placement: Placement,
    qos: QosTable,
    router: Router,
    sources: Vec<Source>,
    horizon: SimTime,
    offload: Option<OffloadScheduler>,
    sink: SharedSink,

    /// Placement answers, cached per service.
    allocations: BTreeMap<String, Vec<NodeId>>,

    queue: BinaryHeap<Event>,
    clock: SimTime,
    next_seq: u64,
    next_instance: u64,
    in_flight: BTreeMap<InstanceId, InFlight>,
    collector: Collector,
    trace: Option<Vec<TraceEntry>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("application", &self.application.name())
            .field("router", &self.router.kind())
            .field("horizon", &self.horizon)
            .field("clock", &self.clock)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validate `scenario` and prepare an engine for it.
    ///
    /// `sink` receives every routing, failure, offload and completion
    /// record; the router shares it.
    pub fn new(scenario: Scenario, sink: SharedSink) -> Result<Self, ConfigError> {
        scenario.validate()?;
        let Scenario {
            topology,
            application,
            placement,
            qos,
            router,
            sources,
            horizon,
            offload,
        } = scenario;

        let mut engine = Self {
            topology,
            application,
            placement,
            qos,
            router: Router::new(router, sink.clone()),
            sources,
            horizon: SimTime::new(horizon),
            offload,
            sink,
            allocations: BTreeMap::new(),
            queue: BinaryHeap::new(),
            clock: SimTime::ZERO,
            next_seq: 0,
            next_instance: 0,
            in_flight: BTreeMap::new(),
            collector: Collector::default(),
            trace: None,
        };
        engine.refresh_placement();
        engine.check_feasibility();
        Ok(engine)
    }

    /// Record the `(time, seq, kind)` of every processed event.
    pub fn with_event_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    /// Events processed by the last run, if tracing was enabled.
    pub fn event_trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable topology access between runs; call
    /// [`refresh_placement`](Self::refresh_placement) afterwards if the
    /// change can affect placement.
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn now(&self) -> SimTime {
        self.clock
    }

    /// Re-query placement for every service and cache the answers.
    pub fn refresh_placement(&mut self) {
        self.allocations = self
            .application
            .services()
            .map(|service| {
                let nodes = self.placement.initial_allocation(
                    self.application.name(),
                    service,
                    &self.topology,
                );
                if nodes.is_empty() {
                    warn!(service, "service is unplaced; its messages will be dropped");
                }
                (service.to_string(), nodes)
            })
            .collect();
        debug!(allocations = ?self.allocations, "placement refreshed");
    }

    /// Cached allocation of `service` (primary first).
    pub fn allocation(&self, service: &str) -> &[NodeId] {
        self.allocations
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn check_feasibility(&self) {
        let flows: Vec<Flow<'_>> = self
            .sources
            .iter()
            .filter_map(|s| {
                self.application.message(&s.message).map(|m| Flow {
                    message: m.as_ref(),
                    period: s.period,
                })
            })
            .collect();
        let load = feasibility::offered_load(&flows, &self.allocations, &self.topology);
        for (node, utilization) in feasibility::saturated(&load) {
            warn!(
                node = %node,
                utilization,
                "offered load exceeds node capacity; its queue will grow for the whole run"
            );
        }
    }

    // ── Run loop ──────────────────────────────────────────────────────────────

    /// Run from a clean state to the horizon and return the metrics.
    ///
    /// Sources emit strictly before the horizon; events stamped at or before
    /// it are processed.  Calling `run` again repeats the simulation from
    /// time zero.
    pub fn run(&mut self) -> RunMetrics {
        self.reset();
        for index in 0..self.sources.len() {
            let start = SimTime::new(self.sources[index].start);
            if start < self.horizon {
                self.schedule_emit(index, start);
            }
        }
        info!(
            app = %self.application.name(),
            sources = self.sources.len(),
            horizon = self.horizon.as_f64(),
            router = %self.router.kind(),
            "simulation started"
        );

        while let Some(event) = self.queue.pop() {
            if event.key.time > self.horizon {
                break;
            }
            if let EventKind::Transmitted { instance, generation } = event.kind {
                if !self.is_current(instance, generation) {
                    continue;
                }
            }
            self.clock = event.key.time;
            self.collector.events_processed += 1;
            if let Some(trace) = &mut self.trace {
                trace.push(TraceEntry {
                    time: event.key.time,
                    seq: event.key.seq,
                    kind: event.kind,
                });
            }
            match event.kind {
                EventKind::Emit { source } => self.on_emit(source),
                EventKind::Transmitted { instance, .. } => self.on_transmitted(instance),
                EventKind::Arrive { instance } => self.on_arrive(instance),
                EventKind::ServiceComplete { instance } => self.on_complete(instance),
            }
        }
        self.queue.clear();

        let collector = std::mem::take(&mut self.collector);
        let metrics = collector.finish(
            self.horizon.as_f64(),
            self.in_flight.len() as u64,
            &self.topology,
        );
        info!(
            events = metrics.events_processed,
            emitted = metrics.emitted,
            completed = metrics.completed,
            misses = metrics.deadline_misses,
            failures = metrics.routing_failure_total(),
            in_flight = metrics.in_flight_at_horizon,
            "simulation finished"
        );
        metrics
    }

    fn reset(&mut self) {
        self.topology.reset_state();
        self.queue.clear();
        self.in_flight.clear();
        self.clock = SimTime::ZERO;
        self.next_seq = 0;
        self.next_instance = 0;
        self.collector = Collector::default();
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
    }

    fn push(&mut self, time: SimTime, qos: Qos, deadline: SimTime, kind: EventKind) {
        let key = EventKey::new(time, qos, deadline, self.next_seq);
        self.next_seq += 1;
        self.queue.push(Event { key, kind });
    }

    fn schedule_emit(&mut self, source: usize, at: SimTime) {
        let Some(qos) = self.qos.get(&self.sources[source].message) else {
            return;
        };
        self.push(at, qos, at.plus(qos.deadline), EventKind::Emit { source });
    }

    /// Queue `kind` for an in-flight instance, keyed by its QoS.
    fn schedule_for(&mut self, id: InstanceId, at: SimTime, kind: EventKind) {
        let Some(entry) = self.in_flight.get(&id) else {
            return;
        };
        let (qos, deadline) = (entry.instance.qos, entry.instance.absolute_deadline());
        self.push(at, qos, deadline, kind);
    }

    fn is_current(&self, id: InstanceId, generation: u64) -> bool {
        self.in_flight
            .get(&id)
            .is_some_and(|entry| entry.generation == generation)
    }

    // ── Links ─────────────────────────────────────────────────────────────────

    /// Put `id` on the next link of its path, or schedule its ARRIVE now if
    /// it already stands at the end of the path.
    fn depart(&mut self, id: InstanceId) {
        let now = self.clock;
        let Some(entry) = self.in_flight.get(&id) else {
            return;
        };
        let bytes = entry.instance.template.bytes;
        let next = entry.path.links().nth(entry.hop);
        let Some(key) = next else {
            self.schedule_for(id, now, EventKind::Arrive { instance: id });
            return;
        };
        let Some(link) = self.topology.link_mut(key) else {
            warn!(instance = %id, src = %key.src, dst = %key.dst, "path link missing; instance stalls");
            return;
        };
        link.start_transmission(id, bytes, now);
        debug!(
            instance = %id,
            src = %key.src,
            dst = %key.dst,
            bytes,
            sharing = link.state.in_flight(),
            at = %now,
            "transmission started"
        );
        self.reschedule_link(key);
    }

    /// Re-issue the TRANSMITTED event of every transfer on `key` after its
    /// shares changed.
    fn reschedule_link(&mut self, key: LinkKey) {
        let Some(link) = self.topology.link(key) else {
            return;
        };
        let due: Vec<(InstanceId, SimTime)> = link.completion_times().collect();
        for (id, at) in due {
            let Some(entry) = self.in_flight.get_mut(&id) else {
                continue;
            };
            entry.generation += 1;
            let generation = entry.generation;
            self.schedule_for(id, at, EventKind::Transmitted { instance: id, generation });
        }
    }

    // ── Handlers ──────────────────────────────────────────────────────────────

    fn on_emit(&mut self, index: usize) {
        let now = self.clock;
        let Source {
            message,
            node: source_node,
            period,
            ..
        } = self.sources[index].clone();

        let next = now.plus(period);
        if next < self.horizon {
            self.schedule_emit(index, next);
        }

        let (Some(template), Some(qos)) = (
            self.application.message(&message).cloned(),
            self.qos.get(&message),
        ) else {
            return;
        };

        let id = InstanceId::new(self.next_instance);
        self.next_instance += 1;
        self.collector.emitted += 1;
        let mut instance = MessageInstance::new(id, template, source_node, now, qos);
        debug!(instance = %id, message = %message, node = %source_node, at = %now, "EMIT");

        let candidates = self.allocation(&instance.template.destination).to_vec();
        match self
            .router
            .route(&instance, source_node, &candidates, &self.topology, now)
        {
            Ok(route) => {
                instance.deadline_missed = route.deadline_missed;
                self.in_flight.insert(
                    id,
                    InFlight {
                        instance,
                        path: route.path,
                        hop: 0,
                        generation: 0,
                        node: route.destination,
                        offloaded: false,
                        arrived_at: now,
                        started_at: now,
                    },
                );
                self.depart(id);
            }
            Err(e) => self.routing_failure(&instance, source_node, &e),
        }
    }

    fn on_transmitted(&mut self, id: InstanceId) {
        let now = self.clock;
        let Some(entry) = self.in_flight.get_mut(&id) else {
            return;
        };
        let Some(key) = entry.path.links().nth(entry.hop) else {
            return;
        };
        entry.hop += 1;
        let Some(link) = self.topology.link_mut(key) else {
            return;
        };
        link.finish_transmission(id, now);
        let delay = link.attrs.delay;
        debug!(instance = %id, src = %key.src, dst = %key.dst, at = %now, "transmission finished");

        self.reschedule_link(key);
        self.schedule_for(id, now.plus(delay), EventKind::Arrive { instance: id });
    }

    fn on_arrive(&mut self, id: InstanceId) {
        let now = self.clock;
        let Some(mut entry) = self.in_flight.remove(&id) else {
            return;
        };
        if entry.hop < entry.path.hops() {
            // relay node: straight onto the next link
            self.in_flight.insert(id, entry);
            self.depart(id);
            return;
        }
        debug!(instance = %id, node = %entry.node, at = %now, "ARRIVE");

        if !entry.offloaded && self.try_offload(&mut entry) {
            self.in_flight.insert(id, entry);
            self.depart(id);
            return;
        }

        let Some(node) = self.topology.node_mut(entry.node) else {
            return;
        };
        let instructions = entry.instance.template.instructions;
        let bytes = entry.instance.template.bytes;

        let over_capacity = bytes > node.available_memory();
        let start = now.max(node.state.busy_until);
        let finish = start.plus(node.service_time(instructions));
        node.state.busy_until = finish;
        node.state.queued_instructions += instructions;
        node.state.queue_depth += 1;
        node.state.memory_in_use += bytes;
        node.state.peak_memory = node.state.peak_memory.max(node.state.memory_in_use);
        node.state.busy_time +=
            finish.min(self.horizon).since(start.min(self.horizon));
        if over_capacity {
            warn!(
                node = %node.id,
                in_use = node.state.memory_in_use,
                capacity = node.attrs.memory,
                "node memory over capacity"
            );
        }

        entry.arrived_at = now;
        entry.started_at = start;
        self.in_flight.insert(id, entry);
        self.schedule_for(id, finish, EventKind::ServiceComplete { instance: id });
    }

    /// Ask the offload scheduler about an instance arriving on a stage's
    /// local node.  Returns `true` if it was rerouted to the remote node;
    /// the caller sends it on its way.
    fn try_offload(&mut self, entry: &mut InFlight) -> bool {
        let now = self.clock;
        let Some(offload) = &self.offload else {
            return false;
        };
        let Some(stage) = offload.stage_for_service(&entry.instance.template.destination) else {
            return false;
        };
        if stage.local_node != entry.node {
            return false;
        }
        let Some(local) = self.topology.node(entry.node) else {
            return false;
        };

        let decision = offload.decide(
            stage,
            entry.instance.id.raw(),
            StageSnapshot::of_node(local),
            entry.instance.remaining_budget(now),
            &self.topology,
            now,
        );
        self.sink.borrow_mut().record(&Record::Offload(OffloadRecord {
            at: now,
            instance: entry.instance.id,
            message: entry.instance.name().to_string(),
            decision: decision.clone(),
        }));
        if decision.verdict != Verdict::Remote || stage.remote_node == entry.node {
            return false;
        }

        let remote = stage.remote_node;
        match self
            .router
            .route(&entry.instance, entry.node, &[remote], &self.topology, now)
        {
            Ok(route) => {
                entry.instance.deadline_missed |= route.deadline_missed;
                entry.path = route.path;
                entry.hop = 0;
                entry.node = route.destination;
                entry.offloaded = true;
                self.collector.offloaded += 1;
                true
            }
            Err(e) => {
                warn!(
                    instance = %entry.instance.id,
                    stage = %decision.stage,
                    error = %e,
                    "offload forward failed; executing locally"
                );
                false
            }
        }
    }

    fn on_complete(&mut self, id: InstanceId) {
        let now = self.clock;
        let Some(entry) = self.in_flight.remove(&id) else {
            return;
        };
        let instance = &entry.instance;
        if let Some(node) = self.topology.node_mut(entry.node) {
            node.state.queued_instructions = node
                .state
                .queued_instructions
                .saturating_sub(instance.template.instructions);
            node.state.queue_depth = node.state.queue_depth.saturating_sub(1);
            node.state.memory_in_use = node
                .state
                .memory_in_use
                .saturating_sub(instance.template.bytes);
            node.state.completed += 1;
        }

        let latency = now.since(instance.emitted_at);
        let met = latency <= instance.qos.deadline;
        self.collector
            .completion(instance.qos.priority, latency, met);
        debug!(
            instance = %id,
            message = instance.name(),
            node = %entry.node,
            latency,
            met,
            "SERVICE_COMPLETE"
        );

        self.sink.borrow_mut().record(&Record::Completion(CompletionRecord {
            instance: id,
            message: instance.name().to_string(),
            priority: instance.qos.priority,
            deadline: instance.qos.deadline,
            node: entry.node,
            source: instance.source_node,
            emitted_at: instance.emitted_at,
            arrived_at: entry.arrived_at,
            started_at: entry.started_at,
            completed_at: now,
            latency,
            met,
            projected_miss: instance.deadline_missed,
            offloaded: entry.offloaded,
        }));
    }

    fn routing_failure(&mut self, instance: &MessageInstance, source: NodeId, error: &RouteError) {
        warn!(
            instance = %instance.id,
            message = instance.name(),
            reason = error.reason(),
            error = %error,
            "routing failed; instance dropped"
        );
        self.collector.routing_failure(error.reason());
        self.sink.borrow_mut().record(&Record::RoutingFailure(FailureRecord {
            at: self.clock,
            instance: instance.id,
            message: instance.name().to_string(),
            priority: instance.qos.priority,
            deadline: instance.qos.deadline,
            source,
            reason: error.reason().to_string(),
            detail: error.to_string(),
        }));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::message::{MessageTemplate, Priority};
    use crate::observe::{MemorySink, NullSink};
    use crate::offload::StageSpec;
    use crate::placement::StaticPlacement;
    use crate::router::RouterKind;
    use crate::topology::{LinkAttrs, NodeAttrs};

    fn n(id: u32) -> NodeId {
        NodeId::new(id)
    }

    /// EdgeNode 0 (500) ↔ CloudNode 1 (2000), bandwidth 10, delay 2.
    fn scenario(emergency_source: NodeId) -> Scenario {
        let mut topology = Topology::new();
        topology
            .add_node(n(0), "EdgeNode", NodeAttrs { compute_rate: 500.0, memory: 1000 })
            .unwrap();
        topology
            .add_node(n(1), "CloudNode", NodeAttrs { compute_rate: 2000.0, memory: 4000 })
            .unwrap();
        for (a, b) in [(0, 1), (1, 0)] {
            topology
                .add_link(n(a), n(b), LinkAttrs { bandwidth: 10.0, delay: 2.0 })
                .unwrap();
        }

        let mut application = Application::new("TrafficMonitoring");
        application.add_service("EmergencyService").unwrap();
        application.add_service("CountingService").unwrap();
        application
            .add_message(MessageTemplate::new("Emergency", "Sensor", "EmergencyService", 500, 500))
            .unwrap();
        application
            .add_message(MessageTemplate::new("Counting", "Sensor", "CountingService", 200, 200))
            .unwrap();

        let mut placement = StaticPlacement::new();
        placement.bind("EmergencyService", vec![n(0)]);
        placement.bind("CountingService", vec![n(1)]);

        let mut qos = QosTable::new();
        qos.insert("Emergency", Qos { priority: Priority::High, deadline: 2.0 });
        qos.insert("Counting", Qos { priority: Priority::Low, deadline: 8.0 });

        Scenario {
            topology,
            application,
            placement: placement.into(),
            qos,
            router: RouterKind::Priority,
            sources: vec![Source {
                message: "Emergency".into(),
                node: emergency_source,
                period: 100.0,
                start: 0.0,
            }],
            horizon: 1000.0,
            offload: None,
        }
    }

    fn engine(scenario: Scenario) -> (Engine, Rc<RefCell<MemorySink>>) {
        let mem = Rc::new(RefCell::new(MemorySink::new()));
        let engine = Engine::new(scenario, mem.clone()).unwrap();
        (engine, mem)
    }

    #[test]
    fn local_emergency_completes_in_one_time_unit() {
        let (mut e, mem) = engine(scenario(n(0)));
        let m = e.run();
        // emissions at 0, 100, ..., 900
        assert_eq!(m.emitted, 10);
        assert_eq!(m.completed, 10);
        assert_eq!(m.deadline_misses, 0);

        let mem = mem.borrow();
        let first = mem.completions().next().unwrap();
        assert_eq!(first.arrived_at, SimTime::ZERO);
        assert_eq!(first.completed_at, SimTime::new(1.0));
        assert!(first.met);
        assert_eq!(m.per_priority[&Priority::High].latency.max, 1.0);
    }

    #[test]
    fn remote_source_pays_the_link_and_misses() {
        let (mut e, mem) = engine(scenario(n(1)));
        let m = e.run();
        let mem = mem.borrow();
        let first = mem.completions().next().unwrap();
        // 2 + 500/10 = 52, then 500/500 = 1
        assert_eq!(first.arrived_at, SimTime::new(52.0));
        assert_eq!(first.completed_at, SimTime::new(53.0));
        assert!(!first.met);
        assert_eq!(m.deadline_misses, 10);
        assert!(mem.routing().all(|r| r.deadline_missed));
    }

    #[test]
    fn horizon_cuts_off_unfinished_work() {
        let mut s = scenario(n(1));
        s.horizon = 30.0;
        let (mut e, _) = engine(s);
        let m = e.run();
        assert_eq!(m.emitted, 1);
        assert_eq!(m.completed, 0);
        assert_eq!(m.in_flight_at_horizon, 1);
    }

    #[test]
    fn utilisation_counts_busy_time_inside_horizon() {
        let (mut e, _) = engine(scenario(n(0)));
        let m = e.run();
        let edge = &m.per_node[&n(0)];
        assert_eq!(edge.busy_time, 10.0);
        assert_eq!(edge.utilization, 0.01);
        assert_eq!(edge.completed, 10);
        assert_eq!(edge.peak_memory, 500);
        assert_eq!(m.per_node[&n(1)].completed, 0);
    }

    #[test]
    fn unplaced_service_is_a_routing_failure() {
        let mut s = scenario(n(0));
        let mut placement = StaticPlacement::new();
        placement.bind("CountingService", vec![n(1)]);
        s.placement = placement.into();
        let (mut e, mem) = engine(s);
        let m = e.run();
        assert_eq!(m.emitted, 10);
        assert_eq!(m.completed, 0);
        assert_eq!(m.routing_failures.get("unplaced"), Some(&10));
        assert_eq!(mem.borrow().failures().count(), 10);
    }

    #[test]
    fn rerun_is_identical() {
        let (mut e, _) = engine(scenario(n(1)));
        let e = &mut e;
        let a = e.run();
        let b = e.run();
        assert_eq!(a, b);
    }

    #[test]
    fn event_trace_records_every_processed_event() {
        let (e, _) = engine(scenario(n(0)));
        let mut e = e.with_event_trace();
        let m = e.run();
        let trace = e.event_trace().unwrap();
        assert_eq!(trace.len() as u64, m.events_processed);
        assert_eq!(trace[0].kind.label(), "EMIT");
        assert!(trace.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn invalid_scenario_is_rejected() {
        let mut s = scenario(n(0));
        s.sources[0].node = n(9);
        let err = Engine::new(s, Rc::new(RefCell::new(MemorySink::new()))).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNode { node, .. } if node == n(9)));
    }

    /// Emergencies from the cloud node, one per start time.
    fn from_cloud_at(starts: &[f64]) -> Scenario {
        let mut s = scenario(n(1));
        s.sources = starts
            .iter()
            .map(|&start| Source {
                message: "Emergency".into(),
                node: n(1),
                period: 1000.0,
                start,
            })
            .collect();
        s.horizon = 500.0;
        s
    }

    fn arrivals(mem: &MemorySink) -> Vec<(f64, f64)> {
        let mut out: Vec<(f64, f64)> = mem
            .completions()
            .map(|c| (c.emitted_at.as_f64(), c.arrived_at.as_f64()))
            .collect();
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }

    #[test]
    fn record_stream_does_not_affect_the_run() {
        let (mut with_records, _) = engine(from_cloud_at(&[0.0, 10.0]));
        let mut silent =
            Engine::new(from_cloud_at(&[0.0, 10.0]), Rc::new(RefCell::new(NullSink))).unwrap();
        assert_eq!(with_records.run(), silent.run());
    }

    #[test]
    fn finished_transfer_frees_the_link() {
        // A is off the wire at 50, so B at 51 has the link to itself
        let (mut e, mem) = engine(from_cloud_at(&[0.0, 51.0]));
        let m = e.run();
        assert_eq!(m.completed, 2);

        let mem = mem.borrow();
        let projected: Vec<f64> = mem.routing().map(|r| r.projected_latency).collect();
        assert_eq!(projected, vec![52.0, 52.0]);
        assert_eq!(arrivals(&mem), vec![(0.0, 52.0), (51.0, 103.0)]);
        assert_eq!(e.topology().links().map(|l| l.state.in_flight()).sum::<usize>(), 0);
    }

    #[test]
    fn later_transfer_slows_an_earlier_one() {
        // at 10, A has 400 bytes left; both then send at 5/unit until A
        // finishes at 90, B sends its last 100 bytes alone by 100
        let (mut e, mem) = engine(from_cloud_at(&[0.0, 10.0]));
        e.run();

        let mem = mem.borrow();
        let projected: Vec<f64> = mem.routing().map(|r| r.projected_latency).collect();
        assert_eq!(projected, vec![52.0, 102.0]);
        assert_eq!(arrivals(&mem), vec![(0.0, 92.0), (10.0, 102.0)]);
        let a = mem.completions().find(|c| c.emitted_at == SimTime::ZERO).unwrap();
        assert_eq!(a.completed_at, SimTime::new(93.0));
        assert!(!a.projected_miss && a.source == n(1));
    }

    #[test]
    fn superseded_transmissions_are_not_counted() {
        let (e, _) = engine(from_cloud_at(&[0.0, 10.0]));
        let mut e = e.with_event_trace();
        let m = e.run();
        let trace = e.event_trace().unwrap();
        assert_eq!(trace.len() as u64, m.events_processed);
        // one TRANSMITTED per instance per link, whatever the reschedules
        let transmitted = trace.iter().filter(|t| t.kind.label() == "TRANSMITTED").count();
        assert_eq!(transmitted, 2);
    }

    #[test]
    fn multi_hop_transfer_relays_link_by_link() {
        let mut s = scenario(n(2));
        s.topology
            .add_node(n(2), "Camera", NodeAttrs { compute_rate: 100.0, memory: 100 })
            .unwrap();
        s.topology
            .add_link(n(2), n(1), LinkAttrs { bandwidth: 100.0, delay: 1.0 })
            .unwrap();
        let (mut e, mem) = engine(s);
        e.run();

        let mem = mem.borrow();
        let route = mem.routing().next().unwrap();
        assert_eq!(route.path.nodes(), &[n(2), n(1), n(0)]);
        // 500/100 + 1 on the first hop, 500/10 + 2 on the second
        let first = mem.completions().next().unwrap();
        assert_eq!(first.arrived_at, SimTime::new(58.0));
        assert_eq!(first.completed_at, SimTime::new(59.0));
        assert!(first.projected_miss);
    }

    #[test]
    fn offload_forwards_to_remote_when_local_overruns() {
        let mut s = scenario(n(0));
        // a burst of emergencies every 0.5 on a 1.0-per-job edge node
        s.sources[0].period = 0.5;
        s.horizon = 3.0;
        // fast link so the cloud can absorb the overflow
        s.topology.remove_link(n(0), n(1));
        s.topology
            .add_link(n(0), n(1), LinkAttrs { bandwidth: 1000.0, delay: 0.1 })
            .unwrap();
        s.offload = Some(OffloadScheduler::new(
            2.0,
            vec![StageSpec {
                name: "emergency".into(),
                service: Some("EmergencyService".into()),
                instructions: 500,
                bytes: 500,
                local_node: n(0),
                remote_node: n(1),
            }],
        ));
        let (mut e, mem) = engine(s);
        let m = e.run();
        assert!(m.offloaded > 0);

        let mem = mem.borrow();
        assert!(mem.offloads().any(|o| o.decision.verdict == Verdict::Remote));
        assert!(mem.completions().any(|c| c.offloaded && c.node == n(1)));
        for c in mem.completions() {
            assert!(c.emitted_at <= c.arrived_at && c.arrived_at <= c.completed_at);
        }
    }
}

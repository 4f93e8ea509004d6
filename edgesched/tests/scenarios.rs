/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! End-to-end runs of whole scenarios through the public API.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use edgesched::engine::event::TraceEntry;
use edgesched::engine::{Engine, RunMetrics};
use edgesched::message::Priority;
use edgesched::observe::{JsonLinesSink, MemorySink};
use edgesched::offload::{OffloadScheduler, Reason, StageSnapshot, StageSpec, Verdict};
use edgesched::time::SimTime;
use edgesched::topology::{LinkAttrs, NodeAttrs, NodeId, Topology};
use edgesched::ScenarioConfig;
use tempfile::NamedTempFile;

const SAMPLE: &str = include_str!("../configs/traffic_monitoring.yaml");

fn n(id: u32) -> NodeId {
    NodeId::new(id)
}

fn sample() -> ScenarioConfig {
    ScenarioConfig::from_yaml_str(SAMPLE).unwrap()
}

fn run_in_memory(config: &ScenarioConfig) -> (RunMetrics, Rc<RefCell<MemorySink>>) {
    let mem = Rc::new(RefCell::new(MemorySink::new()));
    let mut engine = Engine::new(config.build().unwrap(), mem.clone()).unwrap();
    (engine.run(), mem)
}

/// Metrics, event trace and the serialised record stream of one run.
fn run_traced(config: &ScenarioConfig) -> (RunMetrics, Vec<TraceEntry>, Vec<u8>) {
    let sink = Rc::new(RefCell::new(JsonLinesSink::new(Vec::new())));
    let mut engine = Engine::new(config.build().unwrap(), sink.clone())
        .unwrap()
        .with_event_trace();
    let metrics = engine.run();
    let trace = engine.event_trace().unwrap().to_vec();
    let bytes = sink.borrow().get_ref().clone();
    (metrics, trace, bytes)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ── Sample deployment ─────────────────────────────────────────────────────────

#[test]
fn traffic_monitoring_meets_edge_deadlines_and_misses_cloud() {
    let (m, mem) = run_in_memory(&sample());

    assert_eq!(m.emitted, 40);
    assert_eq!(m.completed, 40);
    assert_eq!(m.in_flight_at_horizon, 0);
    assert_eq!(m.routing_failure_total(), 0);
    assert_eq!(m.offloaded, 0);

    // edge services keep their deadlines, counting pays 2 + 200/10 on the link
    assert_eq!(m.per_priority[&Priority::High].latency.count, 20);
    assert_eq!(m.per_priority[&Priority::High].deadline_misses, 0);
    assert_eq!(m.per_priority[&Priority::Medium].deadline_misses, 0);
    assert_eq!(m.per_priority[&Priority::Low].deadline_misses, 10);
    assert!(close(m.per_priority[&Priority::Low].latency.max, 22.1));

    let mem = mem.borrow();
    let congestion = mem
        .completions()
        .find(|c| c.message == "Congestion")
        .unwrap();
    // queued behind Emergency on the edge: 1.0 + 0.8
    assert!(close(congestion.latency, 1.8));
    assert!(congestion.met);
    let speed = mem.completions().find(|c| c.message == "Speed").unwrap();
    assert!(close(speed.latency, 2.4));
    // the router already saw Counting's 22 against a deadline of 8
    assert!(mem
        .completions()
        .filter(|c| c.message == "Counting")
        .all(|c| c.projected_miss && c.source == n(0) && c.node == n(1)));
    assert!(mem
        .completions()
        .filter(|c| c.message != "Counting")
        .all(|c| !c.projected_miss));
}

// ── Scenario 1 ────────────────────────────────────────────────────────────────

#[test]
fn scenario1_emergency_on_edge() {
    let mut cfg = sample();
    cfg.sources.retain(|s| s.message == "Emergency");
    cfg.offload = None;

    // source co-located with the service: arrival 0, completion 1.0, met
    let (_, mem) = run_in_memory(&cfg);
    let first = mem.borrow().completions().next().cloned().unwrap();
    assert_eq!(first.arrived_at, SimTime::ZERO);
    assert_eq!(first.completed_at, SimTime::new(1.0));
    assert!(first.met);

    // source on the cloud: arrival 2 + 500/10 = 52, completion 53, missed
    cfg.sources[0].node = n(1);
    let (m, mem) = run_in_memory(&cfg);
    let first = mem.borrow().completions().next().cloned().unwrap();
    assert_eq!(first.arrived_at, SimTime::new(52.0));
    assert_eq!(first.completed_at, SimTime::new(53.0));
    assert!(!first.met);
    assert_eq!(m.deadline_misses, m.completed);
}

// ── Scenario 2 ────────────────────────────────────────────────────────────────

#[test]
fn scenario2_high_priority_routes_first_on_a_shared_link() {
    let mut cfg = sample();
    cfg.offload = None;
    // both services on the cloud; the LOW source is declared first
    cfg.placement.mapping.insert("EmergencyService".into(), vec![n(1)]);
    cfg.sources.retain(|s| s.message == "Emergency" || s.message == "Counting");
    cfg.sources.reverse();
    assert_eq!(cfg.sources[0].message, "Counting");

    let (_, mem) = run_in_memory(&cfg);
    let mem = mem.borrow();
    let at_zero: Vec<_> = mem
        .routing()
        .filter(|r| r.at == SimTime::ZERO)
        .collect();
    assert_eq!(at_zero.len(), 2);
    assert_eq!(at_zero[0].message, "Emergency");
    assert_eq!(at_zero[0].priority, Priority::High);
    assert_eq!(at_zero[1].message, "Counting");
    // Emergency had the link to itself; Counting shares it with 500 bytes
    assert_eq!(at_zero[0].projected_latency, 52.0);
    assert_eq!(at_zero[1].projected_latency, 72.0);
}

// ── Scenario 3 ────────────────────────────────────────────────────────────────

#[test]
fn scenario3_missing_link_drops_counting_and_run_continues() {
    let cfg = sample();
    let mem = Rc::new(RefCell::new(MemorySink::new()));
    let mut engine = Engine::new(cfg.build().unwrap(), mem.clone()).unwrap();
    engine.topology_mut().remove_link(n(0), n(1));
    let m = engine.run();

    assert_eq!(m.routing_failures.get("no_path"), Some(&10));
    assert_eq!(m.emitted, 40);
    assert_eq!(m.completed, 30);
    assert_eq!(m.per_priority.get(&Priority::Low), None);

    let mem = mem.borrow();
    let failure = mem.failures().next().unwrap();
    assert_eq!(failure.message, "Counting");
    assert_eq!(failure.reason, "no_path");
    assert!(failure.detail.contains("N0") && failure.detail.contains("N1"));
    // the run reached the last emission period
    assert!(mem
        .completions()
        .any(|c| c.emitted_at == SimTime::new(900.0)));
}

#[test]
fn empty_placement_is_a_routing_failure_not_a_crash() {
    let mut cfg = sample();
    cfg.placement.mapping.insert("SpeedService".into(), Vec::new());
    let (m, mem) = run_in_memory(&cfg);
    assert_eq!(m.routing_failures.get("unplaced"), Some(&10));
    assert_eq!(m.completed, 30);
    assert!(mem.borrow().failures().all(|f| f.message == "Speed"));
}

// ── Scenario 4 ────────────────────────────────────────────────────────────────

#[test]
fn scenario4_busy_edge_offloads_to_cloud() {
    let mut t = Topology::new();
    t.add_node(n(0), "EdgeNode", NodeAttrs { compute_rate: 500.0, memory: 1000 })
        .unwrap();
    t.add_node(n(1), "CloudNode", NodeAttrs { compute_rate: 2000.0, memory: 4000 })
        .unwrap();
    t.add_link(n(0), n(1), LinkAttrs { bandwidth: 1000.0, delay: 0.5 })
        .unwrap();

    let stage = StageSpec {
        name: "emergency".into(),
        service: None,
        instructions: 500,
        bytes: 500,
        local_node: n(0),
        remote_node: n(1),
    };
    let scheduler = OffloadScheduler::new(3.0, vec![stage]);
    let snapshot = StageSnapshot {
        local_queue_depth: 3,
        local_compute_rate: 500.0,
    };

    let mut snapshots = BTreeMap::new();
    snapshots.insert("emergency".to_string(), snapshot);
    let decisions = scheduler.tick(11, &snapshots, &t, SimTime::ZERO);

    assert_eq!(decisions.len(), 1);
    let d = &decisions[0];
    // local (3 + 1) × 1.0 = 4.0 > 3.0; remote 0.5 + 0.5 + 0.25 = 1.25
    assert_eq!(d.verdict, Verdict::Remote);
    assert_eq!(d.reason, Reason::RemoteWithinBudget);
    assert_eq!(d.frame_id, 11);
    assert!(close(d.remote_estimate.unwrap(), 1.25));
    assert!(!d.at_risk);
}

// ── Properties ────────────────────────────────────────────────────────────────

#[test]
fn identical_inputs_give_identical_runs() {
    let mut cfg = sample();
    // tighter periods so queues and links actually contend
    for (i, s) in cfg.sources.iter_mut().enumerate() {
        s.period = 1.5 + i as f64 * 0.25;
    }
    cfg.horizon = 200.0;

    let (m1, t1, r1) = run_traced(&cfg);
    let (m2, t2, r2) = run_traced(&cfg);
    assert_eq!(m1, m2);
    assert_eq!(t1, t2);
    assert_eq!(r1, r2);
    assert!(!r1.is_empty());
    assert!(t1.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn every_instance_is_causally_ordered() {
    let mut cfg = sample();
    // saturate the edge; keep the link free for offloaded work
    cfg.sources.retain(|s| s.message != "Counting");
    for s in &mut cfg.sources {
        s.period = 0.7;
    }
    cfg.horizon = 100.0;
    let (m, mem) = run_in_memory(&cfg);
    assert!(m.completed > 0);
    assert!(m.offloaded > 0, "a saturated edge should offload some stages");
    for c in mem.borrow().completions() {
        assert!(c.emitted_at <= c.arrived_at, "{c:?}");
        assert!(c.arrived_at <= c.started_at, "{c:?}");
        assert!(c.started_at <= c.completed_at, "{c:?}");
        assert!(close(c.latency, c.completed_at.as_f64() - c.emitted_at.as_f64()));
    }
}

#[test]
fn saved_and_reloaded_config_runs_identically() {
    let cfg = sample();
    let f = NamedTempFile::new().unwrap();
    cfg.save_to_file(f.path()).unwrap();
    let reloaded = ScenarioConfig::load_from_file(f.path()).unwrap();

    let (original, _) = run_in_memory(&cfg);
    let (again, _) = run_in_memory(&reloaded);
    assert_eq!(original, again);
}

#[test]
fn primary_router_matches_priority_router_for_single_candidates() {
    let mut cfg = sample();
    let (priority, _) = run_in_memory(&cfg);
    cfg.router = "primary".parse().unwrap();
    let (primary, _) = run_in_memory(&cfg);
    assert_eq!(priority, primary);
}

#[test]
fn metrics_serialise_to_json() {
    let (m, _) = run_in_memory(&sample());
    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["emitted"], 40);
    assert_eq!(json["per_priority"]["LOW"]["deadline_misses"], 10);
    assert!(json["per_node"]["0"]["utilization"].as_f64().unwrap() > 0.0);
}

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scenario configuration loading, saving and assembly.
//!
//! The expected YAML structure is:
//! ```yaml
//! application:
//!   name: TrafficMonitoring
//!   services: [EmergencyService, CountingService]
//!   messages:
//!     - { name: Emergency, source: Sensor, destination: EmergencyService, instructions: 500, bytes: 500 }
//! topology:
//!   nodes:
//!     - { id: 0, name: EdgeNode, compute_rate: 500, memory: 1000 }
//!   links:
//!     - { src: 0, dst: 1, bandwidth: 10, delay: 2, bidirectional: true }
//! placement:
//!   kind: static            # static | policy
//!   mapping:
//!     EmergencyService: [0]
//! qos:
//!   Emergency: { priority: HIGH, deadline: 2.0 }
//! default_qos: { priority: LOW, deadline: 999 }   # optional
//! router: priority          # priority | primary
//! sources:
//!   - { message: Emergency, node: 0, period: 100 }
//! horizon: 1000
//! offload:                  # optional
//!   deadline: 2.0
//!   stages:
//!     - { name: emergency, service: EmergencyService, instructions: 500, bytes: 500, local_node: 0, remote_node: 1 }
//! ```
//!
//! Parsing (`serde_yaml`) only checks shape.  [`ScenarioConfig::build`]
//! checks meaning and reports the first inconsistency as a
//! [`ConfigError`] naming the offending entity.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::Application;
use crate::error::ConfigError;
use crate::message::{MessageTemplate, Qos, QosTable};
use crate::offload::{OffloadScheduler, StageSpec};
use crate::placement::{Placement, PolicyPlacement, StaticPlacement};
use crate::router::RouterKind;
use crate::scenario::{Scenario, Source};
use crate::topology::{LinkAttrs, NodeAttrs, NodeId, Topology};

// ── YAML layout ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    pub name: String,
    pub services: Vec<String>,
    #[serde(default)]
    pub messages: Vec<MessageTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub id: NodeId,
    pub name: String,
    pub compute_rate: f64,
    pub memory: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    pub src: NodeId,
    pub dst: NodeId,
    pub bandwidth: f64,
    pub delay: f64,
    /// Also add the `dst → src` direction with the same attributes.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bidirectional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementKind {
    #[default]
    Static,
    Policy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlacementConfig {
    #[serde(default)]
    pub kind: PlacementKind,
    /// Static: the binding.  Policy: the candidate set.
    pub mapping: BTreeMap<String, Vec<NodeId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OffloadConfig {
    /// End-to-end pipeline deadline.
    pub deadline: f64,
    pub stages: Vec<StageSpec>,
}

/// A whole scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub application: ApplicationConfig,
    pub topology: TopologyConfig,
    pub placement: PlacementConfig,
    #[serde(default)]
    pub qos: BTreeMap<String, Qos>,
    /// Fallback for messages without a `qos` entry.  Without it such
    /// messages are a configuration error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_qos: Option<Qos>,
    #[serde(default)]
    pub router: RouterKind,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub horizon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offload: Option<OffloadConfig>,
}

// ── Loading / saving ──────────────────────────────────────────────────────────

impl ScenarioConfig {
    /// Parse a scenario from YAML text.
    ///
    /// # Errors
    /// Returns an error if the YAML is malformed, has unknown keys or misses
    /// a required section.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse scenario YAML")
    }

    /// Read and parse the scenario file at `path`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading scenario from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open scenario file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialise scenario")
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml_string()?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Cannot write scenario file: {}", path.display()))
    }

    // ── Assembly ──────────────────────────────────────────────────────────────

    /// Assemble and validate the runtime [`Scenario`].
    pub fn build(&self) -> Result<Scenario, ConfigError> {
        let topology = self.build_topology()?;
        let application = self.build_application()?;

        let placement: Placement = match self.placement.kind {
            PlacementKind::Static => {
                let mut p = StaticPlacement::new();
                for (service, nodes) in &self.placement.mapping {
                    p.bind(service.clone(), nodes.clone());
                }
                p.into()
            }
            PlacementKind::Policy => {
                let mut p = PolicyPlacement::new();
                for (service, nodes) in &self.placement.mapping {
                    p.allow(service.clone(), nodes.clone());
                }
                p.into()
            }
        };

        let mut qos = QosTable::new();
        if let Some(fallback) = self.default_qos {
            qos = qos.with_fallback(fallback);
        }
        for (message, entry) in &self.qos {
            qos.insert(message.clone(), *entry);
        }

        let offload = self
            .offload
            .as_ref()
            .map(|o| OffloadScheduler::new(o.deadline, o.stages.clone()));

        let scenario = Scenario {
            topology,
            application,
            placement,
            qos,
            router: self.router,
            sources: self.sources.clone(),
            horizon: self.horizon,
            offload,
        };
        scenario.validate()?;

        info!(
            app = %self.application.name,
            nodes = self.topology.nodes.len(),
            links = scenario.topology.links().count(),
            messages = self.application.messages.len(),
            sources = self.sources.len(),
            placement = scenario.placement.kind(),
            router = %self.router,
            "scenario assembled"
        );
        Ok(scenario)
    }

    fn build_topology(&self) -> Result<Topology, ConfigError> {
        let mut topology = Topology::new();
        for node in &self.topology.nodes {
            topology.add_node(
                node.id,
                node.name.clone(),
                NodeAttrs {
                    compute_rate: node.compute_rate,
                    memory: node.memory,
                },
            )?;
        }
        for link in &self.topology.links {
            let attrs = LinkAttrs {
                bandwidth: link.bandwidth,
                delay: link.delay,
            };
            topology.add_link(link.src, link.dst, attrs)?;
            if link.bidirectional {
                topology.add_link(link.dst, link.src, attrs)?;
            }
        }
        debug!(
            nodes = topology.node_count(),
            links = topology.links().count(),
            "topology built"
        );
        Ok(topology)
    }

    fn build_application(&self) -> Result<Application, ConfigError> {
        let mut application = Application::new(self.application.name.clone());
        for service in &self.application.services {
            application.add_service(service.clone())?;
        }
        for message in &self.application.messages {
            application.add_message(message.clone())?;
        }
        Ok(application)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Priority;
    use crate::placement::Allocate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const SAMPLE: &str = include_str!("../../configs/traffic_monitoring.yaml");

    const MINIMAL: &str = r#"
application:
  name: Mini
  services: [EmergencyService, CountingService]
  messages:
    - { name: Emergency, source: Sensor, destination: EmergencyService, instructions: 500, bytes: 500 }
    - { name: Counting, source: Sensor, destination: CountingService, instructions: 200, bytes: 200 }
topology:
  nodes:
    - { id: 0, name: EdgeNode, compute_rate: 500, memory: 1000 }
    - { id: 1, name: CloudNode, compute_rate: 2000, memory: 4000 }
  links:
    - { src: 0, dst: 1, bandwidth: 10, delay: 2, bidirectional: true }
placement:
  kind: static
  mapping:
    EmergencyService: [0]
    CountingService: [1]
qos:
  Emergency: { priority: HIGH, deadline: 2.0 }
  Counting: { priority: LOW, deadline: 8.0 }
sources:
  - { message: Emergency, node: 0, period: 100 }
horizon: 1000
"#;

    fn minimal() -> ScenarioConfig {
        ScenarioConfig::from_yaml_str(MINIMAL).unwrap()
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn sample_scenario_builds() {
        let cfg = ScenarioConfig::from_yaml_str(SAMPLE).unwrap();
        let scenario = cfg.build().unwrap();
        assert_eq!(scenario.topology.node_count(), 2);
        assert_eq!(scenario.topology.links().count(), 2);
        assert_eq!(scenario.application.messages().count(), 4);
        assert_eq!(scenario.sources.len(), 4);
        assert_eq!(scenario.router, RouterKind::Priority);
        assert!(scenario.offload.is_some());
        assert_eq!(
            scenario.qos.get("Emergency"),
            Some(Qos { priority: Priority::High, deadline: 2.0 })
        );
    }

    #[test]
    fn defaults_apply_when_optional_sections_are_absent() {
        let cfg = minimal();
        assert_eq!(cfg.router, RouterKind::Priority);
        assert_eq!(cfg.placement.kind, PlacementKind::Static);
        assert_eq!(cfg.sources[0].start, 0.0);
        assert!(cfg.default_qos.is_none());
        assert!(cfg.offload.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let yaml = MINIMAL.replace("horizon: 1000", "horizon: 1000\nhorizn: 5");
        assert!(ScenarioConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        assert!(ScenarioConfig::from_yaml_str("this is: not: valid: yaml: content:::").is_err());
    }

    #[test]
    fn missing_file_returns_error() {
        let err = ScenarioConfig::load_from_file(Path::new("/nonexistent/scenario.yaml"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Cannot open scenario file"));
    }

    // ── Assembly ──────────────────────────────────────────────────────────────

    #[test]
    fn bidirectional_link_adds_both_directions() {
        let s = minimal().build().unwrap();
        let fwd = s.topology.shortest_path(NodeId::new(0), NodeId::new(1), 1).unwrap();
        let back = s.topology.shortest_path(NodeId::new(1), NodeId::new(0), 1).unwrap();
        assert_eq!(fwd.hops(), 1);
        assert_eq!(back.hops(), 1);
    }

    #[test]
    fn message_for_unknown_service_is_rejected() {
        let mut cfg = minimal();
        cfg.application.messages[0].destination = "Nowhere".into();
        match cfg.build() {
            Err(ConfigError::Application(e)) => assert!(e.to_string().contains("Nowhere")),
            other => panic!("expected Application error, got {other:?}"),
        }
    }

    #[test]
    fn placement_on_unknown_node_is_rejected() {
        let mut cfg = minimal();
        cfg.placement
            .mapping
            .insert("CountingService".into(), vec![NodeId::new(5)]);
        assert!(matches!(
            cfg.build(),
            Err(ConfigError::UnknownNode { node, .. }) if node == NodeId::new(5)
        ));
    }

    #[test]
    fn placement_of_unknown_service_is_rejected() {
        let mut cfg = minimal();
        cfg.placement
            .mapping
            .insert("ParkingService".into(), vec![NodeId::new(0)]);
        assert!(matches!(
            cfg.build(),
            Err(ConfigError::UnknownService { service, .. }) if service == "ParkingService"
        ));
    }

    #[test]
    fn missing_qos_is_an_error_without_default() {
        let mut cfg = minimal();
        cfg.qos.remove("Counting");
        match cfg.build() {
            Err(ConfigError::MissingQos { message }) => assert_eq!(message, "Counting"),
            other => panic!("expected MissingQos, got {other:?}"),
        }
    }

    #[test]
    fn default_qos_restores_legacy_fallback() {
        let mut cfg = minimal();
        cfg.qos.remove("Counting");
        cfg.default_qos = Some(Qos::LEGACY_DEFAULT);
        let s = cfg.build().unwrap();
        assert_eq!(s.qos.get("Counting"), Some(Qos::LEGACY_DEFAULT));
    }

    #[test]
    fn qos_for_unknown_message_is_rejected() {
        let mut cfg = minimal();
        cfg.qos.insert(
            "Parking".into(),
            Qos { priority: Priority::Medium, deadline: 1.0 },
        );
        assert!(matches!(cfg.build(), Err(ConfigError::UnknownMessage { .. })));
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let mut cfg = minimal();
        cfg.sources[0].period = 0.0;
        assert!(matches!(cfg.build(), Err(ConfigError::InvalidValue { .. })));

        let mut cfg = minimal();
        cfg.horizon = -1.0;
        assert!(matches!(cfg.build(), Err(ConfigError::InvalidValue { field, .. }) if field == "horizon"));
    }

    #[test]
    fn duplicate_node_is_a_topology_error() {
        let mut cfg = minimal();
        let dup = cfg.topology.nodes[0].clone();
        cfg.topology.nodes.push(dup);
        assert!(matches!(cfg.build(), Err(ConfigError::Topology(_))));
    }

    #[test]
    fn offload_stage_with_unknown_service_is_rejected() {
        let mut cfg = minimal();
        cfg.offload = Some(OffloadConfig {
            deadline: 2.0,
            stages: vec![StageSpec {
                name: "speed".into(),
                service: Some("SpeedService".into()),
                instructions: 300,
                bytes: 300,
                local_node: NodeId::new(0),
                remote_node: NodeId::new(1),
            }],
        });
        assert!(matches!(
            cfg.build(),
            Err(ConfigError::UnknownService { service, .. }) if service == "SpeedService"
        ));
    }

    #[test]
    fn policy_kind_builds_policy_placement() {
        let mut cfg = minimal();
        cfg.placement.kind = PlacementKind::Policy;
        cfg.placement
            .mapping
            .insert("EmergencyService".into(), vec![NodeId::new(1), NodeId::new(0)]);
        let s = cfg.build().unwrap();
        assert_eq!(s.placement.kind(), "policy");
        // idle nodes: ordered by id
        assert_eq!(
            s.placement.initial_allocation("Mini", "EmergencyService", &s.topology),
            vec![NodeId::new(0), NodeId::new(1)]
        );
    }

    // ── Round-trip ────────────────────────────────────────────────────────────

    #[test]
    fn save_then_load_is_lossless() {
        let cfg = ScenarioConfig::from_yaml_str(SAMPLE).unwrap();
        let f = NamedTempFile::new().unwrap();
        cfg.save_to_file(f.path()).unwrap();
        let back = ScenarioConfig::load_from_file(f.path()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn load_from_file_reads_yaml() {
        let f = yaml_tempfile(MINIMAL);
        let cfg = ScenarioConfig::load_from_file(f.path()).unwrap();
        assert_eq!(cfg, minimal());
    }
}

/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! A fully assembled, validated simulation input.
//!
//! [`config::ScenarioConfig::build`](crate::config::ScenarioConfig::build)
//! produces one from YAML; tests may also assemble one by hand.  Either
//! way [`Scenario::validate`] runs before the engine accepts it.

use serde::{Deserialize, Serialize};

use crate::application::Application;
use crate::error::ConfigError;
use crate::message::QosTable;
use crate::offload::OffloadScheduler;
use crate::placement::Placement;
use crate::router::RouterKind;
use crate::topology::{NodeId, Topology};

/// A deterministic periodic emitter of one message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub message: String,
    /// Node the producing module runs on.
    pub node: NodeId,
    pub period: f64,
    /// First emission instant.
    #[serde(default)]
    pub start: f64,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub topology: Topology,
    pub application: Application,
    pub placement: Placement,
    pub qos: QosTable,
    pub router: RouterKind,
    pub sources: Vec<Source>,
    pub horizon: f64,
    pub offload: Option<OffloadScheduler>,
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("{value} is not a positive, finite time"),
        })
    }
}

impl Scenario {
    /// Check every cross-reference between the parts.
    ///
    /// # Errors
    /// The first inconsistency found, naming the offending entity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("horizon", self.horizon)?;

        for service in self.placement.table().keys() {
            if !self.application.has_service(service) {
                return Err(ConfigError::UnknownService {
                    context: format!("{} placement", self.placement.kind()),
                    service: service.clone(),
                });
            }
        }
        self.placement.validate(&self.topology)?;

        for (name, qos) in self.qos.entries() {
            if self.application.message(name).is_none() {
                return Err(ConfigError::UnknownMessage {
                    context: "qos table".into(),
                    message: name.clone(),
                });
            }
            positive(&format!("qos.{name}.deadline"), qos.deadline)?;
        }
        for template in self.application.messages() {
            if self.qos.get(&template.name).is_none() {
                return Err(ConfigError::MissingQos {
                    message: template.name.clone(),
                });
            }
        }

        for (i, source) in self.sources.iter().enumerate() {
            let context = format!("source #{i} ({})", source.message);
            if self.application.message(&source.message).is_none() {
                return Err(ConfigError::UnknownMessage {
                    context,
                    message: source.message.clone(),
                });
            }
            if !self.topology.contains(source.node) {
                return Err(ConfigError::UnknownNode {
                    context,
                    node: source.node,
                });
            }
            positive(&format!("sources[{i}].period"), source.period)?;
            if !(source.start.is_finite() && source.start >= 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("sources[{i}].start"),
                    reason: format!("{} is not a non-negative time", source.start),
                });
            }
        }

        if let Some(offload) = &self.offload {
            offload.validate(&self.topology)?;
            for stage in offload.stages() {
                if let Some(service) = &stage.service {
                    if !self.application.has_service(service) {
                        return Err(ConfigError::UnknownService {
                            context: format!("offload stage '{}'", stage.name),
                            service: service.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

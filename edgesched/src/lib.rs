/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! edgesched – priority- and deadline-aware discrete-event scheduler for
//! edge–cloud deployments.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── time          – simulated clock value
//! ├── error         – structured error taxonomy
//! ├── message       – priorities, QoS table, message templates / instances
//! ├── topology/     – node/link arena, shortest paths
//! ├── application   – services and message declarations
//! ├── placement/    – service → node binding, feasibility check
//! ├── router        – destination and path selection
//! ├── observe       – record stream and sinks
//! ├── offload       – per-stage local/remote decisions
//! ├── scenario      – assembled simulation input
//! ├── engine/       – event queue, run loop, metrics
//! └── config/       – YAML scenario files
//! ```

pub mod application;
pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod observe;
pub mod offload;
pub mod placement;
pub mod router;
pub mod scenario;
pub mod time;
pub mod topology;

pub use config::ScenarioConfig;
pub use engine::{Engine, RunMetrics};
pub use error::{ConfigError, NoPathError, RouteError};
pub use scenario::{Scenario, Source};

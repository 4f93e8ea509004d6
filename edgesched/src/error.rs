/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for edgesched.
//!
//! Errors fall into two layers:
//!
//! * **Structural**: [`TopologyError`], [`ApplicationError`],
//!   [`ConfigError`].  Fatal; surfaced before the simulation starts and
//!   always name the offending node / service / message.
//! * **Per-instance**: [`RouteError`] (wrapping [`NoPathError`]).  The
//!   router propagates these; the engine records them as routing failures
//!   and keeps running so aggregate metrics stay meaningful.
//!
//! Missed deadlines are *not* errors; they are flags on records and
//! decisions.

use thiserror::Error;

use crate::topology::NodeId;

// ── Topology ──────────────────────────────────────────────────────────────────

/// Rejected topology mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("node {0} is already defined")]
    DuplicateNode(NodeId),

    #[error("node {node} has invalid compute rate {rate} (must be > 0)")]
    InvalidComputeRate { node: NodeId, rate: f64 },

    #[error("link {src} -> {dst} references unknown node {missing}")]
    UnknownEndpoint {
        src: NodeId,
        dst: NodeId,
        missing: NodeId,
    },

    #[error("link {src} -> {dst} is already defined")]
    DuplicateLink { src: NodeId, dst: NodeId },

    #[error("link {node} -> {node} is a self-loop")]
    SelfLoop { node: NodeId },

    #[error("link {src} -> {dst} has invalid {field} {value}")]
    InvalidLinkAttr {
        src: NodeId,
        dst: NodeId,
        field: &'static str,
        value: f64,
    },
}

/// No chain of links connects `src` to `dst`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no path from node {src} to node {dst}")]
pub struct NoPathError {
    pub src: NodeId,
    pub dst: NodeId,
}

// ── Application graph ─────────────────────────────────────────────────────────

/// Rejected application-graph declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplicationError {
    /// A message's destination is not a service of the application.
    #[error("message '{message}' targets unknown service '{service}'")]
    UnknownService { message: String, service: String },

    #[error("service '{0}' is declared twice")]
    DuplicateService(String),

    #[error("message '{0}' is declared twice")]
    DuplicateMessage(String),
}

// ── Routing ───────────────────────────────────────────────────────────────────

/// Why a single message instance could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The destination service has an empty placement.
    #[error("service '{service}' is not placed on any node")]
    Unplaced { service: String },

    #[error(transparent)]
    NoPath(#[from] NoPathError),
}

impl RouteError {
    /// Short, stable label used as a metrics bucket.
    pub fn reason(&self) -> &'static str {
        match self {
            RouteError::Unplaced { .. } => "unplaced",
            RouteError::NoPath(_) => "no_path",
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Malformed or inconsistent scenario configuration.
///
/// | Variant | Typical cause |
/// |---|---|
/// | `Topology` / `Application` | bad node, link or message declaration |
/// | `UnknownNode` | placement, source or offload stage names a missing node |
/// | `UnknownMessage` | source or QoS entry names a missing message |
/// | `UnknownService` | placement or offload stage names a missing service |
/// | `MissingQos` | a message has no priority/deadline and no default is set |
/// | `InvalidValue` | non-positive period, horizon, deadline … |
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("application: {0}")]
    Application(#[from] ApplicationError),

    #[error("{context} references unknown node {node}")]
    UnknownNode { context: String, node: NodeId },

    #[error("{context} references unknown message '{message}'")]
    UnknownMessage { context: String, message: String },

    #[error("{context} references unknown service '{service}'")]
    UnknownService { context: String, service: String },

    #[error("message '{message}' has no priority/deadline entry and no default_qos is configured")]
    MissingQos { message: String },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

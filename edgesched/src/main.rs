/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use edgesched::engine::{Engine, RunMetrics};
use edgesched::observe::{JsonLinesSink, NullSink, SharedSink};
use edgesched::router::RouterKind;
use edgesched::ScenarioConfig;

/// Exit code when `--fail-on-routing-error` is set and instances were dropped.
const EXIT_ROUTING_FAILURES: i32 = 2;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Priority/deadline-aware edge–cloud scheduler (discrete-event simulation).
///
/// Example:
///   edgesched --config configs/traffic_monitoring.yaml --output results/
#[derive(Debug, Parser)]
#[command(name = "edgesched", version, long_about = None)]
struct Cli {
    /// Path to the YAML scenario file.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Directory receiving records.jsonl and metrics.json.
    #[arg(short = 'o', long = "output", default_value = "results")]
    output: PathBuf,

    /// Override the scenario's simulation horizon.
    #[arg(long = "horizon")]
    horizon: Option<f64>,

    /// Override the scenario's router (priority | primary).
    #[arg(long = "router")]
    router: Option<RouterKind>,

    /// Exit with status 2 if any instance could not be routed.  Without
    /// this flag routing failures are only recorded and the exit status is 0.
    #[arg(long = "fail-on-routing-error", default_value_t = false)]
    fail_on_routing_error: bool,

    /// Skip records.jsonl and write only metrics.json.
    #[arg(long = "no-records", default_value_t = false)]
    no_records: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(
        config = %cli.config.display(),
        output = %cli.output.display(),
        horizon = ?cli.horizon,
        router = ?cli.router,
        fail_on_routing_error = cli.fail_on_routing_error,
        no_records = cli.no_records,
        "edgesched starting"
    );

    let metrics = match run(&cli) {
        Ok(m) => m,
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    };

    for (priority, class) in &metrics.per_priority {
        info!(
            "  [{priority}]  completed={n}  mean={mean:.3}  p99={p99:.3}  missed={missed}",
            n = class.latency.count,
            mean = class.latency.mean,
            p99 = class.latency.p99,
            missed = class.deadline_misses,
        );
    }
    for (node, util) in &metrics.per_node {
        info!(
            "  [{node}]  utilization={u:.4}  completed={c}  peak_memory={m}",
            u = util.utilization,
            c = util.completed,
            m = util.peak_memory,
        );
    }

    let failures = metrics.routing_failure_total();
    if cli.fail_on_routing_error && failures > 0 {
        error!(failures, reasons = ?metrics.routing_failures, "instances could not be routed");
        process::exit(EXIT_ROUTING_FAILURES);
    }
}

fn run(cli: &Cli) -> Result<RunMetrics> {
    let mut config = ScenarioConfig::load_from_file(&cli.config)?;
    if let Some(horizon) = cli.horizon {
        config.horizon = horizon;
    }
    if let Some(router) = cli.router {
        config.router = router;
    }
    let scenario = config
        .build()
        .with_context(|| format!("Invalid scenario: {}", cli.config.display()))?;

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("Cannot create output directory: {}", cli.output.display()))?;

    let records = if cli.no_records {
        None
    } else {
        let path = cli.output.join("records.jsonl");
        let file = File::create(&path)
            .with_context(|| format!("Cannot create {}", path.display()))?;
        Some((path, Rc::new(RefCell::new(JsonLinesSink::new(BufWriter::new(file))))))
    };
    let sink: SharedSink = match &records {
        Some((_, jsonl)) => jsonl.clone(),
        None => Rc::new(RefCell::new(NullSink)),
    };

    let mut engine = Engine::new(scenario, sink)?;
    let metrics = engine.run();

    if let Some((path, jsonl)) = &records {
        jsonl
            .borrow_mut()
            .flush()
            .with_context(|| format!("Failed writing {}", path.display()))?;
        info!(
            records = jsonl.borrow().written(),
            records_path = %path.display(),
            "records written"
        );
    }

    let metrics_path = cli.output.join("metrics.json");
    let json = serde_json::to_string_pretty(&metrics).context("Failed to serialise metrics")?;
    fs::write(&metrics_path, json)
        .with_context(|| format!("Cannot write {}", metrics_path.display()))?;

    info!(metrics_path = %metrics_path.display(), "metrics written");
    Ok(metrics)
}

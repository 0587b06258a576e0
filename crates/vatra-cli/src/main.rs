//! Vatra CLI
//!
//! Builds a synthetic cluster and workload, runs one simulation against the
//! placement engine, and prints the end-of-run compliance and energy report.

use anyhow::{bail, Context};
use clap::Parser;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vatra_core::SState;
use vatra_engine::workload::WorkloadGenerator;
use vatra_engine::{SchedulerConfig, Simulation};

#[derive(Parser, Debug)]
#[command(name = "vatra")]
#[command(about = "Simulate the energy-aware placement engine", long_about = None)]
struct Args {
    /// Number of physical machines
    #[arg(short, long, default_value_t = 16)]
    machines: usize,

    /// Number of tasks to submit
    #[arg(short, long, default_value_t = 200)]
    tasks: usize,

    /// Simulated duration in seconds
    #[arg(short, long, default_value_t = 600)]
    duration: u64,

    /// Periodic check interval in milliseconds
    #[arg(long, default_value_t = 500)]
    tick_ms: u64,

    /// Workload seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fraction of ARM machines in the fleet
    #[arg(long, default_value_t = 0.25)]
    arm_fraction: f64,

    /// Fraction of GPU machines in the fleet
    #[arg(long, default_value_t = 0.1)]
    gpu_fraction: f64,

    /// Compress arrivals into bursts (0.0 - 1.0)
    #[arg(long, default_value_t = 0.0)]
    burstiness: f64,

    /// Sleep tier for idle machines (s0i1, s1, s2, s3, s4, s5)
    #[arg(long, default_value = "s1")]
    sleep_state: String,

    /// Lower bound on the fraction of machines kept running
    #[arg(long, default_value_t = 0.25)]
    min_on: f64,

    /// Utilisation below which a machine is a consolidation source
    #[arg(long, default_value_t = 0.3)]
    consolidation_threshold: f64,

    /// Utilisation above which an SLA warning sheds load
    #[arg(long, default_value_t = 0.8)]
    shed_threshold: f64,

    /// Down-clock lightly loaded machines on periodic checks
    #[arg(long)]
    dvfs: bool,

    /// Write the report as JSON to this path
    #[arg(short, long)]
    output: Option<String>,
}

fn parse_sleep_state(name: &str) -> anyhow::Result<SState> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "s0i1" => SState::S0i1,
        "s1" => SState::S1,
        "s2" => SState::S2,
        "s3" => SState::S3,
        "s4" => SState::S4,
        "s5" => SState::S5,
        other => bail!("unknown sleep state: {other}"),
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let sleep_state = parse_sleep_state(&args.sleep_state)?;

    let cfg = SchedulerConfig {
        sleep_state,
        calm_sleep_state: sleep_state,
        min_pm_fraction_on: args.min_on,
        consolidation_util_threshold: args.consolidation_threshold,
        sla_shed_util_threshold: args.shed_threshold,
        dvfs: args.dvfs,
        ..Default::default()
    };

    let horizon = args.duration * 1_000_000;
    let mut generator = WorkloadGenerator::new(args.seed);
    let fleet = generator.fleet(args.machines, args.arm_fraction, args.gpu_fraction);
    let tasks = generator.tasks(args.tasks, horizon * 8 / 10, &fleet, args.burstiness);

    info!(machines = fleet.len(), tasks = tasks.len(), duration_s = args.duration, "starting run");

    let mut simulation = Simulation::new(fleet, cfg);
    for task in tasks {
        simulation.submit(task);
    }
    simulation.schedule_ticks(args.tick_ms * 1_000, horizon);

    let report = simulation.run().context("simulation failed")?;

    println!("{report}");

    if let Some(path) = args.output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(&path, json).with_context(|| format!("writing report to {path}"))?;
        println!("Report written to {path}");
    }

    if !report.all_targets_met() {
        std::process::exit(1);
    }
    Ok(())
}

//! CLI glue for the cluster simulator (§1 "Out of scope": CLI glue is listed
//! as an external collaborator, specified only at its interface; this is
//! that interface).
//!
//! Grounded on `other_examples/6ca1c6d5_mfkiwl-gpucachesim__src-main.rs.rs`'s
//! `clap::Parser` + `anyhow` shape, adapted to a subcommand tree instead of
//! one flat options struct since this crate has three independent entry
//! points (generate a workload, run the simulator, emit NetSim input).

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use clustersim::config::{ClosParams, SimConfig, SolverMethod};
use clustersim::model::ModelType;
use clustersim::netsim::{emit_job_netsim_input, should_emit};
use clustersim::simulator::Simulator;
use clustersim::solver::steiner::{NoopSteinerSolver, ScipStpSolver, SteinerSolverConfig};
use clustersim::topology::{gpu_name, ClosTopology};
use clustersim::workload::{generate_random_jobs, Workload};

#[derive(Debug, Parser)]
#[command(name = "clustersim", author, version, about = "Network-traffic-aware GPU cluster scheduling simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a random workload and save it as Jobs JSON.
    Generate {
        #[arg(long, default_value_t = 50)]
        job_num: usize,
        #[arg(long, default_value_t = 10.0)]
        arrival_rate: f64,
        #[arg(long, value_delimiter = ',', default_value = "100,500,1000")]
        durations: Vec<i64>,
        #[arg(long, value_delimiter = ',', default_value = "0.4,0.8,1.0")]
        cdf_durations: Vec<f64>,
        #[arg(long, value_delimiter = ',', default_value = "8,16,32,64")]
        sizes: Vec<i64>,
        #[arg(long, value_delimiter = ',', default_value = "0.4,0.7,0.9,1.0")]
        cdf_sizes: Vec<f64>,
        #[arg(long, value_delimiter = ',', default_value = "default")]
        model_types: Vec<String>,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value = "save/jobs")]
        out_dir: PathBuf,
    },

    /// Run the simulator against a Jobs JSON and model table.
    Run {
        /// Jobs JSON (§6 "Jobs JSON").
        #[arg(long)]
        jobs: PathBuf,
        /// Model table JSON: `{model_type: {interval:[lo,hi], T, msg_len}}`.
        #[arg(long)]
        model_table: PathBuf,
        #[arg(long, default_value_t = 1024)]
        num_gpu: usize,
        #[arg(long, default_value_t = 100)]
        update_time_interval: i64,
        /// Shift solver: none, cassini, or ours.
        #[arg(long, default_value = "cassini")]
        method: String,
        /// Path to the `scipstp` executable used by `--method ours`. If
        /// omitted, the Steiner-tree step falls back to BFS (§7.1).
        #[arg(long)]
        steiner_exe: Option<PathBuf>,
    },

    /// Emit NetSim input files for every multi-server job in a workload (§6
    /// "NetSim input").
    EmitNetsim {
        #[arg(long)]
        jobs: PathBuf,
        #[arg(long)]
        model_table: PathBuf,
        #[arg(long, default_value_t = 1024)]
        num_gpu: usize,
        #[arg(long, default_value = "save/netsim_input")]
        out_dir: PathBuf,
    },
}

fn load_model_table(path: &PathBuf) -> Result<HashMap<String, ModelType>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading model table {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing model table {}", path.display()))
}

fn parse_method(s: &str) -> Result<SolverMethod> {
    match s {
        "none" => Ok(SolverMethod::None),
        "cassini" => Ok(SolverMethod::Cassini),
        "ours" => Ok(SolverMethod::Ours),
        other => anyhow::bail!("unknown solver method: {other} (expected none, cassini, or ours)"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate {
            job_num,
            arrival_rate,
            durations,
            cdf_durations,
            sizes,
            cdf_sizes,
            model_types,
            seed,
            out_dir,
        } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let workload = generate_random_jobs(
                job_num,
                arrival_rate,
                &durations,
                &cdf_durations,
                &sizes,
                &cdf_sizes,
                &model_types,
                &mut rng,
            );
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            let path = workload.save_to_json(&out_dir, &timestamp)?;
            println!("wrote {} jobs to {}", workload.jobs.len(), path.display());
        }

        Command::Run { jobs, model_table, num_gpu, update_time_interval, method, steiner_exe } => {
            let workload = Workload::load_from_json(&jobs)
                .with_context(|| format!("loading workload {}", jobs.display()))?;
            let model_types = load_model_table(&model_table)?;
            let method = parse_method(&method)?;

            let mut config = SimConfig::new(num_gpu).with_method(method);
            config.update_time_interval = update_time_interval;
            config.model_types = model_types;

            let mut simulator = Simulator::new(config, workload);
            if let Some(exe) = steiner_exe {
                simulator = simulator.with_steiner_solver(Box::new(ScipStpSolver::new(
                    SteinerSolverConfig { executable_path: exe, ..Default::default() },
                )));
            } else {
                simulator = simulator.with_steiner_solver(Box::new(NoopSteinerSolver));
            }

            simulator.run()?;
            println!(
                "simulated_time={} ended={} weighted_avg_inflation={:.4}",
                simulator.current_time(),
                simulator.ended_count(),
                simulator.weighted_average_inflation(),
            );
        }

        Command::EmitNetsim { jobs, model_table, num_gpu: _, out_dir } => {
            let workload = Workload::load_from_json(&jobs)?;
            let model_types = load_model_table(&model_table)?;
            let topology = ClosTopology::new(ClosParams::default());

            let mut emitted = 0usize;
            for job in workload.jobs.values() {
                if !should_emit(job.size) {
                    continue;
                }
                let model = model_types
                    .get(&job.model_type)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("unknown model_type {}", job.model_type))?;
                let gpu_list: Vec<String> = (0..job.size).map(gpu_name).collect();
                emit_job_netsim_input(&topology, &job.name, &gpu_list, model.msg_len, model.t, &out_dir)?;
                emitted += 1;
            }
            println!("emitted NetSim input for {emitted} jobs to {}", out_dir.display());
        }
    }

    Ok(())
}

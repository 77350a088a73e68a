//! GHS MST - asynchronous minimum spanning tree simulation
//!
//! Runs the Gallager-Humblet-Spira algorithm with one task per vertex over a
//! graph file, a generated topology, or a canonical scenario, and checks
//! the resulting tree against Kruskal.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use ghs_logging::{FileConfig, GhsSubscriberBuilder, LogConfig};
use ghs_simulation::{
    DelayModel, GraphBuilder, GraphFormat, MessageTrace, MstReport, Scenario, SimConfig,
    SimResult, Simulation, SimulationError, load_graph,
};

#[derive(Parser)]
#[command(
    name = "ghs-mst",
    about = "Asynchronous GHS minimum spanning tree simulation",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Console log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// JSON simulation config; flags below override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for reproducible delays
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Round ceiling
    #[arg(long, global = true)]
    max_rounds: Option<u64>,

    /// Smallest per-message delay, in rounds
    #[arg(long, global = true)]
    min_delay: Option<u64>,

    /// Largest per-message delay, in rounds
    #[arg(long, global = true)]
    max_delay: Option<u64>,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum TopologyKind {
    Ring,
    Line,
    Star,
    Complete,
    Grid,
    Random,
}

#[derive(Subcommand)]
enum Commands {
    /// Run on a graph file
    Run {
        /// Path to the graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Graph file format
        #[arg(short, long, value_enum, default_value_t = GraphFormat::EdgeList)]
        format: GraphFormat,

        /// Record the message trace and write it here
        #[arg(long)]
        save_trace: Option<PathBuf>,
    },

    /// Re-run a recorded trace on the same graph
    Replay {
        /// Path to the graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Graph file format
        #[arg(short, long, value_enum, default_value_t = GraphFormat::EdgeList)]
        format: GraphFormat,

        /// Trace written by `run --save-trace`
        #[arg(short, long)]
        trace: PathBuf,
    },

    /// Run a canonical scenario
    Scenario {
        #[arg(value_enum)]
        name: Scenario,
    },

    /// Generate a topology and run on it
    Topology {
        #[arg(short, long, value_enum, default_value_t = TopologyKind::Random)]
        kind: TopologyKind,

        /// Number of vertices
        #[arg(short, long, default_value = "16")]
        nodes: usize,

        /// Extra edge probability for random topologies
        #[arg(short, long, default_value = "0.2")]
        prob: f64,

        /// Largest generated weight
        #[arg(long, default_value = "100")]
        max_weight: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    log_config.console.pretty = matches!(cli.log_format, LogFormat::Pretty);
    let mut logging = GhsSubscriberBuilder::new().with_config(log_config);
    if let Some(directory) = &cli.log_dir {
        logging = logging.with_file_output(FileConfig {
            directory: directory.clone(),
            ..FileConfig::default()
        });
    }
    let _guard = logging.try_init().context("failed to initialize logging")?;

    let mut config = sim_config(&cli)?;

    let report = match &cli.command {
        Commands::Run {
            graph,
            format,
            save_trace,
        } => {
            let graph = load_graph(graph, *format)
                .with_context(|| format!("failed to load {}", graph.display()))?;
            graph.ensure_connected()?;
            config.record_trace |= save_trace.is_some();

            let report = finish(Simulation::new(graph, config).run_and_verify().await, cli.json)?;
            if let (Some(path), Some(trace)) = (save_trace, &report.trace) {
                trace
                    .save(path)
                    .with_context(|| format!("failed to write trace {}", path.display()))?;
                info!(sends = trace.len(), path = %path.display(), "Trace saved");
            }
            report
        }
        Commands::Replay {
            graph,
            format,
            trace,
        } => {
            let graph = load_graph(graph, *format)
                .with_context(|| format!("failed to load {}", graph.display()))?;
            graph.ensure_connected()?;
            let trace = MessageTrace::load(trace)
                .with_context(|| format!("failed to read trace {}", trace.display()))?;

            let simulation = Simulation::replay(graph, config, trace);
            finish(simulation.run_and_verify().await, cli.json)?
        }
        Commands::Scenario { name } => {
            finish(ghs_simulation::run_scenario(*name, config).await, cli.json)?
        }
        Commands::Topology {
            kind,
            nodes,
            prob,
            max_weight,
        } => {
            let mut builder = GraphBuilder::new(*nodes).with_max_weight(*max_weight);
            if let Some(seed) = cli.seed {
                builder = builder.with_seed(seed);
            }
            let graph = match kind {
                TopologyKind::Ring => builder.ring(),
                TopologyKind::Line => builder.line(),
                TopologyKind::Star => builder.star(),
                TopologyKind::Complete => builder.complete(),
                TopologyKind::Grid => {
                    let width = (*nodes as f64).sqrt().ceil().max(1.0) as usize;
                    builder.grid(width, nodes.div_ceil(width))
                }
                TopologyKind::Random => builder.random_connected(*prob),
            }?;
            info!(
                vertices = graph.vertex_count(),
                edges = graph.edge_count(),
                "Topology generated"
            );
            finish(Simulation::new(graph, config).run_and_verify().await, cli.json)?
        }
    };

    print_report(&report, cli.json)?;
    Ok(())
}

/// Merge the config file with command-line overrides
fn sim_config(cli: &Cli) -> anyhow::Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SimConfig::default(),
    };

    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if cli.max_rounds.is_some() {
        config.max_rounds = cli.max_rounds;
    }
    if cli.min_delay.is_some() || cli.max_delay.is_some() {
        let (min, max) = match config.delay {
            DelayModel::Uniform { min, max } => (min, max),
            DelayModel::Fixed { rounds } => (rounds, rounds),
        };
        config.delay = DelayModel::Uniform {
            min: cli.min_delay.unwrap_or(min),
            max: cli.max_delay.unwrap_or(max),
        };
    }

    config.validate()?;
    Ok(config)
}

/// Print what a failed run still produced, then fail
fn finish(result: SimResult<MstReport>, json: bool) -> anyhow::Result<MstReport> {
    match result {
        Ok(report) => Ok(report),
        Err(SimulationError::VerificationFailed { failures, report }) => {
            print_report(&report, json)?;
            for failure in &failures {
                eprintln!("verification: {}", failure);
            }
            bail!("{} verification failure(s)", failures.len())
        }
        Err(SimulationError::RoundLimitExceeded {
            limit,
            nodes,
            partial,
        }) => {
            print_report(&partial, json)?;
            bail!(
                "round limit {} reached by {} node(s) before the tree completed",
                limit,
                nodes.len()
            )
        }
        Err(err) => Err(err.into()),
    }
}

fn print_report(report: &MstReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}

//! # graph-rounds
//!
//! Runs one round-based graph algorithm over a graph file with the in-process
//! executor and prints the final records.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- conn --input graph.txt
//! cargo run -- bfs --input graph.txt --directed --source 1
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Graph file loading and record output
mod input;

// =============================================================================
// IMPORTS
// =============================================================================
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use graph_rounds::{
    Algorithm, CommunityDetection, ConnectedComponents, ForestFire, GraphKind, GraphStats,
    LocalExecutor, ObjectLocation, ObjectStore, RoundDriver, RunResult, Search,
};

use crate::config::Config;
use crate::input::{load_records, max_vertex_id, write_records, InputFormat};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "graph-rounds",
    version,
    about = "Run barrier-synchronised graph algorithms over an edge list",
    long_about = r#"
Runs one graph algorithm as a sequence of transform/merge rounds on the
in-process executor and prints the final vertex records.

SETTINGS (environment or .env):
  GRAPH_ROUNDS_PARALLELISM        tasks per round (default: CPU count)
  GRAPH_ROUNDS_MAX_ROUNDS         global round limit (default: 1000)
  GRAPH_ROUNDS_TASK_TIMEOUT_SECS  per-task timeout (default: 300)
  GRAPH_ROUNDS_RUN_TIMEOUT_SECS   whole-run timeout (default: 3600)

INPUT FORMATS (--format):
  edges      one `src dst` pair per line (default)
  vertices   one `id n1 n2 ...` line per vertex
  adjacency  ready-made adjacency records

EXAMPLES:
  graph-rounds bfs --input web.txt --directed --source 1
  graph-rounds conn --input social.txt --output labels.txt
  graph-rounds cd --input social.txt --node-preference 0.2
  graph-rounds evo --input social.txt --new-vertices 100 --seed 7
  graph-rounds stats --input social.txt
"#
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Print one JSON report per round to stderr
    #[arg(long = "report", global = true)]
    report: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Breadth-first hop distances from a source vertex
    Bfs {
        #[command(flatten)]
        graph: GraphArgs,

        /// Source vertex id
        #[arg(long, default_value_t = 1)]
        source: u64,
    },

    /// Connected components (weak components for directed graphs)
    Conn {
        #[command(flatten)]
        graph: GraphArgs,
    },

    /// Label propagation community detection
    Cd {
        #[command(flatten)]
        graph: GraphArgs,

        /// Exponent applied to neighbour degree when weighting labels
        #[arg(long, default_value_t = 0.1)]
        node_preference: f64,

        /// Score lost per hop when a label is adopted
        #[arg(long, default_value_t = 0.1)]
        hop_attenuation: f64,

        /// Maximum propagation rounds
        #[arg(long, default_value_t = 20)]
        max_iterations: usize,
    },

    /// Forest-fire graph growth
    Evo {
        #[command(flatten)]
        graph: GraphArgs,

        /// Number of vertices to add
        #[arg(long)]
        new_vertices: u64,

        /// Burn probability along out-edges
        #[arg(long, default_value_t = 0.37)]
        forward: f64,

        /// Burn probability along in-edges
        #[arg(long, default_value_t = 0.32)]
        backward: f64,

        /// Growth rounds after the init round
        #[arg(long, default_value_t = 10)]
        max_iterations: usize,

        /// Seed for the per-vertex random streams
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Vertex count, edge count and average clustering coefficient
    Stats {
        #[command(flatten)]
        graph: GraphArgs,
    },
}

/// Options shared by every algorithm
#[derive(Args, Debug)]
struct GraphArgs {
    /// Graph file to read
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    input: PathBuf,

    /// Treat edges as directed
    #[arg(short = 'd', long = "directed")]
    directed: bool,

    /// Layout of the input file
    #[arg(long = "format", value_enum, default_value_t = InputFormat::Edges)]
    format: InputFormat,

    /// Write final records here instead of stdout
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Tasks per round (overrides GRAPH_ROUNDS_PARALLELISM)
    #[arg(short = 'p', long = "parallelism", env = "GRAPH_ROUNDS_PARALLELISM")]
    parallelism: Option<usize>,
}

impl GraphArgs {
    fn kind(&self) -> GraphKind {
        if self.directed {
            GraphKind::Directed
        } else {
            GraphKind::Undirected
        }
    }
}

impl Command {
    fn graph(&self) -> &GraphArgs {
        match self {
            Command::Bfs { graph, .. }
            | Command::Conn { graph }
            | Command::Cd { graph, .. }
            | Command::Evo { graph, .. }
            | Command::Stats { graph } => graph,
        }
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut config = Config::from_env()?;
    let graph = cli.command.graph();
    if let Some(parallelism) = graph.parallelism {
        config.parallelism = Some(parallelism);
    }
    config.validate()?;

    let kind = graph.kind();
    let records = load_records(&graph.input, graph.format, kind)
        .await
        .with_context(|| format!("Failed to load {}", graph.input.display()))?;
    info!(
        input = %graph.input.display(),
        records = records.len(),
        directed = kind.is_directed(),
        "Graph loaded"
    );

    let result = match &cli.command {
        Command::Bfs { source, .. } => {
            run(&config, &Search::new(*source, kind), records, cli.report).await
        }
        Command::Conn { .. } => {
            run(&config, &ConnectedComponents::new(kind), records, cli.report).await
        }
        Command::Cd {
            node_preference,
            hop_attenuation,
            max_iterations,
            ..
        } => {
            let algorithm = CommunityDetection::new(kind)
                .with_node_preference(*node_preference)
                .with_hop_attenuation(*hop_attenuation)
                .with_max_iterations(*max_iterations);
            run(&config, &algorithm, records, cli.report).await
        }
        Command::Evo {
            new_vertices,
            forward,
            backward,
            max_iterations,
            seed,
            ..
        } => {
            let max_id = max_vertex_id(&records)?;
            let algorithm = ForestFire::new(kind, max_id, *new_vertices)
                .with_probabilities(*forward, *backward)
                .with_max_iterations(*max_iterations)
                .with_seed(*seed);
            run(&config, &algorithm, records, cli.report).await
        }
        Command::Stats { .. } => run(&config, &GraphStats::new(kind), records, cli.report).await,
    };

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "Run failed");
            return Err(e);
        }
    };

    write_records(graph.output.as_deref(), &output)
        .await
        .context("Failed to write output")?;
    Ok(())
}

/// Run one algorithm on the local executor and return its final records
async fn run<A: Algorithm>(
    config: &Config,
    algorithm: &A,
    records: Vec<String>,
    report: bool,
) -> Result<Vec<String>> {
    let round_config = config.round_config();
    let executor = Arc::new(LocalExecutor::in_memory(&round_config));
    let input = ObjectLocation::new("input");
    executor.store().put(&input, records).await?;

    let driver = RoundDriver::new(executor.clone(), round_config);
    let result: RunResult = driver
        .run_iteration(algorithm, input)
        .await
        .with_context(|| format!("{} did not complete", algorithm.name()))?;

    info!(
        algorithm = algorithm.name(),
        run_id = driver.run_id(),
        rounds = result.rounds,
        converged = result.converged,
        "Run completed"
    );
    if report {
        for round in &result.history {
            eprintln!("{}", serde_json::to_string(round)?);
        }
    }

    let output = executor.store().get(&result.output).await?;
    Ok(output.as_ref().clone())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber, honouring RUST_LOG when set
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tmgraph",
    about = "Declarative threat modeling: describe a system, evaluate the rule corpus, report findings",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter model manifest
    Init {
        /// Destination path (default: model.yaml)
        path: Option<PathBuf>,
    },

    /// Run the full pipeline over a model manifest and report findings
    Check {
        /// Model manifest path
        model: PathBuf,

        /// Hard limit on rule evaluation, in seconds
        #[arg(long, env = "TMGRAPH_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,

        /// Directory to write report artifacts into
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report both halves of request/response pairs separately
        #[arg(long)]
        no_merge: bool,
    },

    /// Show the resolved graph for a model manifest
    Graph {
        /// Model manifest path
        model: PathBuf,

        /// Emit a mermaid data-flow diagram description
        #[arg(long)]
        mermaid: bool,

        /// Diagram detail level filter
        #[arg(long)]
        level: Option<u8>,
    },

    /// List the rule corpus
    Rules,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Init { path } => cmd::init::run(path.as_deref(), cli.json),
        Commands::Check {
            model,
            timeout_secs,
            output,
            no_merge,
        } => cmd::check::run(&model, timeout_secs, output.as_deref(), no_merge, cli.json),
        Commands::Graph {
            model,
            mermaid,
            level,
        } => cmd::graph::run(&model, mermaid, level, cli.json),
        Commands::Rules => cmd::rules::run(cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

//! adaptest CLI: validate item catalogs, simulate placement tests, inspect pathways.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Adaptive placement-testing engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate adaptive sessions for known abilities
    Simulate {
        /// Path to a .toml item catalog
        #[arg(long)]
        catalog: PathBuf,

        /// True abilities to simulate (comma-separated)
        #[arg(long, default_value = "-2,-1,0,1,2", allow_hyphen_values = true)]
        theta: String,

        /// Sessions per ability (default from config)
        #[arg(long)]
        replications: Option<u32>,

        /// Random seed (default from config)
        #[arg(long)]
        seed: Option<u64>,

        /// Max concurrent sessions (default from config)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Output directory (default from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Summary format: text, markdown, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate item catalog TOML files
    Validate {
        /// Path to catalog file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the learning pathway for one simulated run
    Pathway {
        /// Catalog the report was produced from
        #[arg(long)]
        catalog: PathBuf,

        /// Simulation report JSON
        #[arg(long)]
        report: PathBuf,

        /// Index of the run within the report
        #[arg(long, default_value = "0")]
        run: usize,
    },

    /// Create starter config and example catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("adaptest=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            catalog,
            theta,
            replications,
            seed,
            parallelism,
            output,
            config,
            format,
        } => {
            commands::simulate::execute(
                catalog,
                theta,
                replications,
                seed,
                parallelism,
                output,
                config,
                format,
            )
            .await
        }
        Commands::Validate { catalog, config } => commands::validate::execute(catalog, config),
        Commands::Pathway {
            catalog,
            report,
            run,
        } => commands::pathway::execute(catalog, report, run),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

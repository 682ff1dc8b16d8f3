mod cmd;
mod config_file;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, simulate::SimulateArgs};
use intake_core::Alliance;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "intake",
    about = "Shared-intake controller: stall recovery, colour sort and arbitration",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file (default: ./intake.yaml if present, else built-in defaults)
    #[arg(long, global = true, env = "INTAKE_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run driver control against a simulated robot and report what happened
    Simulate(SimulateArgs),

    /// Classify hue readings for an alliance
    Classify {
        /// Hue in degrees, or `none` for "no object"
        #[arg(required = true, allow_negative_numbers = true)]
        hues: Vec<String>,

        /// Alliance to classify for (overrides the config)
        #[arg(long)]
        alliance: Option<Alliance>,
    },

    /// Show, validate or create the configuration file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Simulate(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let explicit = cli.config.as_deref();

    let result = match cli.command {
        Commands::Simulate(args) => {
            config_file::load(explicit).and_then(|config| cmd::simulate::run(config, args, cli.json))
        }
        Commands::Classify { hues, alliance } => config_file::load(explicit)
            .and_then(|config| cmd::classify::run(&config, &hues, alliance, cli.json)),
        Commands::Config { subcommand } => cmd::config::run(explicit, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

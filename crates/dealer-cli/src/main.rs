mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use dealer_core::config::RunMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dealer",
    about = "Autonomous dealership decision loop: generate data, run cycles, serve the dashboard",
    version,
    propagate_version = true
)]
struct Cli {
    /// Dealership root (default: nearest directory with dealer.yaml, else cwd)
    #[arg(long, global = true, env = "DEALER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write dealer.yaml and create the data and log directories
    Init,

    /// Generate synthetic inventory, competitor, inquiry and sales data
    Generate {
        /// Seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 50)]
        vehicles: usize,
        #[arg(long, default_value_t = 25)]
        inquiries: usize,
        #[arg(long, default_value_t = 150)]
        sales: usize,
    },

    /// Run a single decision cycle and exit
    Cycle {
        /// Apply accepted actions to the store (default: dry-run)
        #[arg(long)]
        live: bool,
        /// Use the offline rule-based source instead of the configured provider
        #[arg(long)]
        offline: bool,
    },

    /// Run the scheduler until interrupted
    Run {
        /// demo (short cadence, dry-run), production (long cadence, dry-run)
        /// or live (long cadence, mutates the store)
        #[arg(long, default_value = "demo")]
        mode: RunMode,
        /// Also serve the dashboard on this port, with manual trigger enabled
        #[arg(long)]
        port: Option<u16>,
        /// Use the offline rule-based source instead of the configured provider
        #[arg(long)]
        offline: bool,
        /// Don't open the browser when serving
        #[arg(long)]
        no_open: bool,
    },

    /// Show recent actions or cycles from the log
    Log {
        /// Number of records to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
        /// Show cycle records instead of actions
        #[arg(long)]
        cycles: bool,
    },

    /// Serve the read-only dashboard
    Serve {
        #[arg(long, default_value_t = 8050)]
        port: u16,
        /// Write vehicle descriptions with the offline rule-based source
        #[arg(long)]
        offline: bool,
        /// Don't open the browser
        #[arg(long)]
        no_open: bool,
    },

    /// Inspect dealer.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    // API keys and overrides may live in <root>/.env; real env vars win.
    let _ = dotenvy::from_path(root.join(".env"));

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Generate {
            seed,
            vehicles,
            inquiries,
            sales,
        } => cmd::generate::run(&root, seed, vehicles, inquiries, sales, cli.json),
        Commands::Cycle { live, offline } => cmd::cycle::run(&root, live, offline, cli.json),
        Commands::Run {
            mode,
            port,
            offline,
            no_open,
        } => cmd::run::run(&root, mode, port, offline, no_open),
        Commands::Log { limit, cycles } => cmd::log::run(&root, limit, cycles, cli.json),
        Commands::Serve {
            port,
            offline,
            no_open,
        } => cmd::serve::run(&root, port, offline, no_open),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

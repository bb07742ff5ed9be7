mod cmd;
mod output;
mod prompt;
mod root;

use clap::{Parser, Subcommand};
use cmd::{backups::BackupsSubcommand, config::ConfigSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vibe",
    about = "Terminal coding assistant: every AI-proposed change is previewed and confirmed before it runs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .vibe/ or .git/)
    #[arg(long, global = true, env = "VIBE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session with the assistant
    Chat {
        /// Don't send the repository snapshot as context
        #[arg(long)]
        no_context: bool,
    },

    /// Run the directives in a saved assistant response (no API key needed)
    Apply {
        /// File holding the response text (default: stdin)
        file: Option<PathBuf>,
    },

    /// List the directives in a response without executing anything
    Parse {
        /// File holding the response text (default: stdin)
        file: Option<PathBuf>,
    },

    /// Inspect and restore backups taken before overwrites and deletions
    Backups {
        #[command(subcommand)]
        subcommand: BackupsSubcommand,
    },

    /// Manage .vibe/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Chat { no_context } => cmd::chat::run(&root, !no_context),
        Commands::Apply { file } => cmd::apply::run(&root, file.as_deref(), cli.json),
        Commands::Parse { file } => cmd::parse::run(file.as_deref(), cli.json),
        Commands::Backups { subcommand } => cmd::backups::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

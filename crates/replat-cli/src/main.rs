mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use replat_core::ReplatError;
use cmd::migrate::MigrateArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "replat",
    about = "Analyze a repository built for another PaaS and plan its move to DigitalOcean App Platform",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log pipeline stages at debug level
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate app.yaml, env-template.yaml and MIGRATION.md for a repository
    Migrate(MigrateArgs),

    /// Rank the platforms a repository is configured for
    Detect {
        /// Repository path (default: enclosing git repository or current directory)
        repo: Option<PathBuf>,
    },

    /// Print the normalized architecture model
    Analyze {
        /// Repository path (default: enclosing git repository or current directory)
        repo: Option<PathBuf>,
    },

    /// Print the effective mapping rule table
    Rules {
        /// Extra rule file overlaid on the built-in rules
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Migrate(args) => cmd::migrate::run(args, cli.json),
        Commands::Detect { repo } => cmd::detect::run(&root::resolve_repo(repo.as_deref()), cli.json),
        Commands::Analyze { repo } => cmd::analyze::run(&root::resolve_repo(repo.as_deref()), cli.json),
        Commands::Rules { rules } => cmd::rules::run(rules.as_deref(), cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        if is_internal(&e) {
            eprintln!("This is a replat bug, not a problem with the repository. Please report it with the output of `replat analyze --json`.");
        }
        std::process::exit(1);
    }
}

/// True when the failure comes from the engine rather than from the
/// repository under analysis.
fn is_internal(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ReplatError>())
        .any(|e| !e.is_user_facing())
}

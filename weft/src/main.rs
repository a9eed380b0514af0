mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{FilterArgs, ReleaseArgs, RunArgs};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Discover monorepo packages, order them by dependency, run commands across them and release them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the workspace weft.toml (searched upwards by default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List workspace packages
    List {
        #[arg(long, action)]
        json: bool,
        /// Show each package with its workspace dependencies
        #[arg(long, action)]
        graph: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print the dependency graph
    Graph {
        #[arg(long, action, conflicts_with = "dot")]
        json: bool,
        /// Graphviz DOT output
        #[arg(long, action)]
        dot: bool,
        /// Show parallel batches instead of a flat order
        #[arg(long, action)]
        batches: bool,
    },
    /// Packages changed since a git reference
    Changed {
        #[arg(long)]
        since: String,
        /// Leave out packages that are only affected through a dependency
        #[arg(long, action)]
        no_dependents: bool,
        #[arg(long, action)]
        json: bool,
    },
    /// Explain how a package relates to the rest of the workspace
    Why { package: String },
    /// Check the workspace for cycles and invalid versions
    Validate {
        #[arg(long, action)]
        json: bool,
    },
    /// Run a workspace script in every selected package
    Run {
        script: String,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run an arbitrary command in every selected package
    Exec {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        run: RunArgs,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Bump versions, write changelogs and tag packages from their commit history
    Release {
        #[command(flatten)]
        args: ReleaseArgs,
    },
    /// Create a new workspace
    Init {
        /// Directory to initialize (defaults to the current one)
        path: Option<PathBuf>,
        /// Workspace name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_env("WEFT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::List { json, graph, filter } => commands::cmd_list(config, &filter, json, graph)?,
        Commands::Graph { json, dot, batches } => commands::cmd_graph(config, json, dot, batches)?,
        Commands::Changed {
            since,
            no_dependents,
            json,
        } => commands::cmd_changed(config, &since, !no_dependents, json)?,
        Commands::Why { package } => commands::cmd_why(config, &package)?,
        Commands::Validate { json } => commands::cmd_validate(config, json)?,
        Commands::Run { script, filter, run } => commands::cmd_run(config, &script, &filter, &run)?,
        Commands::Exec { filter, run, command } => commands::cmd_exec(config, &command, &filter, &run)?,
        Commands::Release { args } => commands::cmd_release(config, &args)?,
        Commands::Init { path, name } => commands::cmd_init(path, name.as_deref())?,
    }

    Ok(())
}

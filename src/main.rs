//! Trellis CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Symbol index, search and module hierarchy for Verilog repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the repository and save a snapshot
    Index,
    /// Search symbols, falling back to full text
    Search {
        query: String,

        /// symbol or text
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// List symbols, optionally for one file or name
    Symbols {
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long)]
        name: Option<String>,
    },
    /// Modules no other module instantiates
    Top,
    /// Modules that instantiate nothing
    Leaves,
    /// Instance tree from every top-level module
    Tree,
    /// First instantiation path found between two modules
    Path { from: String, to: String },
    /// Modules a signal flows through
    Impact { signal: String },
    /// Deepest instantiation chain
    CriticalPath,
    /// Size and depth figures for a module
    Complexity { module: String },
    /// Keep the index current as files change
    Watch {
        /// Milliseconds to wait for more changes before applying a batch
        #[arg(long, default_value = "200")]
        debounce_ms: u64,
    },
    /// Clear the cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout carries command output, logs go to stderr.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("trellis={log_level}"))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Trellis v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Repository root: {}", cli.root.display());

    let root = cli.root;
    match cli.command {
        Commands::Index => commands::index(root).await,
        Commands::Search { query, mode } => commands::search(root, query, mode).await,
        Commands::Symbols { file, name } => commands::symbols(root, file, name).await,
        Commands::Top => commands::top(root).await,
        Commands::Leaves => commands::leaves(root).await,
        Commands::Tree => commands::tree(root).await,
        Commands::Path { from, to } => commands::path(root, from, to).await,
        Commands::Impact { signal } => commands::impact(root, signal).await,
        Commands::CriticalPath => commands::critical_path(root).await,
        Commands::Complexity { module } => commands::complexity(root, module).await,
        Commands::Watch { debounce_ms } => commands::watch(root, debounce_ms).await,
        Commands::Clear => commands::clear(root),
        Commands::Version => {
            println!("Trellis v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_path_help_describes_first_path_found() {
        let cli = Cli::command();
        let path = cli.find_subcommand("path").unwrap();
        let about = path.get_about().unwrap().to_string();
        assert_eq!(about, "First instantiation path found between two modules");
    }
}

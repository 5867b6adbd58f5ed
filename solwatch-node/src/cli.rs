use clap::{Parser, Subcommand};

/// The main CLI structure for the solwatch node.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Defines the available subcommands for the application.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the address watcher.
    /// This starts the subscription worker and keeps it running until Ctrl+C.
    Run(RunCmd),
    /// Mark an address as queried now, so the next reconciliation watches it.
    Watch(WatchCmd),
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to the node configuration TOML file.
    /// If not provided, default values will be used.
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Arguments for the `watch` subcommand.
#[derive(Parser, Debug)]
pub struct WatchCmd {
    /// Base58 address to watch.
    #[arg(short, long)]
    pub address: String,

    #[arg(short, long)]
    pub config: Option<String>,
}

use std::io::IsTerminal;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dnslookup::{Resolver, ResolverConfig};
use tokio::io::BufReader;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::shell::Shell;

mod shell;

#[derive(Parser)]
#[command(name = "dnslookup")]
#[command(version)]
#[command(about = "Iterative DNS lookups starting from a root server")]
struct Cli {
    /// IP address of the root server every lookup starts at
    root_server: IpAddr,

    /// TOML file with resolver settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(ResolverConfig::from_file) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
        None => ResolverConfig::default(),
    };

    // The command line wins over the file
    let config = ResolverConfig {
        root_server: cli.root_server,
        ..config
    };

    let interactive = std::io::stdin().is_terminal();
    let mut shell = Shell::new(Resolver::new(config), std::io::stdout(), interactive);

    if let Err(e) = shell.run(BufReader::new(tokio::io::stdin())).await {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

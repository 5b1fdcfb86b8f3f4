//! Sentinel CLI - Command-line interface for the crypto agent network
//!
//! Usage:
//!   sentinel                              - Start interactive mode
//!   sentinel ask <question>               - Ask the agents once
//!   sentinel ask -t coin_info -p coin=ETH - Send a typed request
//!   sentinel alarm check <id> <sql>       - Evaluate an alarm condition once
//!   sentinel watch --alarm id=<sql>       - Monitor alarms and stream events
//!   sentinel topology                     - Show the agent graph

use clap::{Parser, Subcommand};
use cli::commands::{AlarmCommand, AskCommand, GlobalOptions, TopologyCommand, WatchCommand};
use cli::interactive::InteractiveCli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Sentinel - Multi-agent crypto market assistant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agents a question or send a typed request
    Ask(AskCommand),
    /// Alarm utilities
    Alarm(AlarmCommand),
    /// Watch alarms and agent traffic
    Watch(WatchCommand),
    /// Show the agent graph
    Topology(TopologyCommand),
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        config: cli.config,
        json: cli.json,
    };

    match cli.command {
        Some(Commands::Ask(cmd)) => cmd.run(&options),
        Some(Commands::Alarm(cmd)) => cmd.run(&options),
        Some(Commands::Watch(cmd)) => cmd.run(&options),
        Some(Commands::Topology(cmd)) => cmd.run(&options),
        None => {
            let session = options.open_session()?;
            let mut interactive = InteractiveCli::new(session, options.json);
            interactive.run()
        }
    }
}

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use sequencing::RunOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Rolling deployments behind a load balancer", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Deployment file (default: $STAGEHAND_CONFIG or ./stagehand.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the deployment
    Deploy(DeployArgs),

    /// Show what a deployment would do, without doing it
    Plan(RolloutArgs),

    /// Check the deployment file and every step
    Validate,

    /// List servers in deployment order
    Servers(ServersArgs),

    /// List available load balancer providers
    Providers,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Partial rollout switches
#[derive(Args, Clone, Copy, Default)]
pub struct RolloutArgs {
    /// Deploy only to the server marked stop_server (or the first) and leave it offline
    #[arg(long)]
    pub stop_after_marked_server: bool,

    /// Put the marked server back online and deploy to all other servers
    #[arg(long)]
    pub continue_after_marked_server: bool,
}

impl RolloutArgs {
    pub fn options(self) -> RunOptions {
        RunOptions {
            stop_after_marked_server: self.stop_after_marked_server,
            continue_after_marked_server: self.continue_after_marked_server,
        }
    }
}

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub rollout: RolloutArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ServersArgs {
    #[command(flatten)]
    pub rollout: RolloutArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

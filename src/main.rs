use anyhow::Result;
use clap::{Parser, Subcommand};
use secrules_bouncer::cli;

#[derive(Parser)]
#[command(name = "secrules-bouncer")]
#[command(version = secrules_bouncer::VERSION)]
#[command(about = "Forward-auth WAF bouncer driven by SecLang rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision rules and start the authorization server
    Serve(cli::serve::ServeArgs),

    /// Configuration management
    Config(cli::config::ConfigArgs),

    /// Rule source management
    Rules(cli::rules::RulesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => cli::serve::run(args).await,
        Commands::Config(args) => cli::config::run(args).await,
        Commands::Rules(args) => cli::rules::run(args).await,
    }
}

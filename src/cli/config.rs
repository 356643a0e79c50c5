use crate::config::{parser, Config};
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate a configuration file
    Check {
        #[arg(short, long, default_value = super::DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Write a configuration file with default values
    Init {
        #[arg(short, long, default_value = "bouncer.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Check { config } => {
            println!("Checking configuration: {}", config.display());

            let mut cfg = Config::from_file(&config)?;
            cfg.apply_overrides(std::env::vars())?;
            let warnings = cfg.validate();

            if warnings.is_empty() {
                println!("[OK] Configuration is valid!");
                return Ok(());
            }

            println!("Configuration loaded with warnings:\n");
            for warning in &warnings {
                println!("{}", warning);
            }
            if warnings.iter().any(|w| w.starts_with("[X]")) {
                bail!("Configuration has errors");
            }
            Ok(())
        }

        ConfigCommand::Init { output, force } => {
            if output.exists() && !force {
                bail!(
                    "{} already exists, use --force to overwrite",
                    output.display()
                );
            }
            parser::save_config(&Config::default(), &output)?;
            println!("[OK] Wrote default configuration to {}", output.display());
            Ok(())
        }
    }
}

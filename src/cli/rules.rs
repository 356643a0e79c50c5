use crate::bridge::RequestContext;
use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::provision::provision_engine;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand)]
pub enum RulesCommand {
    /// Download and load every configured rule source, then report counts
    Fetch {
        #[arg(short, long, default_value = super::DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Evaluate one synthetic request against the provisioned rules
    Test {
        #[arg(short, long, default_value = super::DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Client IP address
        #[arg(long)]
        ip: String,

        /// Protected server port
        #[arg(long, default_value_t = 80)]
        port: u16,

        /// Protected server host
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Extra request header as `Name: value`, repeatable
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub async fn run(args: RulesArgs) -> Result<()> {
    match args.command {
        RulesCommand::Fetch { config } => {
            let cfg = load(&config)?;
            let metrics = Arc::new(MetricsCollector::new()?);
            let (bridge, loaded) = provision_engine(&cfg.sec_rules, metrics)
                .await
                .context("Rule provisioning failed")?;

            println!("=== Rule Sources ===");
            println!();
            for source in &loaded {
                println!("  {:<14} {} rule(s)", source.kind.as_str(), source.rules);
            }
            println!();
            println!("[OK] {} rule(s) loaded", bridge.rule_count());
            Ok(())
        }

        RulesCommand::Test {
            config,
            ip,
            port,
            host,
            headers,
        } => {
            let cfg = load(&config)?;
            let metrics = Arc::new(MetricsCollector::new()?);
            let (bridge, _) = provision_engine(&cfg.sec_rules, metrics)
                .await
                .context("Rule provisioning failed")?;

            let ctx = RequestContext::new(ip, cfg.client_port, host, port).with_headers(headers);
            println!("=== Testing {} -> {}:{} ===", ctx.client_ip, ctx.server_ip, ctx.server_port);
            println!();

            match bridge.authorize(&ctx)? {
                None => println!("[OK] Allowed (200)"),
                Some(interruption) => {
                    println!(
                        "[X] Interrupted by rule {}",
                        interruption.rule_id.as_deref().unwrap_or("(no id)")
                    );
                    println!("   Status: {}", interruption.status);
                    if let Some(url) = &interruption.redirect {
                        println!("   Redirect: {}", url);
                    }
                    if let Some(message) = &interruption.message {
                        println!("   Message: {}", message);
                    }
                }
            }
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<Config> {
    let mut config = Config::from_file(path)?;
    config.apply_overrides(std::env::vars())?;
    Ok(config)
}

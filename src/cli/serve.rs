use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::provision::provision_engine;
use crate::server::{self, AuthorizationService};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args)]
pub struct ServeArgs {
    /// Path to configuration file, created with defaults when missing
    #[arg(short, long, env = "BOUNCER_CONFIG", default_value = super::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = Config::load(&args.config)?;

    crate::logging::init_logging(&config.logging.level, &config.logging.format)?;

    info!("Starting secrules-bouncer v{}", crate::VERSION);
    info!("Loaded configuration from: {}", args.config.display());

    for warning in config.validate() {
        warn!("{}", warning);
    }

    let metrics = Arc::new(MetricsCollector::new().context("Failed to register metrics")?);
    let (bridge, loaded) = provision_engine(&config.sec_rules, metrics)
        .await
        .context("Rule provisioning failed")?;
    for source in &loaded {
        info!(source = %source.kind, rules = source.rules, "Rule source ready");
    }

    let service = Arc::new(AuthorizationService::new(
        bridge,
        config.healthz_route.clone(),
        config.client_port,
    ));

    server::serve(&config.server, service).await
}

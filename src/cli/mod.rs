pub mod config;
pub mod rules;
pub mod serve;

pub use config::ConfigArgs;
pub use rules::RulesArgs;
pub use serve::ServeArgs;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bouncer/config.toml";

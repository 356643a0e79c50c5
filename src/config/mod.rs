pub mod env;
pub mod parser;
pub mod validator;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding file values.
pub const ENV_PREFIX: &str = "BOUNCER_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Client port reported to the engine for forwarded requests
    #[serde(default = "default_client_port")]
    pub client_port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sec_rules: SecRulesConfig,
    #[serde(default)]
    pub healthz_route: HealthzRouteConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Where rules come from and where downloaded rules are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecRulesConfig {
    /// Inline rules loaded after every other source except `custom_path`
    #[serde(default)]
    pub custom_rule: String,
    /// File, directory or glob of operator rules, loaded last
    #[serde(default = "default_custom_path")]
    pub custom_path: String,
    #[serde(default = "default_downloaded_path")]
    pub downloaded_path: PathBuf,
    #[serde(default = "default_true")]
    pub recommended_enabled: bool,
    #[serde(default = "default_recommended_url")]
    pub recommended_url: String,
    #[serde(default = "default_true")]
    pub owasp_enabled: bool,
    #[serde(default = "default_owasp_url")]
    pub owasp_url: String,
    /// SHA-1 of the OWASP archive; the check is skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owasp_sha: Option<String>,
    #[serde(default = "default_owasp_example_file")]
    pub owasp_example_file: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

/// Synthetic connection evaluated by the health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthzRouteConfig {
    #[serde(default = "default_healthz_client_ip")]
    pub client_ip: String,
    #[serde(default = "default_healthz_client_port")]
    pub client_port: u16,
    #[serde(default = "default_healthz_server_ip")]
    pub server_ip: String,
    #[serde(default = "default_healthz_server_port")]
    pub server_port: u16,
}

fn default_client_port() -> u16 {
    5489
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_path() -> String {
    "/api/v1".to_string()
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_custom_path() -> String {
    "/etc/bouncer/rules/custom/*".to_string()
}

fn default_downloaded_path() -> PathBuf {
    PathBuf::from("/etc/bouncer/rules/downloaded")
}

fn default_recommended_url() -> String {
    "https://raw.githubusercontent.com/jptosso/coraza-waf/v2/master/coraza.conf-recommended".to_string()
}

fn default_owasp_url() -> String {
    "https://github.com/coreruleset/coreruleset/archive/refs/tags/v3.3.2.tar.gz".to_string()
}

fn default_owasp_example_file() -> String {
    "crs-setup.conf.example".to_string()
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_healthz_client_ip() -> String {
    "192.168.1.1".to_string()
}

fn default_healthz_client_port() -> u16 {
    12345
}

fn default_healthz_server_ip() -> String {
    "10.42.1.1".to_string()
}

fn default_healthz_server_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_port: default_client_port(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            sec_rules: SecRulesConfig::default(),
            healthz_route: HealthzRouteConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SecRulesConfig {
    fn default() -> Self {
        Self {
            custom_rule: String::new(),
            custom_path: default_custom_path(),
            downloaded_path: default_downloaded_path(),
            recommended_enabled: true,
            recommended_url: default_recommended_url(),
            owasp_enabled: true,
            owasp_url: default_owasp_url(),
            owasp_sha: None,
            owasp_example_file: default_owasp_example_file(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for HealthzRouteConfig {
    fn default() -> Self {
        Self {
            client_ip: default_healthz_client_ip(),
            client_port: default_healthz_client_port(),
            server_ip: default_healthz_server_ip(),
            server_port: default_healthz_server_port(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        parser::parse_config(path)
    }

    /// Read the config file, writing one with defaults first when it does
    /// not exist, then apply `BOUNCER_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            parser::save_config(&Config::default(), path)?;
        }
        let mut config = parser::parse_config(path)?;
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        env::apply_overrides(self, vars)
    }

    pub fn validate(&self) -> Vec<String> {
        validator::validate_config(self)
    }
}

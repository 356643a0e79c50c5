//! Rule provisioning: download, verify and unpack rule sources, then load
//! them into the engine in a fixed order.

pub mod archive;
pub mod error;
pub mod fetch;
pub mod integrity;

pub use archive::{ExtractedRuleSet, OWASP_DIR};
pub use error::{ExtractError, FetchError, IntegrityError, ProvisionError};
pub use fetch::RemoteFetcher;

use crate::bridge::EngineBridge;
use crate::config::SecRulesConfig;
use crate::metrics::MetricsCollector;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// File name of the downloaded recommended configuration.
pub const RECOMMENDED_FILE: &str = "coraza.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSourceKind {
    Recommended,
    OwaspSetup,
    OwaspRules,
    CustomRule,
    CustomPath,
}

impl RuleSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::OwaspSetup => "owasp-setup",
            Self::OwaspRules => "owasp-rules",
            Self::CustomRule => "custom-rule",
            Self::CustomPath => "custom-path",
        }
    }
}

impl fmt::Display for RuleSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLocation {
    Text(String),
    /// File, directory or glob pattern
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSource {
    pub kind: RuleSourceKind,
    pub location: RuleLocation,
}

/// Number of rules a source added to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub kind: RuleSourceKind,
    pub rules: usize,
}

/// Rule sources in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionPlan {
    sources: Vec<RuleSource>,
}

impl ProvisionPlan {
    pub fn sources(&self) -> &[RuleSource] {
        &self.sources
    }

    fn push(&mut self, kind: RuleSourceKind, location: RuleLocation) {
        self.sources.push(RuleSource { kind, location });
    }

    /// Load every source in order. Stops at the first source that fails to
    /// parse.
    pub fn load_into(&self, bridge: &mut EngineBridge) -> Result<Vec<LoadedSource>, ProvisionError> {
        let mut loaded = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let result = match &source.location {
                RuleLocation::Text(text) => bridge.load_from_string(text),
                RuleLocation::Path(path) => bridge.load_from_file(path),
            };
            let rules = result.map_err(|error| ProvisionError::Load {
                source_name: source.kind.to_string(),
                error,
            })?;
            info!(source = %source.kind, rules, total = bridge.rule_count(), "Loaded rule source");
            loaded.push(LoadedSource {
                kind: source.kind,
                rules,
            });
        }
        Ok(loaded)
    }
}

/// Provision every configured source and load it into a fresh engine.
pub async fn provision_engine(
    config: &SecRulesConfig,
    metrics: Arc<MetricsCollector>,
) -> Result<(EngineBridge, Vec<LoadedSource>), ProvisionError> {
    let plan = RuleSourceProvisioner::new(config.clone())?.provision().await?;
    let mut bridge = EngineBridge::new(metrics);
    let loaded = plan.load_into(&mut bridge)?;
    info!(sources = loaded.len(), rules = bridge.rule_count(), "Rule provisioning complete");
    Ok((bridge, loaded))
}

/// Materializes the configured rule sources on disk.
pub struct RuleSourceProvisioner {
    config: SecRulesConfig,
    fetcher: RemoteFetcher,
}

impl RuleSourceProvisioner {
    pub fn new(config: SecRulesConfig) -> Result<Self, ProvisionError> {
        let fetcher = RemoteFetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
        Ok(Self { config, fetcher })
    }

    /// Recommended config, then the OWASP setup file and bulk rules, then
    /// the custom inline rules and the custom path. Any failure aborts.
    pub async fn provision(&self) -> Result<ProvisionPlan, ProvisionError> {
        let mut plan = ProvisionPlan::default();
        let downloaded = &self.config.downloaded_path;

        if self.config.recommended_enabled {
            let destination = downloaded.join(RECOMMENDED_FILE);
            self.fetcher
                .fetch(&self.config.recommended_url, &destination)
                .await?;
            plan.push(RuleSourceKind::Recommended, RuleLocation::Path(destination));
        }

        if self.config.owasp_enabled {
            let extracted = self.provision_owasp().await?;
            match extracted.example_file {
                Some(example) => plan.push(RuleSourceKind::OwaspSetup, RuleLocation::Path(example)),
                None => warn!(
                    file = %self.config.owasp_example_file,
                    "OWASP archive has no setup file"
                ),
            }
            plan.push(
                RuleSourceKind::OwaspRules,
                RuleLocation::Path(extracted.source_dir.join("*.conf")),
            );
        }

        plan.push(
            RuleSourceKind::CustomRule,
            RuleLocation::Text(self.config.custom_rule.clone()),
        );
        if !self.config.custom_path.trim().is_empty() {
            plan.push(
                RuleSourceKind::CustomPath,
                RuleLocation::Path(PathBuf::from(&self.config.custom_path)),
            );
        }

        Ok(plan)
    }

    async fn provision_owasp(&self) -> Result<ExtractedRuleSet, ProvisionError> {
        let scratch = std::env::temp_dir().join(format!("bouncer-coreruleset-{}.tar.gz", Uuid::new_v4()));
        let result = self.fetch_and_extract(&scratch).await;

        if let Err(e) = fs::remove_file(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch.display(), "Failed to remove downloaded archive: {}", e);
            }
        }
        result
    }

    async fn fetch_and_extract(&self, scratch: &Path) -> Result<ExtractedRuleSet, ProvisionError> {
        self.fetcher.fetch(&self.config.owasp_url, scratch).await?;

        if let Some(expected) = self.config.owasp_sha.clone() {
            let archive = scratch.to_path_buf();
            tokio::task::spawn_blocking(move || integrity::verify(&archive, &expected)).await??;
        }

        let downloaded = self.config.downloaded_path.clone();
        let owasp_dir = downloaded.join(OWASP_DIR);
        if owasp_dir.exists() {
            fs::remove_dir_all(&owasp_dir)
                .await
                .map_err(|source| ProvisionError::Io {
                    path: owasp_dir.clone(),
                    source,
                })?;
        }
        fs::create_dir_all(&owasp_dir)
            .await
            .map_err(|source| ProvisionError::Io {
                path: owasp_dir.clone(),
                source,
            })?;

        let archive = scratch.to_path_buf();
        let example = self.config.owasp_example_file.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            archive::extract(&archive, &downloaded, &example)
        })
        .await??;

        info!(
            url = %self.config.owasp_url,
            files = extracted.files_written,
            path = %extracted.source_dir.display(),
            "Extracted OWASP rules"
        );
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline_config(dir: &Path) -> SecRulesConfig {
        SecRulesConfig {
            custom_rule: r#"SecRule REMOTE_ADDR "@rx 2.2.2.2" "id:1,phase:1,deny,status:403""#.to_string(),
            custom_path: dir.join("custom/*").to_string_lossy().into_owned(),
            downloaded_path: dir.join("downloaded"),
            recommended_enabled: false,
            owasp_enabled: false,
            ..SecRulesConfig::default()
        }
    }

    #[tokio::test]
    async fn test_offline_plan_order() {
        let dir = TempDir::new().unwrap();
        let provisioner = RuleSourceProvisioner::new(offline_config(dir.path())).unwrap();
        let plan = provisioner.provision().await.unwrap();

        let kinds: Vec<_> = plan.sources().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![RuleSourceKind::CustomRule, RuleSourceKind::CustomPath]);
    }

    #[tokio::test]
    async fn test_plan_loads_custom_sources() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("custom")).unwrap();
        std::fs::write(
            dir.path().join("custom/block.conf"),
            "SecRule REMOTE_ADDR \"@rx 3.3.3.3\" \"id:2,phase:1,deny,status:403\"\n",
        )
        .unwrap();

        let provisioner = RuleSourceProvisioner::new(offline_config(dir.path())).unwrap();
        let plan = provisioner.provision().await.unwrap();

        let mut bridge = EngineBridge::new(Arc::new(MetricsCollector::new().unwrap()));
        let loaded = plan.load_into(&mut bridge).unwrap();
        assert_eq!(
            loaded,
            vec![
                LoadedSource { kind: RuleSourceKind::CustomRule, rules: 1 },
                LoadedSource { kind: RuleSourceKind::CustomPath, rules: 1 },
            ]
        );
        assert_eq!(bridge.metrics().rules_loaded(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_recommended_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = offline_config(dir.path());
        config.recommended_enabled = true;
        config.recommended_url = "http://127.0.0.1:1/coraza.conf".to_string();
        config.fetch_timeout_secs = 2;

        let provisioner = RuleSourceProvisioner::new(config).unwrap();
        let err = provisioner.provision().await.unwrap_err();
        assert!(matches!(err, ProvisionError::Fetch(_)));
    }

    #[test]
    fn test_load_error_names_source() {
        let plan = ProvisionPlan {
            sources: vec![RuleSource {
                kind: RuleSourceKind::CustomRule,
                location: RuleLocation::Text(
                    r#"SecRule ARGS "@noSuchOperator x" "id:9,phase:1,deny""#.to_string(),
                ),
            }],
        };
        let mut bridge = EngineBridge::new(Arc::new(MetricsCollector::new().unwrap()));
        let err = plan.load_into(&mut bridge).unwrap_err();
        assert!(err.to_string().contains("custom-rule"));
    }
}

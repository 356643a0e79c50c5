//! Bridge between forwarded requests and the rule engine.

pub mod context;
pub mod error;

pub use context::{is_routing_header, RequestContext, ROUTING_HEADERS};
pub use error::{EngineError, LoadError};

use crate::metrics::MetricsCollector;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zentinel_modsec::engine::ruleset::CompiledRuleset;
use zentinel_modsec::parser::Parser;
use zentinel_modsec::{Intervention, ModSecurity, Transaction};

const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

/// Verdict of a request that matched a disruptive rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption {
    pub rule_id: Option<String>,
    pub status: u16,
    pub redirect: Option<String>,
    pub message: Option<String>,
}

impl From<&Intervention> for Interruption {
    fn from(intervention: &Intervention) -> Self {
        Self {
            rule_id: intervention.rule_ids.first().cloned(),
            status: intervention.status,
            redirect: intervention.url.clone(),
            message: intervention.log.clone(),
        }
    }
}

/// Decides whether a forwarded request may pass.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, ctx: &RequestContext) -> Result<Option<Interruption>, EngineError>;
}

/// Owns the engine, its parser and the rule metrics.
///
/// Every load feeds the parser and recompiles the whole directive list, so
/// `SecDefaultAction` and `SecRuleRemoveById` from earlier sources apply to
/// later ones. Once provisioning is over the bridge is shared behind an `Arc`
/// and only [`EngineBridge::authorize`] is called.
///
/// A failed load leaves the engine on its previous rules but the parser may
/// hold part of the rejected source; provisioning discards the bridge then.
pub struct EngineBridge {
    parser: Parser,
    engine: ModSecurity,
    metrics: Arc<MetricsCollector>,
}

impl EngineBridge {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            parser: Parser::new(),
            engine: ModSecurity::new(CompiledRuleset::new()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn rule_count(&self) -> usize {
        self.engine.rule_count()
    }

    /// Load rules from text. Returns the number of rules added.
    pub fn load_from_string(&mut self, rules: &str) -> Result<usize, LoadError> {
        self.parser.parse(rules)?;
        self.recompile()
    }

    /// Load rules from a file, a directory (its `*.conf` files) or a glob
    /// pattern. Returns the number of rules added.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize, LoadError> {
        let path = path.as_ref();
        let raw = path
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(path.to_path_buf()))?;

        if raw.contains(['*', '?', '[']) {
            self.parser.parse_glob(raw)?;
        } else if path.is_dir() {
            let pattern = path.join("*.conf");
            let pattern = pattern
                .to_str()
                .ok_or_else(|| LoadError::InvalidPath(path.to_path_buf()))?;
            self.parser.parse_glob(pattern)?;
        } else {
            self.parser.parse_file(path)?;
        }
        self.recompile()
    }

    fn recompile(&mut self) -> Result<usize, LoadError> {
        let before = self.engine.rule_count();
        let ruleset = CompiledRuleset::compile(self.parser.directives().to_vec())?;
        self.engine = ModSecurity::new(ruleset);

        let total = self.engine.rule_count();
        let loaded = usize::try_from(self.metrics.rules_loaded()).unwrap_or_default();
        if total < loaded {
            debug!(total, loaded, "Rule removals lowered the active rule count");
        }
        self.metrics.set_rules_loaded(total.max(loaded));

        let added = total.saturating_sub(before);
        debug!(added, total, "Rules loaded");
        Ok(added)
    }

    /// Evaluate the request headers phase for one request.
    ///
    /// The transaction is finalized on every path, including errors.
    pub fn authorize(&self, ctx: &RequestContext) -> Result<Option<Interruption>, EngineError> {
        let mut scope = TransactionScope::new(self.engine.new_transaction());
        let id = scope.id.as_str();
        let tx = &mut scope.tx;
        let failed = |stage: &'static str| {
            move |source| EngineError::Transaction {
                id: id.to_string(),
                stage,
                source,
            }
        };

        tx.set_client_addr(&ctx.client_ip, ctx.client_port);
        tx.set_server_addr(&ctx.server_ip, ctx.server_port);
        tx.set_server_name(&ctx.server_ip);
        if let (Some(method), Some(uri)) = (ctx.method.as_deref(), ctx.uri.as_deref()) {
            let protocol = ctx.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
            tx.process_uri(uri, method, protocol).map_err(failed("uri"))?;
        }
        for (name, value) in ctx.headers.iter().filter(|(name, _)| !is_routing_header(name)) {
            tx.add_request_header(name, value)
                .map_err(failed("request header"))?;
        }
        tx.process_request_headers()
            .map_err(failed("request headers phase"))?;

        let Some(mut interruption) = tx.intervention().map(Interruption::from) else {
            return Ok(None);
        };

        self.metrics.inc_requests_interrupted();
        if interruption.status < 300 {
            warn!(
                transaction = %id,
                rule_id = ?interruption.rule_id,
                status = interruption.status,
                "Rule requested a non-rejecting status, using 403"
            );
            interruption.status = 403;
        }
        info!(
            transaction = %id,
            client_ip = %ctx.client_ip,
            rule_id = ?interruption.rule_id,
            status = interruption.status,
            message = ?interruption.message,
            "Transaction interrupted"
        );
        Ok(Some(interruption))
    }
}

impl Authorizer for EngineBridge {
    fn authorize(&self, ctx: &RequestContext) -> Result<Option<Interruption>, EngineError> {
        EngineBridge::authorize(self, ctx)
    }
}

impl fmt::Debug for EngineBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBridge")
            .field("rule_count", &self.engine.rule_count())
            .field("directives", &self.parser.directives().len())
            .finish()
    }
}

/// Runs the logging phase when dropped.
struct TransactionScope {
    id: String,
    tx: Transaction,
}

impl TransactionScope {
    fn new(tx: Transaction) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tx,
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if let Err(e) = self.tx.process_logging() {
            warn!(transaction = %self.id, "Failed to process logging phase: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> EngineBridge {
        EngineBridge::new(Arc::new(MetricsCollector::new().unwrap()))
    }

    fn ctx(client_ip: &str) -> RequestContext {
        RequestContext::new(client_ip, 5489, "10.42.1.1", 8080)
    }

    #[test]
    fn test_load_updates_gauge() {
        let mut bridge = bridge();
        let added = bridge
            .load_from_string("SecAction \"id:1,phase:1,pass\"\nSecAction \"id:2,phase:1,pass\"")
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(bridge.metrics().rules_loaded(), 2);

        bridge.load_from_string("SecAction \"id:3,phase:1,pass\"").unwrap();
        assert_eq!(bridge.metrics().rules_loaded(), 3);
    }

    #[test]
    fn test_failed_load_keeps_rules_and_gauge() {
        let mut bridge = bridge();
        bridge.load_from_string("SecAction \"id:1,phase:1,pass\"").unwrap();
        assert!(bridge
            .load_from_string(r#"SecRule ARGS "@noSuchOperator x" "id:2,phase:1,deny""#)
            .is_err());
        assert_eq!(bridge.rule_count(), 1);
        assert_eq!(bridge.metrics().rules_loaded(), 1);
    }

    #[test]
    fn test_gauge_does_not_drop_on_rule_removal() {
        let mut bridge = bridge();
        bridge
            .load_from_string("SecAction \"id:1,phase:1,pass\"\nSecAction \"id:2,phase:1,pass\"")
            .unwrap();
        assert_eq!(bridge.load_from_string("SecRuleRemoveById 1").unwrap(), 0);

        assert_eq!(bridge.rule_count(), 1);
        assert_eq!(bridge.metrics().rules_loaded(), 2);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let mut bridge = bridge();
        assert!(bridge.load_from_file("/nonexistent/rules.conf").is_err());
    }

    #[test]
    fn test_load_from_directory_and_empty_glob() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.conf"), "SecAction \"id:1,phase:1,pass\"\n").unwrap();
        std::fs::write(dir.path().join("b.conf"), "SecAction \"id:2,phase:1,pass\"\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not rules").unwrap();

        let mut bridge = bridge();
        assert_eq!(bridge.load_from_file(dir.path()).unwrap(), 2);
        assert_eq!(bridge.load_from_file(dir.path().join("missing/*")).unwrap(), 0);
    }

    #[test]
    fn test_authorize_interrupts_and_counts() {
        let mut bridge = bridge();
        bridge
            .load_from_string(r#"SecRule REMOTE_ADDR "@rx 2.2.2.2" "id:1,phase:1,deny,status:403""#)
            .unwrap();

        let interruption = bridge.authorize(&ctx("2.2.2.2")).unwrap().unwrap();
        assert_eq!(interruption.status, 403);
        assert_eq!(interruption.rule_id.as_deref(), Some("1"));
        assert_eq!(bridge.metrics().requests_interrupted(), 1);

        assert!(bridge.authorize(&ctx("1.1.1.1")).unwrap().is_none());
        assert_eq!(bridge.metrics().requests_interrupted(), 1);
    }

    #[test]
    fn test_detection_operators_are_active() {
        let mut bridge = bridge();
        bridge
            .load_from_string(
                r#"SecRule REQUEST_HEADERS:User-Agent "@detectSQLi" "id:942100,phase:1,deny,status:403""#,
            )
            .unwrap();

        let attack = ctx("1.1.1.1")
            .with_headers(vec![("User-Agent".to_string(), "1' OR '1'='1' --".to_string())]);
        let interruption = bridge.authorize(&attack).unwrap().unwrap();
        assert_eq!(interruption.rule_id.as_deref(), Some("942100"));

        let benign = ctx("1.1.1.1").with_headers(vec![("User-Agent".to_string(), "curl/8.0".to_string())]);
        assert!(bridge.authorize(&benign).unwrap().is_none());
    }

    #[test]
    fn test_status_below_300_is_normalized() {
        let mut bridge = bridge();
        bridge
            .load_from_string(r#"SecRule REMOTE_ADDR "@rx ^2\." "id:1,phase:1,deny,status:200""#)
            .unwrap();
        let interruption = bridge.authorize(&ctx("2.2.2.2")).unwrap().unwrap();
        assert_eq!(interruption.status, 403);
    }

    #[test]
    fn test_routing_headers_are_not_evaluated() {
        let mut bridge = bridge();
        bridge
            .load_from_string(r#"SecRule REQUEST_HEADERS:X-Real-Ip "@rx ." "id:1,phase:1,deny""#)
            .unwrap();
        let ctx = ctx("1.1.1.1").with_headers(vec![
            ("X-Real-Ip".to_string(), "1.1.1.1".to_string()),
            ("x-forwarded-port".to_string(), "443".to_string()),
        ]);
        assert!(bridge.authorize(&ctx).unwrap().is_none());
    }
}

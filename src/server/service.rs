use crate::bridge::context::{HEADER_FORWARDED_HOST, HEADER_FORWARDED_PORT, HEADER_REAL_IP};
use crate::bridge::{is_routing_header, Authorizer, EngineBridge, RequestContext};
use crate::config::HealthzRouteConfig;
use crate::metrics::{export_metrics, MetricsCollector};
use anyhow::Result;
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Traefik forwards the original request line in these headers.
pub const HEADER_FORWARDED_METHOD: &str = "X-Forwarded-Method";
pub const HEADER_FORWARDED_URI: &str = "X-Forwarded-Uri";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("missing {0} header")]
    Missing(&'static str),

    #[error("invalid {header} header: {value}")]
    Invalid { header: &'static str, value: String },
}

/// Answers the bouncer endpoints from the loaded engine.
pub struct AuthorizationService {
    authorizer: Box<dyn Authorizer>,
    metrics: Arc<MetricsCollector>,
    healthz: HealthzRouteConfig,
    client_port: u16,
}

impl AuthorizationService {
    pub fn new(bridge: EngineBridge, healthz: HealthzRouteConfig, client_port: u16) -> Self {
        let metrics = Arc::clone(bridge.metrics());
        Self::with_authorizer(Box::new(bridge), metrics, healthz, client_port)
    }

    pub fn with_authorizer(
        authorizer: Box<dyn Authorizer>,
        metrics: Arc<MetricsCollector>,
        healthz: HealthzRouteConfig,
        client_port: u16,
    ) -> Self {
        Self {
            authorizer,
            metrics,
            healthz,
            client_port,
        }
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn ping(&self) -> &'static str {
        "pong"
    }

    /// Evaluate the configured synthetic connection.
    pub fn healthz(&self) -> StatusCode {
        let ctx = RequestContext::new(
            &self.healthz.client_ip,
            self.healthz.client_port,
            &self.healthz.server_ip,
            self.healthz.server_port,
        );
        match self.authorizer.authorize(&ctx) {
            Ok(None) => StatusCode::OK,
            Ok(Some(interruption)) => status_code(interruption.status),
            Err(e) => {
                error!("Health check evaluation failed: {}", e);
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Evaluate a request forwarded by the proxy. Anything that prevents a
    /// proper evaluation answers 403.
    pub fn forward_auth(&self, headers: &HeaderMap) -> StatusCode {
        self.metrics.inc_requests_processed();

        let ctx = match self.context_from_headers(headers) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("Rejecting forwarded request: {}", e);
                return StatusCode::FORBIDDEN;
            }
        };

        match self.authorizer.authorize(&ctx) {
            Ok(None) => StatusCode::OK,
            Ok(Some(interruption)) => status_code(interruption.status),
            Err(e) => {
                error!(client_ip = %ctx.client_ip, "Request evaluation failed: {}", e);
                StatusCode::FORBIDDEN
            }
        }
    }

    pub fn metrics(&self) -> Result<String> {
        export_metrics(self.metrics.registry())
    }

    pub fn context_from_headers(&self, headers: &HeaderMap) -> Result<RequestContext, HeaderError> {
        let raw_port = header_value(headers, HEADER_FORWARDED_PORT)
            .ok_or(HeaderError::Missing(HEADER_FORWARDED_PORT))?;
        let server_port = raw_port
            .trim()
            .parse::<u16>()
            .map_err(|_| HeaderError::Invalid {
                header: HEADER_FORWARDED_PORT,
                value: raw_port.clone(),
            })?;

        let client_ip = header_value(headers, HEADER_REAL_IP).unwrap_or_default();
        let server_host = header_value(headers, HEADER_FORWARDED_HOST).unwrap_or_default();

        let forwarded: Vec<(String, String)> = headers
            .iter()
            .filter(|(name, _)| !is_routing_header(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let mut ctx = RequestContext::new(client_ip, self.client_port, server_host, server_port)
            .with_headers(forwarded);

        if let (Some(method), Some(uri)) = (
            header_value(headers, HEADER_FORWARDED_METHOD),
            header_value(headers, HEADER_FORWARDED_URI),
        ) {
            ctx = ctx.with_request_line(method, uri, None);
        }

        debug!(
            client_ip = %ctx.client_ip,
            server = %ctx.server_ip,
            port = ctx.server_port,
            headers = ctx.headers.len(),
            "Built request context"
        );
        Ok(ctx)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN)
}

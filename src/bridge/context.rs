/// Header carrying the client address.
pub const HEADER_REAL_IP: &str = "X-Real-Ip";
/// Header carrying the protected server host.
pub const HEADER_FORWARDED_HOST: &str = "X-Forwarded-Host";
/// Header carrying the protected server port.
pub const HEADER_FORWARDED_PORT: &str = "X-Forwarded-Port";

/// Headers that carry connection identity and are never evaluated as
/// request headers.
pub const ROUTING_HEADERS: [&str; 3] = [HEADER_REAL_IP, HEADER_FORWARDED_HOST, HEADER_FORWARDED_PORT];

pub fn is_routing_header(name: &str) -> bool {
    ROUTING_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Request as seen by the engine, built fresh for every evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub client_ip: String,
    pub client_port: u16,
    pub server_ip: String,
    pub server_port: u16,
    pub method: Option<String>,
    pub uri: Option<String>,
    pub protocol: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl RequestContext {
    pub fn new(
        client_ip: impl Into<String>,
        client_port: u16,
        server_ip: impl Into<String>,
        server_port: u16,
    ) -> Self {
        Self {
            client_ip: client_ip.into(),
            client_port,
            server_ip: server_ip.into(),
            server_port,
            method: None,
            uri: None,
            protocol: None,
            headers: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_request_line(
        mut self,
        method: impl Into<String>,
        uri: impl Into<String>,
        protocol: Option<String>,
    ) -> Self {
        self.method = Some(method.into());
        self.uri = Some(uri.into());
        self.protocol = protocol;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_header_match_ignores_case() {
        assert!(is_routing_header("x-real-ip"));
        assert!(is_routing_header("X-FORWARDED-HOST"));
        assert!(!is_routing_header("X-Forwarded-Uri"));
    }
}

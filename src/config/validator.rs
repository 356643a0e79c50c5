use super::Config;
use std::net::IpAddr;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["json", "pretty", "compact"];

pub fn validate_config(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.server.port < 1024 {
        warnings.push(format!(
            "[!] Port {} requires root privileges. Consider using a port >= 1024",
            config.server.port
        ));
    }

    if !config.server.base_path.starts_with('/') {
        warnings.push(format!(
            "[X] Base path '{}' must start with '/'",
            config.server.base_path
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        warnings.push(format!(
            "[X] Invalid log level: {}. Must be one of: {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        warnings.push(format!(
            "[X] Invalid log format: {}. Must be one of: {}",
            config.logging.format,
            LOG_FORMATS.join(", ")
        ));
    }

    let rules = &config.sec_rules;
    if rules.recommended_enabled && rules.recommended_url.trim().is_empty() {
        warnings.push("[X] Recommended rules enabled but recommended_url is empty".to_string());
    }

    if rules.owasp_enabled {
        if rules.owasp_url.trim().is_empty() {
            warnings.push("[X] OWASP rules enabled but owasp_url is empty".to_string());
        }
        match rules.owasp_sha.as_deref().map(str::trim) {
            None | Some("") => warnings.push(
                "[*] owasp_sha is not set. The downloaded OWASP archive will not be verified"
                    .to_string(),
            ),
            Some(sha) if sha.len() != 40 || !sha.chars().all(|c| c.is_ascii_hexdigit()) => {
                warnings.push(format!(
                    "[X] owasp_sha '{}' is not a 40 character hex SHA-1 digest",
                    sha
                ))
            }
            Some(_) => {}
        }
        if rules.owasp_example_file.trim().is_empty() {
            warnings.push(
                "[!] owasp_example_file is empty. CRS setup variables will not be loaded"
                    .to_string(),
            );
        }
    }

    if !rules.recommended_enabled
        && !rules.owasp_enabled
        && rules.custom_rule.trim().is_empty()
        && rules.custom_path.trim().is_empty()
    {
        warnings.push("[!] No rule source configured. Every request will be allowed".to_string());
    }

    if rules.fetch_timeout_secs == 0 {
        warnings.push("[X] fetch_timeout_secs cannot be 0".to_string());
    }

    let healthz = &config.healthz_route;
    for (field, value) in [
        ("client_ip", &healthz.client_ip),
        ("server_ip", &healthz.server_ip),
    ] {
        if value.parse::<IpAddr>().is_err() {
            warnings.push(format!(
                "[!] healthz_route.{} '{}' is not an IP address",
                field, value
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_only_recommends_sha() {
        let warnings = validate_config(&Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("[*]"));
        assert!(warnings[0].contains("owasp_sha"));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.server.base_path = "api".to_string();
        config.logging.level = "loud".to_string();
        config.logging.format = "xml".to_string();
        config.sec_rules.owasp_sha = Some("xyz".to_string());
        config.healthz_route.client_ip = "localhost".to_string();

        let warnings = validate_config(&config);
        assert!(warnings.iter().any(|w| w.contains("Base path")));
        assert!(warnings.iter().any(|w| w.contains("log level")));
        assert!(warnings.iter().any(|w| w.contains("log format")));
        assert!(warnings.iter().any(|w| w.contains("not a 40 character")));
        assert!(warnings.iter().any(|w| w.contains("healthz_route.client_ip")));
    }

    #[test]
    fn test_no_rule_source() {
        let mut config = Config::default();
        config.sec_rules.recommended_enabled = false;
        config.sec_rules.owasp_enabled = false;
        config.sec_rules.custom_path.clear();
        let warnings = validate_config(&config);
        assert!(warnings.iter().any(|w| w.contains("No rule source")));
    }
}

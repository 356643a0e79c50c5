use super::{Config, ENV_PREFIX};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("Invalid value for {}: {}", key, value))
}

/// Apply `BOUNCER_<SECTION>_<FIELD>` variables on top of the file values.
pub fn apply_overrides<I>(config: &mut Config, vars: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        match name {
            "CLIENT_PORT" => config.client_port = parse(&key, &value)?,
            "SERVER_HOST" => config.server.host = value,
            "SERVER_PORT" => config.server.port = parse(&key, &value)?,
            "SERVER_BASE_PATH" => config.server.base_path = value,
            "SERVER_SHUTDOWN_TIMEOUT_SECS" => {
                config.server.shutdown_timeout_secs = parse(&key, &value)?
            }
            "LOGGING_LEVEL" => config.logging.level = value,
            "LOGGING_FORMAT" => config.logging.format = value,
            "SEC_RULES_CUSTOM_RULE" => config.sec_rules.custom_rule = value,
            "SEC_RULES_CUSTOM_PATH" => config.sec_rules.custom_path = value,
            "SEC_RULES_DOWNLOADED_PATH" => {
                config.sec_rules.downloaded_path = PathBuf::from(value)
            }
            "SEC_RULES_RECOMMENDED_ENABLED" => {
                config.sec_rules.recommended_enabled = parse(&key, &value)?
            }
            "SEC_RULES_RECOMMENDED_URL" => config.sec_rules.recommended_url = value,
            "SEC_RULES_OWASP_ENABLED" => config.sec_rules.owasp_enabled = parse(&key, &value)?,
            "SEC_RULES_OWASP_URL" => config.sec_rules.owasp_url = value,
            "SEC_RULES_OWASP_SHA" => {
                config.sec_rules.owasp_sha = Some(value).filter(|v| !v.trim().is_empty())
            }
            "SEC_RULES_OWASP_EXAMPLE_FILE" => config.sec_rules.owasp_example_file = value,
            "SEC_RULES_FETCH_TIMEOUT_SECS" => {
                config.sec_rules.fetch_timeout_secs = parse(&key, &value)?
            }
            "HEALTHZ_ROUTE_CLIENT_IP" => config.healthz_route.client_ip = value,
            "HEALTHZ_ROUTE_CLIENT_PORT" => config.healthz_route.client_port = parse(&key, &value)?,
            "HEALTHZ_ROUTE_SERVER_IP" => config.healthz_route.server_ip = value,
            "HEALTHZ_ROUTE_SERVER_PORT" => config.healthz_route.server_port = parse(&key, &value)?,
            _ => {
                debug!(variable = %key, "Ignoring unknown environment override");
                continue;
            }
        }
        debug!(variable = %key, "Applied environment override");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            vars(&[
                ("BOUNCER_SEC_RULES_CUSTOM_RULE", "SecAction \"id:1,pass\""),
                ("BOUNCER_SEC_RULES_OWASP_ENABLED", "false"),
                ("BOUNCER_HEALTHZ_ROUTE_CLIENT_IP", "3.3.3.3"),
                ("BOUNCER_SERVER_PORT", "9000"),
                ("PATH", "/usr/bin"),
            ]),
        )
        .unwrap();

        assert_eq!(config.sec_rules.custom_rule, "SecAction \"id:1,pass\"");
        assert!(!config.sec_rules.owasp_enabled);
        assert_eq!(config.healthz_route.client_ip, "3.3.3.3");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let mut config = Config::default();
        let err = apply_overrides(&mut config, vars(&[("BOUNCER_SERVER_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("BOUNCER_SERVER_PORT"));
    }

    #[test]
    fn test_empty_sha_override_clears() {
        let mut config = Config::default();
        config.sec_rules.owasp_sha = Some("abc".to_string());
        apply_overrides(&mut config, vars(&[("BOUNCER_SEC_RULES_OWASP_SHA", "")])).unwrap();
        assert_eq!(config.sec_rules.owasp_sha, None);
    }
}

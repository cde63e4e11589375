//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ShopConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ShopConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
///
/// Environment references in string values are expanded before
/// deserialization, so `cert_path = "${CERT_DIR}/server.pem"` works.
pub fn parse_config(content: &str) -> Result<ShopConfig, ConfigError> {
    let mut raw: toml::Value = toml::from_str(content)?;
    expand_env_values(&mut raw);
    let config: ShopConfig = raw.try_into()?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn expand_env_values(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => *s = expand_env(s, |name| std::env::var(name).ok()),
        toml::Value::Array(items) => items.iter_mut().for_each(expand_env_values),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| expand_env_values(v)),
        _ => {}
    }
}

/// Expand `$VAR` and `${VAR}` references. Unset variables expand to "".
fn expand_env(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, '{')) => {
                chars.next();
                let start = i + 2;
                match input[start..].find('}') {
                    Some(len) => {
                        let name = &input[start..start + len];
                        out.push_str(&lookup(name).unwrap_or_default());
                        while chars.peek().is_some_and(|&(j, _)| j <= start + len) {
                            chars.next();
                        }
                    }
                    // unterminated, keep literally
                    None => out.push_str(&input[i..start]),
                }
            }
            Some(&(start, next)) if next.is_ascii_alphabetic() || next == '_' => {
                let mut end = start;
                while let Some(&(j, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        end = j + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&lookup(&input[start..end]).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "CERT_DIR" => Some("/etc/shop".to_string()),
            "PORT" => Some("9443".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_env_forms() {
        assert_eq!(expand_env("${CERT_DIR}/cert.pem", lookup), "/etc/shop/cert.pem");
        assert_eq!(expand_env("$CERT_DIR/key.pem", lookup), "/etc/shop/key.pem");
        assert_eq!(expand_env("0.0.0.0:$PORT", lookup), "0.0.0.0:9443");
        assert_eq!(expand_env("${MISSING}x", lookup), "x");
        assert_eq!(expand_env("cost: 5$", lookup), "cost: 5$");
        assert_eq!(expand_env("${UNTERMINATED", lookup), "${UNTERMINATED");
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = parse_config(
            r#"
            [server]
            cert_path = "certs/server.pem"
            key_path = "certs/server.key"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:8443");
        assert_eq!(config.server.cert_path, "certs/server.pem");
        assert_eq!(config.server.client_ca_path, "test-certs/ca-cert.pem");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_expands_environment() {
        std::env::set_var("SHOP_LOADER_TEST_DIR", "/srv/tls");
        let config = parse_config(
            r#"
            [server]
            cert_path = "${SHOP_LOADER_TEST_DIR}/cert.pem"
            key_path = "$SHOP_LOADER_TEST_DIR/key.pem"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        std::env::remove_var("SHOP_LOADER_TEST_DIR");

        assert_eq!(config.server.cert_path, "/srv/tls/cert.pem");
        assert_eq!(config.server.key_path, "/srv/tls/key.pem");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_expand_env_values_reaches_nested_tables() {
        std::env::set_var("SHOP_LOADER_NESTED", "expanded");
        let mut value: toml::Value = toml::from_str(
            r#"
            top = "$SHOP_LOADER_NESTED"

            [outer.inner]
            leaf = "${SHOP_LOADER_NESTED}/leaf"
            list = ["$SHOP_LOADER_NESTED", 3]
            "#,
        )
        .unwrap();
        expand_env_values(&mut value);
        std::env::remove_var("SHOP_LOADER_NESTED");

        assert_eq!(value["top"].as_str(), Some("expanded"));
        let inner = &value["outer"]["inner"];
        assert_eq!(inner["leaf"].as_str(), Some("expanded/leaf"));
        assert_eq!(inner["list"][0].as_str(), Some("expanded"));
        assert_eq!(inner["list"][1].as_integer(), Some(3));
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = parse_config(
            r#"
            [server]
            bind_address = "not-an-address"
            cert_path = ""

            [timeouts]
            request_secs = 0
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/shop.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

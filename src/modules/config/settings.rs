use std::time::Duration;
use thiserror::Error;

use crate::modules::auth::password::DEFAULT_HASH_ITERATIONS;
use crate::modules::auth::tokens::TokenConfig;
use crate::modules::email::smtp::{SmtpCredentials, DEFAULT_SMTP_PORT};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_VERIFY_PATH: &str = "/api/v1/auth/verify";
pub const DEFAULT_SENDER_NAME: &str = "Account Service";
/// Upper bound for any configured lifetime: ten years
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Where verification links point to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub scheme: String,
    /// Public domain; when set the port is left out of links
    pub domain: Option<String>,
    pub port: u16,
    pub verify_path: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            domain: None,
            port: DEFAULT_PORT,
            verify_path: DEFAULT_VERIFY_PATH.to_string(),
        }
    }
}

/// Process configuration for the account core.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub tokens: TokenConfig,
    pub link: LinkConfig,
    pub code_ttl: Option<Duration>,
    pub hash_iterations: u32,
    pub sender_name: String,
    pub smtp: Option<SmtpCredentials>,
}

impl ServiceConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            tokens: TokenConfig::new(secret),
            link: LinkConfig::default(),
            code_ttl: None,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            smtp: None,
        }
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.link.domain = Some(domain.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.link.port = port;
        self
    }

    /// Expire reset codes after `ttl`; zero leaves codes without expiry
    pub fn code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self
    }

    pub fn hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations;
        self
    }

    pub fn smtp(mut self, creds: SmtpCredentials) -> Self {
        self.smtp = Some(creds);
        self
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secret = get("SECRET").ok_or(ConfigError::Missing("SECRET"))?;
        let mut config = Self::new(secret);

        if let Some(ttl) = parse_ttl(&get, "ACCESS_TOKEN_TTL_SECS")? {
            config.tokens = config.tokens.access_ttl(ttl);
        }
        if let Some(ttl) = parse_ttl(&get, "VERIFICATION_TOKEN_TTL_SECS")? {
            config.tokens = config.tokens.verification_ttl(ttl);
        }
        config.code_ttl = parse_ttl(&get, "CODE_TTL_SECS")?;
        if let Some(iterations) = parse_var(&get, "HASH_ITERATIONS")? {
            config.hash_iterations = iterations;
        }

        config.link.domain = get("DOMAIN");
        if let Some(port) = parse_var(&get, "PORT")? {
            config.link.port = port;
        }
        if let Some(scheme) = get("SCHEME") {
            config.link.scheme = scheme;
        }
        if let Some(path) = get("VERIFY_PATH") {
            config.link.verify_path = path;
        }
        if let Some(name) = get("MAIL_SENDER_NAME") {
            config.sender_name = name;
        }

        config.smtp = match (get("MAIL_USER"), get("SMTP_HOST")) {
            (Some(username), Some(host)) => Some(SmtpCredentials {
                username,
                password: get("SMTP_PASSWORD").ok_or(ConfigError::Missing("SMTP_PASSWORD"))?,
                host,
                port: parse_var(&get, "SMTP_PORT")?.unwrap_or(DEFAULT_SMTP_PORT),
            }),
            _ => None,
        };

        if config.tokens.verification_ttl > config.tokens.access_ttl {
            log::warn!("Verification tokens outlive access tokens; check the configured TTLs");
        }

        Ok(config)
    }
}

fn parse_var<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

// Lifetimes must be at least one second and no longer than MAX_TTL_SECS
fn parse_ttl<G>(get: &G, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match parse_var::<u64, _>(get, key)? {
        None => Ok(None),
        Some(secs) if secs == 0 || secs > MAX_TTL_SECS => Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
        }),
        Some(secs) => Ok(Some(Duration::from_secs(secs))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::tokens::{DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_VERIFICATION_TOKEN_TTL};
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_secret_is_required() {
        assert_eq!(
            ServiceConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("SECRET")
        );
        assert_eq!(
            ServiceConfig::from_lookup(lookup(&[("SECRET", "  ")])).unwrap_err(),
            ConfigError::Missing("SECRET")
        );
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[("SECRET", "s3cret")])).unwrap();

        assert_eq!(config.link, LinkConfig::default());
        assert_eq!(config.tokens.access_ttl, DEFAULT_ACCESS_TOKEN_TTL);
        assert_eq!(config.tokens.verification_ttl, DEFAULT_VERIFICATION_TOKEN_TTL);
        assert_eq!(config.code_ttl, None);
        assert_eq!(config.hash_iterations, DEFAULT_HASH_ITERATIONS);
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SECRET", "s3cret"),
            ("DOMAIN", "accounts.example.com"),
            ("PORT", "8080"),
            ("SCHEME", "https"),
            ("ACCESS_TOKEN_TTL_SECS", "900"),
            ("VERIFICATION_TOKEN_TTL_SECS", "300"),
            ("CODE_TTL_SECS", "600"),
            ("MAIL_USER", "noreply@example.com"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PASSWORD", "app-password"),
        ]))
        .unwrap();

        assert_eq!(config.link.domain.as_deref(), Some("accounts.example.com"));
        assert_eq!(config.link.port, 8080);
        assert_eq!(config.link.scheme, "https");
        assert_eq!(config.tokens.access_ttl, Duration::from_secs(900));
        assert_eq!(config.tokens.verification_ttl, Duration::from_secs(300));
        assert_eq!(config.code_ttl, Some(Duration::from_secs(600)));

        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
    }

    #[test]
    fn test_invalid_numbers_are_reported() {
        let err = ServiceConfig::from_lookup(lookup(&[("SECRET", "s"), ("PORT", "eighty")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn test_lifetimes_must_be_positive_and_bounded() {
        for key in [
            "ACCESS_TOKEN_TTL_SECS",
            "VERIFICATION_TOKEN_TTL_SECS",
            "CODE_TTL_SECS",
        ] {
            assert_eq!(
                ServiceConfig::from_lookup(lookup(&[("SECRET", "s"), (key, "0")])).unwrap_err(),
                ConfigError::Invalid {
                    key,
                    value: "0".to_string()
                }
            );
            assert_eq!(
                ServiceConfig::from_lookup(lookup(&[
                    ("SECRET", "s"),
                    (key, "18446744073709551615")
                ]))
                .unwrap_err(),
                ConfigError::Invalid {
                    key,
                    value: "18446744073709551615".to_string()
                }
            );
        }

        let max = MAX_TTL_SECS.to_string();
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SECRET", "s"),
            ("ACCESS_TOKEN_TTL_SECS", max.as_str()),
        ]))
        .unwrap();
        assert_eq!(config.tokens.access_ttl, Duration::from_secs(MAX_TTL_SECS));
    }

    #[test]
    fn test_zero_code_ttl_means_no_expiry() {
        let config = ServiceConfig::new("s").code_ttl(Duration::ZERO);
        assert_eq!(config.code_ttl, None);

        let config = ServiceConfig::new("s").code_ttl(Duration::from_secs(600));
        assert_eq!(config.code_ttl, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_smtp_needs_password() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("SECRET", "s"),
            ("MAIL_USER", "noreply@example.com"),
            ("SMTP_HOST", "smtp.example.com"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("SMTP_PASSWORD"));
    }
}

//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use std::time::Duration;

use crate::core::auth::ClientIpSource;
use crate::core::db::pool::DEFAULT_DATABASE_PATH;

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SUPERADMIN_EMAIL: &str = "superadmin@warden.local";
pub const DEFAULT_SUPERADMIN_USERNAME: &str = "superadmin";
pub const DEFAULT_SUPERADMIN_FULL_NAME: &str = "Super Admin";

/// Account seeded at startup when no superadmin exists
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAccount {
    pub email: String,
    pub username: String,
    pub full_name: String,
    /// A random password is generated and logged when unset
    pub password: Option<String>,
}

impl std::fmt::Debug for BootstrapAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAccount")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// SQLite database file path
    pub database_path: String,

    /// Secret key for signing tokens. Used only when at least 32 bytes long.
    pub jwt_secret: Option<String>,

    /// Tracing filter directive, e.g. `info` or `warden=debug,tower_http=info`
    pub log_level: String,

    /// Listen address
    pub bind_addr: String,

    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,

    /// Read the client IP from `X-Forwarded-For` / `X-Real-IP`. Enable only
    /// behind a proxy that overwrites these headers.
    pub trust_proxy_headers: bool,

    pub superadmin: BootstrapAccount,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("log_level", &self.log_level)
            .field("bind_addr", &self.bind_addr)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .field("superadmin", &self.superadmin)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid REQUEST_TIMEOUT_SECS, using default");
                DEFAULT_REQUEST_TIMEOUT_SECS
            }),
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let trust_proxy_headers = match var("TRUST_PROXY_HEADERS") {
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Invalid TRUST_PROXY_HEADERS, proxy headers ignored");
                false
            }),
            None => false,
        };

        Self {
            database_path: var("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            jwt_secret: var("JWT_SECRET"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            request_timeout_secs,
            trust_proxy_headers,
            superadmin: BootstrapAccount {
                email: var("SUPERADMIN_EMAIL")
                    .unwrap_or_else(|| DEFAULT_SUPERADMIN_EMAIL.to_string()),
                username: var("SUPERADMIN_USERNAME")
                    .unwrap_or_else(|| DEFAULT_SUPERADMIN_USERNAME.to_string()),
                full_name: var("SUPERADMIN_FULL_NAME")
                    .unwrap_or_else(|| DEFAULT_SUPERADMIN_FULL_NAME.to_string()),
                password: var("SUPERADMIN_PASSWORD"),
            },
        }
    }

    /// Check if a signing secret is configured
    pub fn has_jwt_secret(&self) -> bool {
        self.jwt_secret.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn client_ip_source(&self) -> ClientIpSource {
        ClientIpSource::from_trust_proxy_headers(self.trust_proxy_headers)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // ========================================================================
    // Config Tests (no env var dependencies - thread safe)
    // ========================================================================

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.database_path, "warden.db");
        assert!(config.jwt_secret.is_none());
        assert!(!config.has_jwt_secret());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.superadmin.email, "superadmin@warden.local");
        assert_eq!(config.superadmin.username, "superadmin");
        assert_eq!(config.superadmin.full_name, "Super Admin");
        assert!(config.superadmin.password.is_none());
        assert!(!config.trust_proxy_headers);
        assert_eq!(config.client_ip_source(), ClientIpSource::Peer);
    }

    #[test]
    fn test_all_fields() {
        let config = config_from(&[
            ("DATABASE_PATH", "/var/lib/warden/auth.db"),
            ("JWT_SECRET", "super-secret-key-123"),
            ("LOG_LEVEL", "warden=debug"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("SUPERADMIN_EMAIL", "root@corp.test"),
            ("SUPERADMIN_USERNAME", "root"),
            ("SUPERADMIN_FULL_NAME", "Root Operator"),
            ("SUPERADMIN_PASSWORD", "Boot-Pass-1"),
            ("TRUST_PROXY_HEADERS", "true"),
        ]);

        assert_eq!(config.database_path, "/var/lib/warden/auth.db");
        assert_eq!(config.jwt_secret.as_deref(), Some("super-secret-key-123"));
        assert_eq!(config.log_level, "warden=debug");
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.superadmin.email, "root@corp.test");
        assert_eq!(config.superadmin.username, "root");
        assert_eq!(config.superadmin.full_name, "Root Operator");
        assert_eq!(config.superadmin.password.as_deref(), Some("Boot-Pass-1"));
        assert!(config.trust_proxy_headers);
        assert_eq!(config.client_ip_source(), ClientIpSource::ProxyHeaders);
    }

    #[test]
    fn test_trust_proxy_headers_values() {
        for raw in ["1", "yes", "ON"] {
            assert!(config_from(&[("TRUST_PROXY_HEADERS", raw)]).trust_proxy_headers);
        }
        for raw in ["0", "false", "maybe"] {
            assert!(!config_from(&[("TRUST_PROXY_HEADERS", raw)]).trust_proxy_headers);
        }
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[("JWT_SECRET", ""), ("LOG_LEVEL", "  ")]);
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config = config_from(&[("REQUEST_TIMEOUT_SECS", "soon")]);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config_from(&[
            ("JWT_SECRET", "top-secret-signing-key"),
            ("SUPERADMIN_PASSWORD", "Boot-Pass-1"),
        ]);
        let debug = format!("{:?}", config);

        assert!(!debug.contains("top-secret-signing-key"));
        assert!(!debug.contains("Boot-Pass-1"));
        assert!(debug.contains("<redacted>"));
    }
}

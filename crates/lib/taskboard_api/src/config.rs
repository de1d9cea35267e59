//! API server configuration.

use std::path::PathBuf;

use taskboard_core::comments::MAX_NESTING_DEPTH;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3200";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Configuration for the API server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// PKCS#8 Ed25519 key used to sign tokens.
    pub token_key_path: Option<PathBuf>,
    /// Limit on the comment ancestor walk.
    pub comment_max_depth: usize,
    pub db_max_connections: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            database_url: None,
            token_key_path: None,
            comment_max_depth: MAX_NESTING_DEPTH,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                 | Default                         |
    /// |--------------------------|---------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:3200`                |
    /// | `DATABASE_URL`           | unset: in-memory store          |
    /// | `TOKEN_PRIVATE_KEY_PATH` | generated & persisted to file   |
    /// | `COMMENT_MAX_DEPTH`      | `3`                             |
    /// | `DB_MAX_CONNECTIONS`     | `5`                             |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: non_empty("DATABASE_URL"),
            token_key_path: non_empty("TOKEN_PRIVATE_KEY_PATH").map(PathBuf::from),
            comment_max_depth: parse_or(
                "COMMENT_MAX_DEPTH",
                non_empty("COMMENT_MAX_DEPTH"),
                defaults.comment_max_depth,
            ),
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                non_empty("DB_MAX_CONNECTIONS"),
                defaults.db_max_connections,
            ),
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(%key, value = %raw, "Ignoring unparseable setting");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ApiConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config(&[]), ApiConfig::default());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://localhost/taskboard"),
            ("COMMENT_MAX_DEPTH", "5"),
            ("TOKEN_PRIVATE_KEY_PATH", "/etc/taskboard/key.pem"),
        ]);
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/taskboard"));
        assert_eq!(cfg.comment_max_depth, 5);
        assert_eq!(
            cfg.token_key_path,
            Some(PathBuf::from("/etc/taskboard/key.pem"))
        );
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = config(&[("COMMENT_MAX_DEPTH", "deep"), ("DATABASE_URL", " ")]);
        assert_eq!(cfg.comment_max_depth, MAX_NESTING_DEPTH);
        assert!(cfg.database_url.is_none());
    }
}

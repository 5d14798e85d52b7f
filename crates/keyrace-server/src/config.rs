//! Server settings read from the environment.
//!
//! | Variable                    | Default        |
//! |-----------------------------|----------------|
//! | `KEYRACE_BIND`              | `0.0.0.0:8080` |
//! | `KEYRACE_SNIPPETS`          | built-in list  |
//! | `KEYRACE_SEND_TIMEOUT_MS`   | `5000`         |
//! | `KEYRACE_IDLE_TIMEOUT_SECS` | `300`          |
//! | `KEYRACE_KEEPALIVE_SECS`    | `30`           |
//! | `KEYRACE_HANDSHAKE_TIMEOUT_SECS` | `10`      |
//!
//! `KEYRACE_SNIPPETS` names a text file whose snippets are separated by
//! blank lines.

use std::path::PathBuf;
use std::time::Duration;

use keyrace::prelude::*;
use keyrace::{
    DEFAULT_BIND, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("failed to read snippets from {path}: {source}")]
    SnippetFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snippet file {path} has no snippets")]
    NoSnippets { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub snippets_path: Option<PathBuf>,
    pub room: RoomConfig,
    pub idle_timeout: Duration,
    pub keepalive_interval: Duration,
    pub handshake_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from any variable source; empty values count as
    /// unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind = get("KEYRACE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let snippets_path = get("KEYRACE_SNIPPETS").map(PathBuf::from);

        let mut room = RoomConfig::default();
        if let Some(value) = get("KEYRACE_SEND_TIMEOUT_MS") {
            room.send_timeout =
                Duration::from_millis(positive("KEYRACE_SEND_TIMEOUT_MS", value)?);
        }

        let idle_timeout = secs(&get, "KEYRACE_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT)?;
        let keepalive_interval = secs(&get, "KEYRACE_KEEPALIVE_SECS", DEFAULT_KEEPALIVE_INTERVAL)?;
        let handshake_timeout =
            secs(&get, "KEYRACE_HANDSHAKE_TIMEOUT_SECS", DEFAULT_HANDSHAKE_TIMEOUT)?;

        Ok(Self {
            bind,
            snippets_path,
            room,
            idle_timeout,
            keepalive_interval,
            handshake_timeout,
        })
    }

    /// Loads the configured snippet file, if any.
    pub fn load_snippets(&self) -> Result<Option<RandomSnippets>, ConfigError> {
        let Some(path) = &self.snippets_path else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::SnippetFile {
                path: path.clone(),
                source,
            }
        })?;
        let snippets = RandomSnippets::new(parse_snippets(&text))
            .map_err(|_| ConfigError::NoSnippets { path: path.clone() })?;
        Ok(Some(snippets))
    }
}

fn secs(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match get(var) {
        Some(value) => Ok(Duration::from_secs(positive(var, value)?)),
        None => Ok(default),
    }
}

fn positive(var: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.snippets_path, None);
        assert_eq!(config.room, RoomConfig::default());
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.keepalive_interval, DEFAULT_KEEPALIVE_INTERVAL);
        assert_eq!(config.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("KEYRACE_BIND", "127.0.0.1:9000"),
            ("KEYRACE_SNIPPETS", "/tmp/snippets.txt"),
            ("KEYRACE_SEND_TIMEOUT_MS", "250"),
            ("KEYRACE_IDLE_TIMEOUT_SECS", "30"),
            ("KEYRACE_KEEPALIVE_SECS", "5"),
            ("KEYRACE_HANDSHAKE_TIMEOUT_SECS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.snippets_path, Some(PathBuf::from("/tmp/snippets.txt")));
        assert_eq!(config.room.send_timeout, Duration::from_millis(250));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.keepalive_interval, Duration::from_secs(5));
        assert_eq!(config.handshake_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config =
            ServerConfig::from_lookup(lookup(&[("KEYRACE_BIND", "  ")])).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_rejects_bad_numbers() {
        for bad in ["abc", "0", "-5"] {
            let err = ServerConfig::from_lookup(lookup(&[(
                "KEYRACE_SEND_TIMEOUT_MS",
                bad,
            )]))
            .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidNumber { var: "KEYRACE_SEND_TIMEOUT_MS", .. }
            ));
        }
    }

    #[test]
    fn test_missing_snippet_file() {
        let config = ServerConfig {
            snippets_path: Some(PathBuf::from("/nonexistent/keyrace/snippets.txt")),
            ..ServerConfig::from_lookup(lookup(&[])).unwrap()
        };
        assert!(matches!(
            config.load_snippets(),
            Err(ConfigError::SnippetFile { .. })
        ));
    }

    #[test]
    fn test_loads_snippet_file() {
        let path = std::env::temp_dir()
            .join(format!("keyrace-snippets-{}.txt", std::process::id()));
        std::fs::write(&path, "fn a() {}\n\nlet b = 2;\n").unwrap();

        let config = ServerConfig {
            snippets_path: Some(path.clone()),
            ..ServerConfig::from_lookup(lookup(&[])).unwrap()
        };
        let snippets = config.load_snippets().unwrap().unwrap();
        assert_eq!(snippets.len(), 2);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_blank_snippet_file_is_rejected() {
        let path = std::env::temp_dir()
            .join(format!("keyrace-blank-{}.txt", std::process::id()));
        std::fs::write(&path, "\n\n   \n").unwrap();

        let config = ServerConfig {
            snippets_path: Some(path.clone()),
            ..ServerConfig::from_lookup(lookup(&[])).unwrap()
        };
        assert!(matches!(
            config.load_snippets(),
            Err(ConfigError::NoSnippets { .. })
        ));

        std::fs::remove_file(path).unwrap();
    }
}

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / TOML file / env vars)
// =============================================================================
//
// Equivalent ways to set the history proxy timeout:
//
//   journal-relay.toml:  [history]
//                        timeout_secs = 10
//
//   env var:             JOURNAL_HISTORY__TIMEOUT_SECS=10   (double underscore = nesting)
//
// The deployment-facing variables `PORT` and `ELEVENLABS_API_KEY` are honored
// as-is and win over everything except command-line flags.

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub history: HistoryFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Conversation history proxy settings (lives under `[history]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryFileConfig {
    /// Upstream credential; the proxy endpoint reports a configuration
    /// error while this is unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_history_base_url")]
    pub base_url: String,
    #[serde(default = "default_history_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HistoryFileConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_history_base_url(),
            timeout_secs: default_history_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_history_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_history_timeout_secs() -> u64 {
    30
}

/// Build a figment that layers: defaults → TOML file → JOURNAL_* env vars →
/// `PORT` / `ELEVENLABS_API_KEY`.
///
/// A missing TOML file is not an error.
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("JOURNAL_").split("__"))
        .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
        .merge(
            Env::raw()
                .only(&["ELEVENLABS_API_KEY"])
                .map(|_| "history.api_key".into()),
        )
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Listener configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig) -> Self {
        Self {
            host: fc.host.clone(),
            port: fc.port,
        }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// History proxy configuration (runtime view).
#[derive(Clone, Debug)]
pub struct HistoryConfig {
    /// `None` (or blank in the source) means the proxy is unconfigured
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl HistoryConfig {
    pub fn from_file(fc: &HistoryFileConfig) -> Self {
        Self {
            api_key: fc
                .api_key
                .as_ref()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: fc.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(fc.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_server_file_config_defaults() {
        let d = ServerFileConfig::default();
        assert_eq!(d.host, "0.0.0.0");
        assert_eq!(d.port, 8000);
    }

    #[test]
    fn test_history_file_config_defaults() {
        let d = HistoryFileConfig::default();
        assert!(d.api_key.is_none());
        assert_eq!(d.base_url, "https://api.elevenlabs.io");
        assert_eq!(d.timeout_secs, 30);
    }

    // ── runtime views ───────────────────────────────────────────────────

    #[test]
    fn test_history_config_blank_key_is_unset() {
        let fc = HistoryFileConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(HistoryConfig::from_file(&fc).api_key.is_none());
    }

    #[test]
    fn test_history_config_from_file() {
        let fc = HistoryFileConfig {
            api_key: Some("sk_test".to_string()),
            base_url: "http://localhost:9999/".to_string(),
            timeout_secs: 5,
        };
        let hc = HistoryConfig::from_file(&fc);
        assert_eq!(hc.api_key.as_deref(), Some("sk_test"));
        assert_eq!(hc.base_url, "http://localhost:9999");
        assert_eq!(hc.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_server_config_bind_addr() {
        let sc = ServerConfig::from_file(&ServerFileConfig {
            host: "127.0.0.1".to_string(),
            port: 8123,
        });
        assert_eq!(sc.bind_addr().unwrap(), "127.0.0.1:8123".parse().unwrap());
    }

    #[test]
    fn test_server_config_bad_host() {
        let sc = ServerConfig::from_file(&ServerFileConfig {
            host: "not a host".to_string(),
            port: 8000,
        });
        assert!(sc.bind_addr().is_err());
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(&tmp.path().join("absent.toml"))
            .extract()
            .unwrap();
        assert_eq!(fc.server.host, "0.0.0.0");
        assert_eq!(fc.history.timeout_secs, 30);
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("journal-relay.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\n\n[history]\nbase_url = \"http://upstream.test\"\ntimeout_secs = 7\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(&path).extract().unwrap();
        assert_eq!(fc.server.host, "127.0.0.1");
        assert_eq!(fc.history.base_url, "http://upstream.test");
        assert_eq!(fc.history.timeout_secs, 7);
    }

    #[test]
    fn test_load_config_rejects_bad_types() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("journal-relay.toml");
        std::fs::write(&path, "[history]\ntimeout_secs = \"soon\"\n").unwrap();
        assert!(load_config(&path).extract::<FileConfig>().is_err());
    }

    #[test]
    fn test_deployment_env_vars_win_over_file_and_prefixed_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "journal-relay.toml",
                "[server]\nport = 7100\n\n[history]\napi_key = \"from-file\"\n",
            )?;
            jail.set_env("JOURNAL_SERVER__PORT", "7200");
            jail.set_env("JOURNAL_HISTORY__API_KEY", "from-prefixed-env");
            jail.set_env("PORT", "9123");
            jail.set_env("ELEVENLABS_API_KEY", "sk_abc");

            let fc: FileConfig = load_config(Path::new("journal-relay.toml")).extract()?;
            assert_eq!(fc.server.port, 9123);
            assert_eq!(fc.history.api_key.as_deref(), Some("sk_abc"));
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("journal-relay.toml", "[server]\nport = 7100\n")?;
            jail.set_env("JOURNAL_SERVER__PORT", "7200");

            let fc: FileConfig = load_config(Path::new("journal-relay.toml")).extract()?;
            assert_eq!(fc.server.port, 7200);
            Ok(())
        });
    }
}

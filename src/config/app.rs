//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::transport::BasicAuth;

use super::error::ConfigError;
use super::targets::TargetsConfig;

// =============================================================================
// Constants
// =============================================================================

/// Default exporter port.
pub const DEFAULT_PORT: u16 = 9965;

/// Default per-request timeout (5 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = crate::transport::DEFAULT_REQUEST_TIMEOUT;

/// Default per-target pass timeout (10 seconds).
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default configuration document TTL (60 seconds).
pub const DEFAULT_CONFIG_CACHE_TTL: Duration = crate::collector::DEFAULT_CONFIG_TTL;

/// Default unhealthy backoff (60 seconds).
pub const DEFAULT_UNHEALTHY_BACKOFF: Duration = crate::discovery::DEFAULT_UNHEALTHY_BACKOFF;

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9965).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// =============================================================================
// Probe Configuration
// =============================================================================

/// HTTP Basic credentials for devices with authentication enabled.
///
/// Both fields support `${VAR}` and `${VAR:-default}` expansion.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?::-(?P<default>[^}]*))?\}")
        .expect("env reference pattern is valid")
});

impl AuthConfig {
    /// Substitute environment references in both credentials.
    ///
    /// A variable that is unset or empty takes the default, or the empty string.
    fn resolve_env(&mut self) {
        self.username = resolve_env_references(&self.username);
        self.password = resolve_env_references(&self.password);
    }
}

fn resolve_env_references(raw: &str) -> String {
    ENV_REFERENCE
        .replace_all(raw, |caps: &Captures| {
            std::env::var(&caps["name"])
                .ok()
                .filter(|value| !value.is_empty())
                .or_else(|| caps.name("default").map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl From<AuthConfig> for BasicAuth {
    fn from(auth: AuthConfig) -> Self {
        Self {
            username: auth.username,
            password: auth.password,
        }
    }
}

/// Device polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Timeout of a single device request (default: 5s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Upper bound of one target pass (default: 10s).
    #[serde(with = "humantime_serde")]
    pub scrape_timeout: Duration,

    /// How long configuration documents are reused (default: 60s, 0s disables).
    #[serde(with = "humantime_serde")]
    pub config_cache_ttl: Duration,

    /// How long an unreachable target is skipped (default: 60s).
    #[serde(with = "humantime_serde")]
    pub unhealthy_backoff: Duration,

    /// Optional device credentials.
    pub auth: Option<AuthConfig>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            config_cache_ttl: DEFAULT_CONFIG_CACHE_TTL,
            unhealthy_backoff: DEFAULT_UNHEALTHY_BACKOFF,
            auth: None,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Device polling configuration.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Statically configured targets.
    #[serde(flatten)]
    pub targets: TargetsConfig,

    /// Path to a directory with additional target files.
    #[serde(default)]
    pub target_path: Option<String>,
}

impl AppConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a YAML file without validating it.
    ///
    /// Credentials are resolved from the environment and the targets of
    /// every file under `target_path` are appended in file name order.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        if let Some(ref mut auth) = config.probe.auth {
            auth.resolve_env();
        }

        if let Some(ref target_dir) = config.target_path {
            let additional = TargetsConfig::load_from_dir(target_dir)?;
            config.targets = config.targets.merge(additional);
        }

        Ok(config)
    }

    /// Replace file values with those given on the command line.
    pub fn apply_overrides(
        &mut self,
        bind: Option<String>,
        port: Option<u16>,
        scrape_timeout: Option<Duration>,
    ) {
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(scrape_timeout) = scrape_timeout {
            self.probe.scrape_timeout = scrape_timeout;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<IpAddr>().is_err() {
            return Err(ConfigError::BindAddress(self.server.bind.clone()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::ZeroPort);
        }

        if self.probe.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("timeout"));
        }
        if self.probe.scrape_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("scrape_timeout"));
        }
        if self
            .probe
            .auth
            .as_ref()
            .is_some_and(|auth| auth.username.is_empty())
        {
            return Err(ConfigError::EmptyUsername);
        }

        self.targets.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Generation, Target};

    fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 9965);
    }

    #[test]
    fn test_polling_config_default() {
        let config = ProbeConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.scrape_timeout, Duration::from_secs(10));
        assert_eq!(config.config_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.unhealthy_backoff, Duration::from_secs(60));
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
server:
  bind: 127.0.0.1
  port: 9100
probe:
  timeout: 2s
  scrape_timeout: 8s
  config_cache_ttl: 0s
  unhealthy_backoff: 5m
  auth:
    username: admin
    password: "${PLUGSCOPE_TEST_MISSING_PW:-fallback}"
targets:
  - address: 192.168.1.20
  - address: 192.168.1.21
    generation: gen1
"#,
        );

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.probe.timeout, Duration::from_secs(2));
        assert_eq!(config.probe.config_cache_ttl, Duration::ZERO);
        assert_eq!(config.probe.unhealthy_backoff, Duration::from_secs(300));
        let auth = config.probe.auth.unwrap();
        assert_eq!(auth.username, "admin");
        assert_eq!(auth.password, "fallback");
        assert_eq!(
            config.targets.targets[1],
            Target::new("192.168.1.21", Generation::Gen1)
        );
    }

    #[test]
    fn test_load_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "targets:\n  - address: plug.local\n");

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.probe.scrape_timeout, DEFAULT_SCRAPE_TIMEOUT);
        assert_eq!(config.targets.targets.len(), 1);
        assert!(config.target_path.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/plugscope.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "probe:\n  timeout: soon\n");
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_with_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let targets_dir = dir.path().join("targets.d");
        std::fs::create_dir(&targets_dir).unwrap();
        std::fs::write(
            targets_dir.join("garage.yaml"),
            "targets:\n  - address: 10.0.0.2\n",
        )
        .unwrap();
        let path = write_config(
            &dir,
            &format!(
                "targets:\n  - address: 10.0.0.1\ntarget_path: {}\n",
                targets_dir.display()
            ),
        );

        let config = AppConfig::load(&path).unwrap();
        let addresses: Vec<_> = config
            .targets
            .targets
            .iter()
            .map(|t| t.address.as_str())
            .collect();
        assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_load_with_target_path_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let targets_dir = dir.path().join("targets.d");
        std::fs::create_dir(&targets_dir).unwrap();
        std::fs::write(
            targets_dir.join("dup.yaml"),
            "targets:\n  - address: 10.0.0.1\n",
        )
        .unwrap();
        let path = write_config(
            &dir,
            &format!(
                "targets:\n  - address: 10.0.0.1\ntarget_path: {}\n",
                targets_dir.display()
            ),
        );

        let result = AppConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::DuplicateTarget(_))));
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let config = AppConfig {
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 0,
            },
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(ConfigError::ZeroPort)));
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let config = AppConfig {
            server: ServerConfig {
                bind: "not-an-ip".to_string(),
                port: 9965,
            },
            ..Default::default()
        };

        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let mut config = AppConfig::default();
        config.probe.timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration("timeout"))
        ));

        let mut config = AppConfig::default();
        config.probe.scrape_timeout = Duration::ZERO;
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("scrape_timeout")
        );
    }

    #[test]
    fn test_config_validation_empty_auth_username() {
        let mut config = AppConfig::default();
        config.probe.auth = Some(AuthConfig {
            username: String::new(),
            password: "secret".to_string(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::EmptyUsername)));
    }

    #[test]
    fn test_load_with_missing_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "target_path: /nonexistent/plugscope/targets.d\n");
        assert!(matches!(
            AppConfig::read(&path),
            Err(ConfigError::TargetPath { .. })
        ));
    }

    #[test]
    fn test_overrides_applied_before_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "server:\n  bind: localhost\nprobe:\n  scrape_timeout: 0s\ntargets:\n  - address: 10.0.0.1\n",
        );
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::BindAddress(_))
        ));

        let mut config = AppConfig::read(&path).unwrap();
        config.apply_overrides(
            Some("127.0.0.1".to_string()),
            Some(9200),
            Some(Duration::from_secs(4)),
        );
        config.validate().unwrap();
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.probe.scrape_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_overrides_keep_file_values_when_absent() {
        let mut config = AppConfig::default();
        config.server.port = 9300;
        config.apply_overrides(None, None, None);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9300);
        assert_eq!(config.probe.scrape_timeout, DEFAULT_SCRAPE_TIMEOUT);
    }

    #[test]
    fn test_env_references_without_variables() {
        assert_eq!(resolve_env_references("admin"), "admin");
        assert_eq!(resolve_env_references("pa$$word{x}"), "pa$$word{x}");
    }

    #[test]
    fn test_env_references_fall_back_to_default() {
        assert_eq!(
            resolve_env_references("${PLUGSCOPE_UNSET_USER:-admin}"),
            "admin"
        );
        assert_eq!(resolve_env_references("${PLUGSCOPE_UNSET_PW}"), "");
        assert_eq!(
            resolve_env_references("pre-${PLUGSCOPE_UNSET_USER:-x}-post"),
            "pre-x-post"
        );
    }

    #[test]
    fn test_env_references_from_environment() {
        // SAFETY: the variables are private to this test.
        unsafe {
            std::env::set_var("PLUGSCOPE_TEST_PASSWORD", "s3cret");
            std::env::set_var("PLUGSCOPE_TEST_EMPTY", "");
        }
        let mut auth = AuthConfig {
            username: "${PLUGSCOPE_TEST_EMPTY:-admin}".to_string(),
            password: "${PLUGSCOPE_TEST_PASSWORD:-unused}".to_string(),
        };
        auth.resolve_env();
        assert_eq!(auth.username, "admin");
        assert_eq!(auth.password, "s3cret");
        // SAFETY: cleanup of the variables set above.
        unsafe {
            std::env::remove_var("PLUGSCOPE_TEST_PASSWORD");
            std::env::remove_var("PLUGSCOPE_TEST_EMPTY");
        }
    }

    #[test]
    fn test_auth_debug_hides_password() {
        let auth = AuthConfig {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));

        let basic: BasicAuth = auth.into();
        assert_eq!(basic.password, "hunter2");
    }
}

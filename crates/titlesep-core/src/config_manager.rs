use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for crate::TitleSepError {
    fn from(e: ConfigError) -> Self {
        crate::TitleSepError::Configuration(e.to_string())
    }
}

/// Main configuration for the title separation search
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TitleSepConfig {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum BFS depth; nodes at this distance are not expanded
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Games requested per (player, game type) lookup
    #[serde(default = "default_game_limit")]
    pub game_limit: usize,

    /// Emit a progress line every N expanded players
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Drop the trailing check letter from query codes (`120787J` -> `120787`)
    #[serde(default)]
    pub strip_check_letter: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            game_limit: default_game_limit(),
            progress_interval: default_progress_interval(),
            strip_check_letter: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Queried as `{base}?{api path}`
    Direct,
    /// Pass-through relay queried as `{base}{percent-encoded target url}`
    Relay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub kind: EndpointKind,
    pub base: String,
    /// Liveness path, resolved against the base URL's origin
    #[serde(default)]
    pub health_check_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Upstream rating API; relays forward to URLs under this base
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Candidate endpoints in declaration order; the first one is the primary
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointConfig>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    #[serde(default = "default_transport_backoff_ms")]
    pub transport_backoff_ms: u64,

    /// Optional client-side cap on outbound requests
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            endpoints: default_endpoints(),
            request_timeout_secs: default_request_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_attempts: default_max_attempts(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            transport_backoff_ms: default_transport_backoff_ms(),
            requests_per_second: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Diagnostic verbosity for the result sink (0, 1 or 2)
    #[serde(default)]
    pub debug_level: u8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            debug_level: 0,
        }
    }
}

fn default_max_depth() -> usize {
    5
}
fn default_game_limit() -> usize {
    1000
}
fn default_progress_interval() -> usize {
    10
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_rate_limit_backoff_ms() -> u64 {
    1000
}
fn default_transport_backoff_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_api_base() -> String {
    "https://rating.englishchess.org.uk/v2/new/api.php".to_string()
}

fn default_endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig {
            name: "ecf".to_string(),
            kind: EndpointKind::Direct,
            base: default_api_base(),
            health_check_path: Some("/".to_string()),
        },
        EndpointConfig {
            name: "corsproxy".to_string(),
            kind: EndpointKind::Relay,
            base: "https://corsproxy.io/?url=".to_string(),
            health_check_path: None,
        },
        EndpointConfig {
            name: "allorigins".to_string(),
            kind: EndpointKind::Relay,
            base: "https://api.allorigins.win/raw?url=".to_string(),
            health_check_path: None,
        },
    ]
}

/// Configuration manager with layered sources
#[derive(Debug)]
pub struct ConfigManager {
    config: TitleSepConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (explicit path, `.titlesep.toml`, `~/.titlesep/config.toml`)
    /// 3. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                (Self::read_toml_file(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_config_file()?,
        };

        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!("Config file: {}", path.display()),
            None => info!("No config file, using defaults"),
        }
        info!(
            endpoints = config.network.endpoints.len(),
            max_depth = config.search.max_depth,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Build from an in-memory configuration, still validated
    pub fn from_config(config: TitleSepConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
        }
    }

    fn load_config_file() -> Result<(TitleSepConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".titlesep.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".titlesep").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((TitleSepConfig::default(), None))
    }

    pub fn read_toml_file(path: &Path) -> Result<TitleSepConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: TitleSepConfig) -> TitleSepConfig {
        if let Ok(depth) = std::env::var("TITLESEP_MAX_DEPTH") {
            if let Ok(d) = depth.parse() {
                config.search.max_depth = d;
            }
        }
        if let Ok(limit) = std::env::var("TITLESEP_GAME_LIMIT") {
            if let Ok(l) = limit.parse() {
                config.search.game_limit = l;
            }
        }
        if let Ok(strip) = std::env::var("TITLESEP_STRIP_CHECK_LETTER") {
            config.search.strip_check_letter = strip.to_lowercase() == "true" || strip == "1";
        }
        if let Ok(attempts) = std::env::var("TITLESEP_MAX_ATTEMPTS") {
            if let Ok(a) = attempts.parse() {
                config.network.max_attempts = a;
            }
        }
        if let Ok(rps) = std::env::var("TITLESEP_REQUESTS_PER_SECOND") {
            config.network.requests_per_second = rps.parse().ok();
        }
        if let Ok(debug) = std::env::var("TITLESEP_DEBUG") {
            if let Ok(d) = debug.parse() {
                config.logging.debug_level = d;
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    fn validate_config(config: &TitleSepConfig) -> Result<(), ConfigError> {
        if config.search.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_depth must be at least 1".to_string(),
            ));
        }
        if config.network.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_attempts must be at least 1".to_string(),
            ));
        }
        if config.network.endpoints.is_empty() {
            return Err(ConfigError::ValidationError(
                "network.endpoints must name at least one endpoint".to_string(),
            ));
        }
        if config.network.api_base.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "network.api_base must not be empty".to_string(),
            ));
        }
        if config.logging.debug_level > 2 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid debug level: {}. Must be 0, 1 or 2",
                config.logging.debug_level
            )));
        }

        // RUST_LOG may carry directives; only bare levels are checked
        let level = config.logging.level.as_str();
        if !level.contains('=') && !level.contains(',') {
            match level {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        other
                    )))
                }
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &TitleSepConfig {
        &self.config
    }

    pub fn into_config(self) -> TitleSepConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TitleSepConfig::default();
        assert_eq!(config.search.max_depth, 5);
        assert_eq!(config.search.game_limit, 1000);
        assert_eq!(config.network.max_attempts, 3);
        assert_eq!(config.network.endpoints[0].kind, EndpointKind::Direct);
        assert!(config.network.endpoints[1..]
            .iter()
            .all(|e| e.kind == EndpointKind::Relay));
    }

    #[test]
    fn test_config_validation() {
        let config = TitleSepConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut bad_config = config.clone();
        bad_config.network.endpoints.clear();
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = config.clone();
        bad_config.logging.debug_level = 3;
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = config;
        bad_config.logging.level = "loud".into();
        assert!(ConfigManager::validate_config(&bad_config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[search]
max_depth = 3

[[network.endpoints]]
name = "local"
kind = "direct"
base = "http://localhost:8080/api.php"
"#
        )
        .unwrap();

        let config = ConfigManager::read_toml_file(file.path()).unwrap();
        assert_eq!(config.search.max_depth, 3);
        assert_eq!(config.search.game_limit, 1000);
        assert_eq!(config.network.endpoints.len(), 1);
        assert_eq!(config.network.endpoints[0].name, "local");
        assert_eq!(config.logging.level, "warn");
    }
}

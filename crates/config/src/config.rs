//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Conversion-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionConfig {
    /// Maximum concurrent transcodes (0 = auto-derive from core count)
    #[serde(default)]
    pub max_concurrent_jobs: u32,
    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Path to the cover-art tagging tool binary
    #[serde(default = "default_tag_tool_path")]
    pub tag_tool_path: String,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_tag_tool_path() -> String {
    "AtomicParsley".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 0,
            ffmpeg_path: default_ffmpeg_path(),
            tag_tool_path: default_tag_tool_path(),
        }
    }
}

/// Filesystem path configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Base directory for temporary conversion artifacts
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp/m4b-engine")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

/// Stale-job reaper configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReaperConfig {
    /// Seconds between reaper sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Seconds a terminal job is retained before eviction
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Seconds after which a non-terminal job is force-failed
    #[serde(default = "default_stuck_after_secs")]
    pub stuck_after_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_stuck_after_secs() -> u64 {
    7200
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
            stuck_after_secs: default_stuck_after_secs(),
        }
    }
}

/// Cover-art pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverConfig {
    /// Hard timeout for cover extraction, in seconds
    #[serde(default = "default_extract_timeout_secs")]
    pub extract_timeout_secs: u64,
    /// Hard timeout for cover embedding, in seconds
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
}

fn default_extract_timeout_secs() -> u64 {
    30
}

fn default_embed_timeout_secs() -> u64 {
    60
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            extract_timeout_secs: default_extract_timeout_secs(),
            embed_timeout_secs: default_embed_timeout_secs(),
        }
    }
}

/// Status server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Port for the local status endpoint (0 disables it)
    #[serde(default = "default_status_port")]
    pub status_port: u16,
}

fn default_status_port() -> u16 {
    7878
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            status_port: default_status_port(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub cover: CoverConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - M4B_MAX_CONCURRENT_JOBS -> conversion.max_concurrent_jobs
    /// - M4B_FFMPEG_PATH -> conversion.ffmpeg_path
    /// - M4B_TAG_TOOL_PATH -> conversion.tag_tool_path
    /// - M4B_TEMP_DIR -> paths.temp_dir
    /// - M4B_STATUS_PORT -> server.status_port
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("M4B_MAX_CONCURRENT_JOBS") {
            if let Ok(jobs) = val.parse::<u32>() {
                self.conversion.max_concurrent_jobs = jobs;
            }
        }

        if let Ok(val) = env::var("M4B_FFMPEG_PATH") {
            if !val.is_empty() {
                self.conversion.ffmpeg_path = val;
            }
        }

        if let Ok(val) = env::var("M4B_TAG_TOOL_PATH") {
            if !val.is_empty() {
                self.conversion.tag_tool_path = val;
            }
        }

        if let Ok(val) = env::var("M4B_TEMP_DIR") {
            if !val.is_empty() {
                self.paths.temp_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("M4B_STATUS_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.server.status_port = port;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("M4B_MAX_CONCURRENT_JOBS");
        env::remove_var("M4B_FFMPEG_PATH");
        env::remove_var("M4B_TAG_TOOL_PATH");
        env::remove_var("M4B_TEMP_DIR");
        env::remove_var("M4B_STATUS_PORT");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            max_jobs in 0u32..16,
            sweep in 1u64..3600,
            retention in 1u64..86400,
            stuck in 1u64..86400,
            extract_timeout in 1u64..600,
            embed_timeout in 1u64..600,
            port in 0u16..u16::MAX,
        ) {
            let toml_str = format!(
                r#"
[conversion]
max_concurrent_jobs = {}
ffmpeg_path = "/usr/bin/ffmpeg"
tag_tool_path = "/usr/bin/AtomicParsley"

[paths]
temp_dir = "/var/tmp/m4b"

[reaper]
sweep_interval_secs = {}
retention_secs = {}
stuck_after_secs = {}

[cover]
extract_timeout_secs = {}
embed_timeout_secs = {}

[server]
status_port = {}
"#,
                max_jobs, sweep, retention, stuck, extract_timeout, embed_timeout, port
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.conversion.max_concurrent_jobs, max_jobs);
            prop_assert_eq!(config.conversion.ffmpeg_path.as_str(), "/usr/bin/ffmpeg");
            prop_assert_eq!(config.conversion.tag_tool_path.as_str(), "/usr/bin/AtomicParsley");
            prop_assert_eq!(&config.paths.temp_dir, &PathBuf::from("/var/tmp/m4b"));
            prop_assert_eq!(config.reaper.sweep_interval_secs, sweep);
            prop_assert_eq!(config.reaper.retention_secs, retention);
            prop_assert_eq!(config.reaper.stuck_after_secs, stuck);
            prop_assert_eq!(config.cover.extract_timeout_secs, extract_timeout);
            prop_assert_eq!(config.cover.embed_timeout_secs, embed_timeout);
            prop_assert_eq!(config.server.status_port, port);
        }

        #[test]
        fn prop_env_overrides_max_concurrent_jobs(
            initial_jobs in 0u32..8,
            override_jobs in 0u32..16,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                r#"
[conversion]
max_concurrent_jobs = {}
"#,
                initial_jobs
            );

            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("M4B_MAX_CONCURRENT_JOBS", override_jobs.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.conversion.max_concurrent_jobs, override_jobs);
        }

        #[test]
        fn prop_env_overrides_status_port(
            initial_port in 0u16..u16::MAX,
            override_port in 0u16..u16::MAX,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                r#"
[server]
status_port = {}
"#,
                initial_port
            );

            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("M4B_STATUS_PORT", override_port.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.server.status_port, override_port);
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.conversion.max_concurrent_jobs, 0);
        assert_eq!(config.conversion.ffmpeg_path, "ffmpeg");
        assert_eq!(config.conversion.tag_tool_path, "AtomicParsley");
        assert_eq!(config.paths.temp_dir, PathBuf::from("/tmp/m4b-engine"));
        assert_eq!(config.reaper.sweep_interval_secs, 300);
        assert_eq!(config.reaper.retention_secs, 3600);
        assert_eq!(config.reaper.stuck_after_secs, 7200);
        assert_eq!(config.cover.extract_timeout_secs, 30);
        assert_eq!(config.cover.embed_timeout_secs, 60);
        assert_eq!(config.server.status_port, 7878);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let toml_str = r#"
[reaper]
retention_secs = 600
"#;
        let config = Config::parse_toml(toml_str).expect("Partial TOML should parse");

        assert_eq!(config.reaper.retention_secs, 600);
        assert_eq!(config.reaper.sweep_interval_secs, 300); // default
        assert_eq!(config.reaper.stuck_after_secs, 7200); // default
        assert_eq!(config.conversion.ffmpeg_path, "ffmpeg"); // default
        assert_eq!(config.server.status_port, 7878); // default
    }

    #[test]
    fn test_env_overrides_tool_paths() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::parse_toml("").expect("Empty TOML");

        env::set_var("M4B_FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg");
        env::set_var("M4B_TAG_TOOL_PATH", "/opt/atomicparsley/AtomicParsley");
        env::set_var("M4B_TEMP_DIR", "/scratch/m4b");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.conversion.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.conversion.tag_tool_path, "/opt/atomicparsley/AtomicParsley");
        assert_eq!(config.paths.temp_dir, PathBuf::from("/scratch/m4b"));
    }

    #[test]
    fn test_empty_env_values_ignored_for_paths() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::parse_toml("").expect("Empty TOML");

        env::set_var("M4B_FFMPEG_PATH", "");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.conversion.ffmpeg_path, "ffmpeg");
    }
}

//! Grab-engine configuration with layered loading.
//!
//! Values are resolved in three layers (highest wins):
//!
//! 1. CLI flags (applied by the binary on top of the loaded config)
//! 2. Environment variables (SITEGRAB_*)
//! 3. TOML config file (if SITEGRAB_CONFIG_FILE set)
//! 4. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Configuration for the fetch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrabConfig {
    /// URL paths tried in order per site. The first 200/206 wins.
    #[serde(default = "default_url_paths")]
    pub url_paths: Vec<String>,

    /// Status codes worth storing; empty keeps every record.
    #[serde(default)]
    pub store_codes: Vec<u16>,

    /// Number of concurrent fetch workers.
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Connect+read+write deadline per request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cost-consuming retries per site.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Redirects followed per site before giving up.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Response bodies beyond this many bytes are terminal errors.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Log per-attempt connection errors.
    #[serde(default)]
    pub show_errors: bool,

    /// Root folder for bucketed output files.
    #[serde(default)]
    pub output_folder: String,

    /// Output encoding: "json" or "txt".
    #[serde(default = "default_format")]
    pub format: String,

    /// Wrap each output file in a single LZ4 frame.
    #[serde(default)]
    pub compress: bool,

    /// Records written to a file before it rotates.
    #[serde(default = "default_records_per_file")]
    pub records_per_file: usize,

    /// Subdirectory fan-out for output files.
    #[serde(default = "default_buckets")]
    pub buckets: u64,

    /// With one record per file, skip sites whose output file is newer
    /// than this many minutes.
    #[serde(default = "default_skip_newer_than_min")]
    pub skip_newer_than_min: u64,

    /// Heap watchdog threshold in bytes; 0 disables the watchdog.
    #[serde(default)]
    pub mem_limit_bytes: u64,
}

fn default_url_paths() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_parallel() -> usize {
    cpu_count() * 32
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    10
}

fn default_max_redirects() -> u32 {
    5
}

fn default_max_response_size() -> usize {
    32 * 1024 * 1024
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/107.0.0.0 Safari/537.36 Edg/107.0.1418.56"
        .into()
}

fn default_format() -> String {
    "json".into()
}

fn default_records_per_file() -> usize {
    10_000
}

fn default_buckets() -> u64 {
    4096
}

fn default_skip_newer_than_min() -> u64 {
    7 * 1440
}

/// Logical CPU count, used for worker pool and queue sizing.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            url_paths: default_url_paths(),
            store_codes: Vec::new(),
            parallel: default_parallel(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_redirects: default_max_redirects(),
            max_response_size: default_max_response_size(),
            user_agent: default_user_agent(),
            show_errors: false,
            output_folder: String::new(),
            format: default_format(),
            compress: false,
            records_per_file: default_records_per_file(),
            buckets: default_buckets(),
            skip_newer_than_min: default_skip_newer_than_min(),
            mem_limit_bytes: 0,
        }
    }
}

impl GrabConfig {
    /// Per-request deadline as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed output format.
    pub fn output_format(&self) -> Result<crate::record::OutputFormat, crate::Error> {
        self.format.parse()
    }

    /// Whether a record with this final status code should be stored.
    pub fn stores_code(&self, code: u16) -> bool {
        self.store_codes.is_empty() || self.store_codes.contains(&code)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SITEGRAB_`
    /// 2. TOML file from `SITEGRAB_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or the merged
    /// values fail validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SITEGRAB_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SITEGRAB_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OutputFormat;

    #[test]
    fn test_default_config() {
        let config = GrabConfig::default();
        assert_eq!(config.url_paths, vec!["/".to_string()]);
        assert!(config.store_codes.is_empty());
        assert_eq!(config.parallel, cpu_count() * 32);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.max_response_size, 32 * 1024 * 1024);
        assert_eq!(config.records_per_file, 10_000);
        assert_eq!(config.buckets, 4096);
        assert_eq!(config.skip_newer_than_min, 10_080);
        assert_eq!(config.mem_limit_bytes, 0);
        assert!(!config.compress);
    }

    #[test]
    fn test_timeout_duration() {
        let config = GrabConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_output_format_parses() {
        let config = GrabConfig::default();
        assert_eq!(config.output_format().unwrap(), OutputFormat::Json);

        let config = GrabConfig { format: "txt".into(), ..Default::default() };
        assert_eq!(config.output_format().unwrap(), OutputFormat::Txt);

        let config = GrabConfig { format: "plain".into(), ..Default::default() };
        assert!(config.output_format().is_err());
    }

    #[test]
    fn test_stores_code() {
        let config = GrabConfig::default();
        assert!(config.stores_code(200));
        assert!(config.stores_code(0));

        let config = GrabConfig { store_codes: vec![200, 206], ..Default::default() };
        assert!(config.stores_code(200));
        assert!(!config.stores_code(404));
        assert!(!config.stores_code(0));
    }
}

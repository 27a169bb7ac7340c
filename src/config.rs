/*!
 * Configuration types for Parcel
 */

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::transfer::TransferOperation;
use crate::error::{ParcelError, Result};

/// Default number of parallel workers
pub const DEFAULT_WORKERS: usize = 2;

/// Default payload budget per worker invocation, in megabytes
pub const DEFAULT_MAX_PAYLOAD_MB: u64 = 1024;

/// Bytes per configured megabyte
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Environment variable overriding the worker count
pub const ENV_WORKERS: &str = "PARCEL_WORKERS";

/// Environment variable overriding the payload budget (MB)
pub const ENV_MAX_PAYLOAD_MB: &str = "PARCEL_MAX_PAYLOAD_MB";

/// Worker count variable read by earlier deployments, consulted after [`ENV_WORKERS`]
pub const LEGACY_ENV_WORKERS: &str = "NumCopyLambdaWorkers";

/// Payload budget variable read by earlier deployments, consulted after [`ENV_MAX_PAYLOAD_MB`]
pub const LEGACY_ENV_MAX_PAYLOAD_MB: &str = "MaxPayloadSizePerLambdaExecutionInMB";

/// Where the objects to transfer live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(alias = "s3_bucket")]
    pub bucket: String,

    /// Key prefix to enumerate (e.g. "source/")
    #[serde(alias = "s3_path", default)]
    pub prefix: String,
}

/// Destination for a set of file types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRule {
    /// Extensions (without the dot) routed to this destination
    pub file_types: Vec<String>,

    #[serde(alias = "s3_bucket")]
    pub bucket: String,

    /// Key prefix prepended to the object's name relative to the source prefix
    #[serde(alias = "s3_path", default)]
    pub path: String,
}

/// Connection settings for the S3 store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    /// AWS region (e.g., "us-east-1")
    pub region: Option<String>,

    /// Custom endpoint URL (for S3-compatible services like MinIO)
    pub endpoint: Option<String>,

    /// AWS access key ID (optional - uses credential chain if not provided)
    pub access_key: Option<String>,

    /// AWS secret access key (optional - uses credential chain if not provided)
    pub secret_key: Option<String>,

    /// Session token (for temporary credentials)
    pub session_token: Option<String>,

    /// Path-style addressing (required for some S3-compatible services)
    pub force_path_style: bool,

    /// Request timeout in seconds (0 = SDK default)
    pub timeout_seconds: u64,
}

impl S3Settings {
    pub fn validate(&self) -> Result<()> {
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(ParcelError::Config(
                "access_key and secret_key must be provided together".to_string(),
            ));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ParcelError::Config(format!(
                    "endpoint must be an http(s) URL: {}",
                    endpoint
                )));
            }
        }
        Ok(())
    }
}

/// Main configuration: what to copy, where, and how to split it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelConfig {
    #[serde(alias = "source_s3_config")]
    pub source: SourceConfig,

    #[serde(alias = "target_s3_config")]
    pub destinations: Vec<DestinationRule>,

    /// Worker count (overridden by CLI / environment)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Payload budget in MB (overridden by CLI / environment)
    #[serde(default)]
    pub max_payload_mb: Option<u64>,

    /// Copy or move
    #[serde(default)]
    pub operation: TransferOperation,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub s3: S3Settings,
}

/// JSON documents may wrap the configuration the way workflow events do
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Wrapped { s3_copy_config: ParcelConfig },
    Plain(ParcelConfig),
}

impl ParcelConfig {
    /// Load configuration from a TOML or JSON file (chosen by extension)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ParcelConfig = toml::from_str(contents)
            .map_err(|e| ParcelError::Config(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON, accepting both the bare form and `{"s3_copy_config": {...}}`
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let document: JsonDocument = serde_json::from_str(contents)
            .map_err(|e| ParcelError::Config(format!("JSON parse error: {}", e)))?;
        let config = match document {
            JsonDocument::Wrapped { s3_copy_config } => s3_copy_config,
            JsonDocument::Plain(config) => config,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ParcelError::Config(format!("TOML encode error: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.bucket.is_empty() {
            return Err(ParcelError::Config("source bucket must not be empty".to_string()));
        }
        if self.destinations.is_empty() {
            return Err(ParcelError::Config(
                "at least one destination rule is required".to_string(),
            ));
        }
        for rule in &self.destinations {
            if rule.bucket.is_empty() {
                return Err(ParcelError::Config(
                    "destination bucket must not be empty".to_string(),
                ));
            }
            if rule.file_types.iter().any(|t| t.is_empty() || t.contains('.')) {
                return Err(ParcelError::Config(format!(
                    "invalid file type list for bucket '{}': {:?}",
                    rule.bucket, rule.file_types
                )));
            }
        }
        self.s3.validate()
    }
}

/// Partitioning knobs: worker count and per-invocation payload budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunables {
    pub workers: usize,
    pub max_payload_mb: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_payload_mb: DEFAULT_MAX_PAYLOAD_MB,
        }
    }
}

impl Tunables {
    /// Resolve with precedence: explicit value > environment > file > default
    pub fn resolve(
        workers: Option<usize>,
        max_payload_mb: Option<u64>,
        file: Option<&ParcelConfig>,
    ) -> Result<Self> {
        Self::resolve_with(workers, max_payload_mb, file, |name| std::env::var(name).ok())
    }

    /// Same as [`Tunables::resolve`] with an injectable environment lookup
    pub fn resolve_with<F>(
        workers: Option<usize>,
        max_payload_mb: Option<u64>,
        file: Option<&ParcelConfig>,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let workers = match workers {
            Some(w) => w,
            None => match parse_env::<usize>(&env, &[ENV_WORKERS, LEGACY_ENV_WORKERS])? {
                Some(w) => w,
                None => file.and_then(|c| c.workers).unwrap_or(defaults.workers),
            },
        };
        let max_payload_mb = match max_payload_mb {
            Some(mb) => mb,
            None => match parse_env::<u64>(
                &env,
                &[ENV_MAX_PAYLOAD_MB, LEGACY_ENV_MAX_PAYLOAD_MB],
            )? {
                Some(mb) => mb,
                None => file
                    .and_then(|c| c.max_payload_mb)
                    .unwrap_or(defaults.max_payload_mb),
            },
        };

        let tunables = Self {
            workers,
            max_payload_mb,
        };
        tunables.validate()?;
        Ok(tunables)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ParcelError::InvalidArgument(
                "worker count must be greater than zero".to_string(),
            ));
        }
        if self.max_payload_mb == 0 {
            return Err(ParcelError::InvalidArgument(
                "maximum payload size must be greater than zero".to_string(),
            ));
        }
        if self.max_payload_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(ParcelError::InvalidArgument(format!(
                "maximum payload size of {} MB is too large",
                self.max_payload_mb
            )));
        }
        Ok(())
    }

    /// Payload budget in bytes
    pub fn max_payload_bytes(&self) -> u64 {
        self.max_payload_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// First of `names` that is set, parsed as `T`
fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    names: &[&str],
) -> Result<Option<T>> {
    let Some((name, raw)) = names.iter().find_map(|name| env(name).map(|raw| (name, raw))) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|_| {
        ParcelError::Config(format!("{} must be a non-negative integer, got '{}'", name, raw))
    })
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TOML_CONFIG: &str = r#"
workers = 4
operation = "move"

[source]
bucket = "media-inbox"
prefix = "source/"

[[destinations]]
file_types = ["mp4", "jpg"]
bucket = "media-archive"
path = "target/"
"#;

    const EVENT_JSON: &str = r#"{
        "s3_copy_config": {
            "source_s3_config": {
                "s3_bucket": "aws-s3-serverless-parallel-copy",
                "s3_path": "source/"
            },
            "target_s3_config": [
                {
                    "file_types": ["zip", "jpg"],
                    "s3_bucket": "aws-s3-serverless-parallel-copy",
                    "s3_path": "target/"
                }
            ]
        }
    }"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_toml() {
        let config = ParcelConfig::from_toml_str(TOML_CONFIG).unwrap();
        assert_eq!(config.source.bucket, "media-inbox");
        assert_eq!(config.source.prefix, "source/");
        assert_eq!(config.destinations[0].file_types, vec!["mp4", "jpg"]);
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.max_payload_mb, None);
        assert_eq!(config.operation, TransferOperation::Move);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_parse_wrapped_event_json() {
        let config = ParcelConfig::from_json_str(EVENT_JSON).unwrap();
        assert_eq!(config.source.bucket, "aws-s3-serverless-parallel-copy");
        assert_eq!(config.destinations[0].path, "target/");
        assert_eq!(config.operation, TransferOperation::Copy);
    }

    #[test]
    fn test_invalid_operation_rejected() {
        let toml = TOML_CONFIG.replace("\"move\"", "\"sync\"");
        assert!(ParcelConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_validation_requires_destinations() {
        let toml = r#"
destinations = []

[source]
bucket = "in"
"#;
        let err = ParcelConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ParcelError::Config(_)));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let config = ParcelConfig::from_toml_str(TOML_CONFIG).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcel.toml");
        config.to_file(&path).unwrap();

        let loaded = ParcelConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_tunables_defaults() {
        let tunables = Tunables::resolve_with(None, None, None, no_env).unwrap();
        assert_eq!(tunables.workers, 2);
        assert_eq!(tunables.max_payload_mb, 1024);
        assert_eq!(tunables.max_payload_bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_tunables_precedence() {
        let config = ParcelConfig::from_toml_str(TOML_CONFIG).unwrap();
        let env: HashMap<&str, &str> = [(ENV_WORKERS, "8"), (ENV_MAX_PAYLOAD_MB, "256")].into();
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());

        let from_file = Tunables::resolve_with(None, None, Some(&config), no_env).unwrap();
        assert_eq!(from_file.workers, 4);
        assert_eq!(from_file.max_payload_mb, 1024);

        let from_env = Tunables::resolve_with(None, None, Some(&config), lookup).unwrap();
        assert_eq!(from_env.workers, 8);
        assert_eq!(from_env.max_payload_mb, 256);

        let explicit = Tunables::resolve_with(Some(3), Some(16), Some(&config), lookup).unwrap();
        assert_eq!(explicit, Tunables { workers: 3, max_payload_mb: 16 });
    }

    #[test]
    fn test_tunables_reject_zero_and_garbage() {
        let err = Tunables::resolve_with(Some(0), None, None, no_env).unwrap_err();
        assert!(matches!(err, ParcelError::InvalidArgument(_)));

        let garbage = |_: &str| Some("lots".to_string());
        let err = Tunables::resolve_with(None, None, None, garbage).unwrap_err();
        assert!(matches!(err, ParcelError::Config(_)));
    }

    #[test]
    fn test_tunables_legacy_env_names() {
        let env: HashMap<&str, &str> = [
            (LEGACY_ENV_WORKERS, "6"),
            (LEGACY_ENV_MAX_PAYLOAD_MB, "512"),
        ]
        .into();
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());
        let tunables = Tunables::resolve_with(None, None, None, lookup).unwrap();
        assert_eq!(tunables, Tunables { workers: 6, max_payload_mb: 512 });

        let both: HashMap<&str, &str> = [(ENV_WORKERS, "3"), (LEGACY_ENV_WORKERS, "6")].into();
        let lookup = |name: &str| both.get(name).map(|v| v.to_string());
        let tunables = Tunables::resolve_with(None, None, None, lookup).unwrap();
        assert_eq!(tunables.workers, 3);
    }

    #[test]
    fn test_s3_settings_validation() {
        let settings = S3Settings {
            access_key: Some("AKIA".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = S3Settings {
            endpoint: Some("http://localhost:9000".to_string()),
            force_path_style: true,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }
}

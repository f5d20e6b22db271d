//! Configuration file support
//!
//! Loads remux configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::batch::TimeRange;
use crate::config::{BatchConfig, LogFormat, LoggingConfig, ReadErrorPolicy, RemuxConfig};
use crate::error::{RemuxError, Result};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Remux settings
    pub remux: Option<RemuxSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Batch settings
    pub batch: Option<BatchSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemuxSettings {
    /// Container short name
    pub output_format: Option<String>,
    /// Pass input timebases to the muxer
    pub preserve_time_base: Option<bool>,
    /// "fail" or "stop"
    pub on_read_error: Option<ReadErrorPolicy>,
    /// Muxer private options
    pub muxer_options: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Maximum concurrent sessions
    pub max_parallel: Option<usize>,
    /// Daily start window, "HH:MM:SS-HH:MM:SS"
    pub timer: Option<TimeRange>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| RemuxError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RemuxError::Config(format!("serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let mut muxer_options = BTreeMap::new();
        muxer_options.insert("movflags".to_string(), "+faststart".to_string());
        Self {
            remux: Some(RemuxSettings {
                output_format: None,
                preserve_time_base: Some(false),
                on_read_error: Some(ReadErrorPolicy::Fail),
                muxer_options: Some(muxer_options),
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some(LogFormat::Pretty),
            }),
            batch: Some(BatchSettings {
                max_parallel: Some(BatchConfig::default().max_parallel),
                timer: None,
            }),
        }
    }

    /// Convert to RemuxConfig, filling unset values with defaults
    pub fn into_remux_config(self) -> RemuxConfig {
        let defaults = RemuxConfig::default();
        let remux = self.remux.unwrap_or_default();
        RemuxConfig {
            output_format: remux.output_format,
            muxer_options: remux.muxer_options.unwrap_or_default(),
            preserve_time_base: remux
                .preserve_time_base
                .unwrap_or(defaults.preserve_time_base),
            read_error_policy: remux
                .on_read_error
                .unwrap_or(defaults.read_error_policy),
            logging: self
                .logging
                .map(|l| LoggingConfig {
                    level: l.level,
                    format: l.format.unwrap_or_default(),
                })
                .unwrap_or(defaults.logging),
            batch: BatchConfig {
                max_parallel: self
                    .batch
                    .as_ref()
                    .and_then(|b| b.max_parallel)
                    .filter(|&n| n > 0)
                    .unwrap_or(defaults.batch.max_parallel),
                window: self.batch.and_then(|b| b.timer),
            },
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}

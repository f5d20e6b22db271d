//! Remux configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::batch::TimeRange;

/// What to do when reading a packet fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    /// Stop reading, finalize the output, then report the error
    #[default]
    Fail,
    /// Treat the failure as end of input
    Stop,
}

impl FromStr for ReadErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(ReadErrorPolicy::Fail),
            "stop" => Ok(ReadErrorPolicy::Stop),
            other => Err(format!("unknown read error policy '{}' (expected fail or stop)", other)),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected pretty or json)", other)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Batch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of sessions running at once
    pub max_parallel: usize,

    /// Daily window outside of which no new job is started
    pub window: Option<TimeRange>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            window: None,
        }
    }
}

/// Remux configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemuxConfig {
    /// Container short name (e.g. "mp4", "matroska"); inferred from the
    /// output path when unset
    pub output_format: Option<String>,

    /// Muxer private options passed when writing the header
    pub muxer_options: BTreeMap<String, String>,

    /// Hand each input stream's timebase to the muxer as a hint
    pub preserve_time_base: bool,

    /// Handling of packet read failures
    pub read_error_policy: ReadErrorPolicy,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Batch configuration
    pub batch: BatchConfig,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            output_format: None,
            muxer_options: BTreeMap::new(),
            preserve_time_base: false,
            read_error_policy: ReadErrorPolicy::Fail,
            logging: LoggingConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl RemuxConfig {
    /// Muxer options as ordered key/value pairs
    pub fn muxer_option_pairs(&self) -> Vec<(String, String)> {
        self.muxer_options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Parse a `KEY=VALUE` muxer option and add it
    pub fn set_muxer_option(&mut self, option: &str) -> Result<(), String> {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| format!("muxer option '{}' is not KEY=VALUE", option))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("muxer option '{}' has an empty key", option));
        }
        self.muxer_options
            .insert(key.to_string(), value.trim().to_string());
        Ok(())
    }
}

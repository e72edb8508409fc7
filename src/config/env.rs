use std::{str::FromStr, time::Duration};

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAiConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_url: Url,
    pub model: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub store_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_name: String,
    pub rotation: LogRotation,
    pub console_ansi: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl FromStr for LogRotation {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub flush_debounce: Duration,
    pub flush_threshold: usize,
    pub throttle_interval: Duration,
    pub viewport_lookahead: f64,
    pub timeline_path: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

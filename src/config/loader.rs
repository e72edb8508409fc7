use std::{env, str::FromStr, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, LogRotation, LoggingConfig, OpenAiConfig,
    PipelineConfig,
};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini-2024-07-18";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url_raw = var("OPENAI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&api_url_raw).map_err(|_| ConfigError::Invalid {
            key: "OPENAI_API_URL",
            value: api_url_raw.clone(),
        })?;

        let openai = OpenAiConfig {
            api_url,
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout: Duration::from_millis(parse_or(&var, "OPENAI_TIMEOUT_MS", 30_000)?),
        };

        let directories = DirectoryConfig {
            logs_dir: var("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
            data_dir: var("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            store_filename: var("STORE_FILENAME").unwrap_or_else(|| "storage.db".to_string()),
        };

        let logging = LoggingConfig {
            level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            file_name: var("LOG_FILE").unwrap_or_else(|| "filter.log".to_string()),
            rotation: parse_or(&var, "LOG_ROTATION", LogRotation::Daily)?,
            console_ansi: parse_or(&var, "LOG_ANSI", true)?,
        };

        let flush_threshold: usize = parse_or(&var, "CACHE_FLUSH_THRESHOLD", 10)?;
        if flush_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "CACHE_FLUSH_THRESHOLD",
                value: "0".to_string(),
            });
        }

        let viewport_lookahead: f64 = parse_or(&var, "VIEWPORT_LOOKAHEAD", 2.0)?;
        if !(viewport_lookahead.is_finite() && viewport_lookahead > 0.0) {
            return Err(ConfigError::Invalid {
                key: "VIEWPORT_LOOKAHEAD",
                value: viewport_lookahead.to_string(),
            });
        }

        let pipeline = PipelineConfig {
            flush_debounce: Duration::from_millis(parse_or(&var, "CACHE_FLUSH_DEBOUNCE_MS", 100)?),
            flush_threshold,
            throttle_interval: Duration::from_millis(parse_or(&var, "PASS_THROTTLE_MS", 50)?),
            viewport_lookahead,
            timeline_path: var("TIMELINE_PATH").unwrap_or_else(|| "/home".to_string()),
        };

        Ok(Self {
            openai,
            directories,
            logging,
            pipeline,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

pub mod env;
mod loader;

pub use env::{
    AppConfig, DirectoryConfig, LogRotation, LoggingConfig, OpenAiConfig, PipelineConfig,
};
pub use loader::load_config;

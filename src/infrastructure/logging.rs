use std::{io, path::Path};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::{AppConfig, LogRotation, LoggingConfig},
    infrastructure::directories::ResolvedPaths,
};

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<WorkerGuard> = OnceCell::new();

// Console output goes to stderr: stdout carries the host protocol.
pub fn init_tracing(config: &AppConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let logging = &config.logging;
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| level_filter(&logging.level));

        let (file_writer, guard) =
            tracing_appender::non_blocking(file_appender(logging, &paths.logs_dir));
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_ansi(logging.console_ansi);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(
            logs = %paths.logs_dir.display(),
            file = %logging.file_name,
            rotation = ?logging.rotation,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_appender(logging: &LoggingConfig, dir: &Path) -> rolling::RollingFileAppender {
    match logging.rotation {
        LogRotation::Hourly => rolling::hourly(dir, &logging.file_name),
        LogRotation::Daily => rolling::daily(dir, &logging.file_name),
        LogRotation::Never => rolling::never(dir, &logging.file_name),
    }
}

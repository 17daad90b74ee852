//! Logger initialisation
//!
//! log4rs is configured from the YAML file named in the config. Without that
//! file the process falls back to env_logger, driven by `RUST_LOG`.

use std::path::Path;

use crate::config::LoggingConfig;

/// Which logger ended up installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerKind {
    Log4rs,
    EnvLogger,
}

pub fn init(config: &LoggingConfig) -> Result<LoggerKind, Box<dyn std::error::Error>> {
    if Path::new(&config.config_file).exists() {
        match log4rs::init_file(&config.config_file, Default::default()) {
            Ok(()) => return Ok(LoggerKind::Log4rs),
            Err(e) => eprintln!("Failed to load {}: {}; falling back to env_logger", config.config_file, e),
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init()?;
    Ok(LoggerKind::EnvLogger)
}

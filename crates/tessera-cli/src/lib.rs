//! Command-line client for Tessera
//!
//! Drives a [`tessera_sync::Session`] over a blob directory and a redb
//! ledger kept under `--data-dir`.

pub mod commands;
pub mod config;
pub mod display;

use std::path::PathBuf;

use tessera_logging::{ConsoleConfig, FileConfig, LogConfig, TesseraSubscriberBuilder, WorkerGuard};

/// Logging setup for one invocation; logs go to stderr.
pub fn init_logging(
    level: &str,
    json: bool,
    log_dir: Option<PathBuf>,
) -> Option<WorkerGuard> {
    let config = LogConfig {
        console: Some(if json {
            ConsoleConfig::default()
        } else {
            ConsoleConfig::pretty()
        }),
        ..LogConfig::default()
    };
    let mut builder = TesseraSubscriberBuilder::new()
        .with_config(config)
        .with_level(level);
    if let Some(dir) = log_dir {
        builder = builder.with_file_output(FileConfig::new(dir));
    }
    builder.init()
}

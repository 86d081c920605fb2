//! Logging setup for Tessera binaries and tests
//!
//! - JSON lines on stderr by default, pretty output for development
//! - Optional JSONL files with daily/hourly rotation (tracing-appender)
//! - [`AccountContextGuard`] tags spans with the account a scope acts for
//!
//! ```ignore
//! use tessera_logging::{LogConfig, TesseraSubscriberBuilder};
//!
//! let _guard = TesseraSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonFormat, LogConfig, LogFormat, RotationStrategy};
pub use context::{AccountContextData, AccountContextGuard};
pub use error::LoggingError;
pub use layers::{AccountContextExtension, AccountContextLayer, account_of, jsonl_layer};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::str::FromStr;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::{Directive, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Builds and installs the global subscriber from a [`LogConfig`].
#[derive(Debug, Default)]
pub struct TesseraSubscriberBuilder {
    config: LogConfig,
}

impl TesseraSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Global level, used when `RUST_LOG` is unset
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Turn console output on (keeping its settings) or off
    pub fn with_console(mut self, enabled: bool) -> Self {
        match (enabled, &self.config.console) {
            (false, _) => self.config.console = None,
            (true, None) => self.config.console = Some(ConsoleConfig::default()),
            (true, Some(_)) => {}
        }
        self
    }

    pub fn with_file_output(mut self, file: FileConfig) -> Self {
        self.config.file = Some(file);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber, reporting failures on stderr.
    ///
    /// Hold the returned guard until exit when file output is enabled;
    /// dropping it flushes and stops the writer thread.
    pub fn init(self) -> Option<WorkerGuard> {
        self.try_init().unwrap_or_else(|e| {
            eprintln!("tessera-logging: {e}");
            None
        })
    }

    /// Install the subscriber; fails if one is already installed.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = self.env_filter()?;
        let mut layers: Vec<BoxedLayer> = vec![AccountContextLayer::new().boxed()];
        layers.extend(self.console_layer()?);

        let guard = match &self.config.file {
            Some(file) => {
                let (writer, guard) = tracing_appender::non_blocking(file_appender(file)?);
                layers.push(jsonl_layer(writer, &self.config.json).boxed());
                Some(guard)
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()?;
        Ok(guard)
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let mut filter = EnvFilter::try_new(&self.config.level).map_err(LoggingError::filter)?;
        for (target, level) in &self.config.targets {
            let directive = format!("{target}={level}")
                .parse::<Directive>()
                .map_err(LoggingError::filter)?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    fn console_layer(&self) -> Result<Option<BoxedLayer>, LoggingError> {
        let Some(console) = &self.config.console else {
            return Ok(None);
        };
        let cap = match &console.max_level {
            Some(level) => LevelFilter::from_str(level).map_err(LoggingError::filter)?,
            None => LevelFilter::TRACE,
        };

        let layer = match console.format {
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(console.ansi)
                .with_writer(std::io::stderr)
                .with_filter(cap)
                .boxed(),
            LogFormat::Json => jsonl_layer(std::io::stderr, &self.config.json)
                .with_filter(cap)
                .boxed(),
        };
        Ok(Some(layer))
    }
}

fn file_appender(file: &FileConfig) -> Result<RollingFileAppender, LoggingError> {
    let rotation = match file.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file.prefix.as_str())
        .filename_suffix("jsonl");
    if let Some(keep) = file.keep {
        builder = builder.max_log_files(keep);
    }
    Ok(builder.build(&file.directory)?)
}

/// Quiet setup for tests; safe to call from every test.
pub fn init_testing() {
    let _ = TesseraSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_level_overrides_preset() {
        let builder = TesseraSubscriberBuilder::new()
            .with_config(LogConfig::development())
            .with_level("trace");
        assert_eq!(builder.config().level, "trace");
        assert_eq!(
            builder.config().console.as_ref().map(|c| c.format),
            Some(LogFormat::Pretty)
        );
    }

    #[test]
    fn test_with_console_toggles() {
        let builder = TesseraSubscriberBuilder::new()
            .with_config(LogConfig::development())
            .with_console(true);
        assert!(builder.config().console.as_ref().unwrap().ansi);

        let builder = builder.with_console(false);
        assert!(builder.config().console.is_none());

        let builder = builder.with_console(true);
        assert_eq!(
            builder.config().console.as_ref().map(|c| c.format),
            Some(LogFormat::Json)
        );
    }

    #[test]
    fn test_invalid_console_level_is_rejected() {
        let mut config = LogConfig::default();
        config.console = Some(ConsoleConfig {
            max_level: Some("loud".into()),
            ..ConsoleConfig::default()
        });
        let builder = TesseraSubscriberBuilder::new().with_config(config);
        assert!(matches!(builder.console_layer(), Err(LoggingError::Filter(_))));
    }

    #[test]
    fn test_disabled_console_adds_no_layer() {
        let builder = TesseraSubscriberBuilder::new().with_console(false);
        assert!(builder.console_layer().unwrap().is_none());
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let file = FileConfig::new(&logs).with_rotation(RotationStrategy::Never);

        file_appender(&file).unwrap();
        assert!(logs.is_dir());
    }
}

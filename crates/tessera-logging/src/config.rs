//! Logging configuration and presets

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How console lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Multi-line, human-readable
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global level; `RUST_LOG` replaces it when set
    pub level: String,
    /// `None` disables console output
    pub console: Option<ConsoleConfig>,
    pub file: Option<FileConfig>,
    pub json: JsonFormat,
    /// Per-target levels, e.g. `tessera_ledger = "warn"`
    pub targets: BTreeMap<String, String>,
}

impl Default for LogConfig {
    /// JSON lines on stderr at `info`
    fn default() -> Self {
        Self {
            level: "info".into(),
            console: Some(ConsoleConfig::default()),
            file: None,
            json: JsonFormat::default(),
            targets: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Pretty, colored console output at `debug`
    pub fn development() -> Self {
        Self {
            level: "debug".into(),
            console: Some(ConsoleConfig::pretty()),
            ..Self::default()
        }
    }

    /// Daily JSONL files under `log_dir`, no console
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: None,
            file: Some(FileConfig {
                keep: Some(30),
                ..FileConfig::new(log_dir)
            }),
            ..Self::default()
        }
    }

    /// Warnings only, plain console output
    pub fn testing() -> Self {
        Self {
            level: "warn".into(),
            console: Some(ConsoleConfig {
                max_level: Some("warn".into()),
                ..ConsoleConfig::default()
            }),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.targets.insert(target.into(), level.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub format: LogFormat,
    pub ansi: bool,
    /// Console-only cap, applied on top of the global level
    pub max_level: Option<String>,
}

impl ConsoleConfig {
    pub fn pretty() -> Self {
        Self {
            format: LogFormat::Pretty,
            ansi: true,
            max_level: None,
        }
    }
}

/// JSONL file output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File names are `{prefix}.{date}.jsonl`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Rotated files to retain; `None` keeps all
    pub keep: Option<usize>,
}

impl FileConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: "tessera".into(),
            rotation: RotationStrategy::Daily,
            keep: Some(7),
        }
    }

    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self::new("./logs")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file, appended to
    Never,
}

/// Fields included in JSON lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFormat {
    /// Event fields at the top level instead of under `fields`
    pub flatten: bool,
    pub span_list: bool,
    pub current_span: bool,
    pub thread_info: bool,
    /// Source file and line
    pub source_location: bool,
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self {
            flatten: true,
            span_list: true,
            current_span: true,
            thread_info: false,
            source_location: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_json_console() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.console.unwrap().format, LogFormat::Json);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_development_is_pretty() {
        let console = LogConfig::development().console.unwrap();
        assert_eq!(console.format, LogFormat::Pretty);
        assert!(console.ansi);
    }

    #[test]
    fn test_production_writes_files_only() {
        let config = LogConfig::production(PathBuf::from("/var/log/tessera"));
        assert!(config.console.is_none());
        let file = config.file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/var/log/tessera"));
        assert_eq!(file.rotation, RotationStrategy::Daily);
        assert_eq!(file.keep, Some(30));
    }

    #[test]
    fn test_target_overrides() {
        let config = LogConfig::testing().with_target("tessera_ledger", "debug");
        assert_eq!(
            config.targets.get("tessera_ledger").map(String::as_str),
            Some("debug")
        );
        assert_eq!(config.level, "warn");
    }
}

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{fs::OpenOptions, path::Path, str::FromStr};
use tracing::Level;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, writer::BoxMakeWriter},
    prelude::*,
    Registry,
};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Plain,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    File,
}

/// Logging settings of a solwatch process.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case", default)]
pub struct LogConfig {
    /// Default level, e.g. "info". `RUST_LOG` directives take precedence when set.
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Required when `output` is `file`. The file is appended to, never truncated.
    pub file_path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            output: LogOutput::Stdout,
            file_path: None,
        }
    }
}

impl LogConfig {
    fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_level(Level::from_str(&self.level).unwrap_or(Level::INFO))
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level_filter().into())
            .from_env_lossy()
    }

    fn writer(&self) -> Result<BoxMakeWriter> {
        match self.output {
            LogOutput::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
            LogOutput::File => {
                let file_path = self
                    .file_path
                    .as_deref()
                    .ok_or_else(|| anyhow!("Log output is 'file' but 'file_path' is not specified"))?;
                let log_file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(Path::new(file_path))
                    .with_context(|| format!("Failed to open log file '{}'", file_path))?;
                Ok(BoxMakeWriter::new(log_file))
            }
        }
    }
}

/// Installs the global tracing subscriber described by `config`.
///
/// # Errors
///
/// Fails when the log file cannot be opened or a global subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let writer = config.writer()?;
    let subscriber = Registry::default().with(config.env_filter());

    let installed = match config.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().with_writer(writer).json())
            .try_init(),
        LogFormat::Plain => subscriber
            .with(fmt::layer().with_writer(writer).with_ansi(config.output == LogOutput::Stdout))
            .try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

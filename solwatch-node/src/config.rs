use anyhow::{Context, Result};
use serde::Deserialize;
use solwatch_connector::config::ConnectorConfig;
use solwatch_logger::LogConfig;

/// The top-level configuration for the solwatch node.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct NodeConfig {
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub node: NodeSpecificConfig,
}

/// Contains settings that are unique to the node binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NodeSpecificConfig {
    /// Directory of the sled database holding the address query times.
    pub db_path: String,
    /// Logging configuration.
    pub log: LogConfig,
}

impl Default for NodeSpecificConfig {
    fn default() -> Self {
        Self {
            db_path: "./solwatch.db".to_string(),
            log: LogConfig::default(),
        }
    }
}

/// Loads the node configuration from a TOML file, overridden by `SOLWATCH__*` variables.
///
/// Nested keys are separated by `__`, e.g. `SOLWATCH__CONNECTOR__SOLANA__NETWORK=devnet`.
pub fn load_config(path: &str) -> Result<NodeConfig> {
    build(Some(path)).context(format!("Failed to build configuration from '{}'", path))
}

/// Loads `path` when given, otherwise starts from the defaults. `SOLWATCH__*` variables
/// apply in both cases.
pub fn load_or_default(path: Option<&str>) -> Result<NodeConfig> {
    // Logging is not installed yet.
    match path {
        Some(path) => {
            println!("Loading configuration from '{}'", path);
            load_config(path)
        }
        None => {
            println!("No config file provided, using default settings.");
            build(None).context("Failed to build configuration from the environment")
        }
    }
}

fn build(path: Option<&str>) -> Result<NodeConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("SOLWATCH")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let settings: NodeConfig = builder
        .build()?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    Ok(settings)
}

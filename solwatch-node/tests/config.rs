use solwatch_connector::rpc::Commitment;
use solwatch_logger::{LogFormat, LogOutput};
use solwatch_node::config::{load_config, load_or_default, NodeConfig};
use std::io::Write;

#[test]
fn test_defaults() {
    let config = NodeConfig::default();

    assert_eq!(config.node.db_path, "./solwatch.db");
    assert_eq!(config.node.log.level, "info");
    assert_eq!(config.connector.solana.chain, "SOL");
    assert_eq!(config.connector.solana.network, "mainnet");
    assert_eq!(config.connector.solana.commitment, Commitment::Confirmed);
    assert_eq!(config.connector.synchronizer.refresh_interval_secs, 60);
    assert_eq!(config.connector.synchronizer.active_window_secs, 3600);
    assert_eq!(config.connector.health.check_interval_secs, 30);
    assert_eq!(config.connector.health.max_reconnect_attempts, 5);
}

#[test]
fn test_load_partial_toml_keeps_defaults() -> anyhow::Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    write!(
        file,
        r#"
[connector.solana]
rpc-url = "https://api.devnet.solana.com"
ws-url = "wss://api.devnet.solana.com"
network = "devnet"
commitment = "finalized"

[connector.health]
max-reconnect-attempts = 3

[node]
db-path = "/var/lib/solwatch"

[node.log]
format = "json"
"#
    )?;
    let path = file.path().to_string_lossy().into_owned();

    let config = load_config(&path)?;

    let solana = &config.connector.solana;
    assert_eq!(solana.rpc_url, "https://api.devnet.solana.com");
    assert_eq!(solana.network, "devnet");
    assert_eq!(solana.chain, "SOL");
    assert_eq!(solana.commitment, Commitment::Finalized);
    assert_eq!(config.connector.health.max_reconnect_attempts, 3);
    assert_eq!(config.connector.health.check_interval_secs, 30);
    assert_eq!(config.connector.worker.call_timeout_secs, 10);
    assert_eq!(config.node.db_path, "/var/lib/solwatch");
    assert_eq!(config.node.log.format, LogFormat::Json);
    assert_eq!(config.node.log.output, LogOutput::Stdout);
    assert_eq!(config.node.log.level, "info");
    Ok(())
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(load_config("/nonexistent/solwatch.toml").is_err());
}

#[test]
fn test_environment_applies_without_config_file() -> anyhow::Result<()> {
    // Matches the network the file-based test loads.
    std::env::set_var("SOLWATCH__CONNECTOR__SOLANA__NETWORK", "devnet");

    let config = load_or_default(None)?;

    assert_eq!(config.connector.solana.network, "devnet");
    assert_eq!(config.connector.solana.chain, "SOL");
    assert_eq!(config.node.db_path, "./solwatch.db");
    Ok(())
}

use solwatch_logger::{init, LogConfig, LogFormat, LogOutput};

#[test]
fn test_file_output_requires_path() {
    let config = LogConfig {
        output: LogOutput::File,
        file_path: None,
        ..LogConfig::default()
    };

    let err = init(&config).unwrap_err();

    assert!(err.to_string().contains("file_path"));
}

#[test]
fn test_json_file_output_appends_events() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("solwatch.log");
    std::fs::write(&path, "previous run\n")?;
    let config = LogConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
        output: LogOutput::File,
        file_path: Some(path.to_string_lossy().into_owned()),
    };

    init(&config)?;
    tracing::info!(address = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU", "Subscribed");

    let contents = std::fs::read_to_string(&path)?;
    assert!(contents.starts_with("previous run\n"));
    let line = contents.lines().nth(1).expect("one event line");
    let event: serde_json::Value = serde_json::from_str(line)?;
    assert_eq!(event["level"], "INFO");
    assert_eq!(event["fields"]["message"], "Subscribed");
    assert_eq!(
        event["fields"]["address"],
        "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
    );

    // A second global subscriber is refused.
    assert!(init(&LogConfig::default()).is_err());
    Ok(())
}

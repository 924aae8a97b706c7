//! Integration tests for logging and configuration

use bridge_traits::time::LogLevel;
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_logging_initializes_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    init_logging(config.clone()).expect("first initialization succeeds");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::LoggingAlreadyInitialized(_))));

    // Logging after initialization must not panic.
    tracing::warn!(track_id = "t-1", "integration test event");
}

#[test]
fn test_config_carries_logging_settings() {
    let config = CoreConfig::builder()
        .logging(LoggingConfig::default().with_format(LogFormat::Json))
        .build()
        .unwrap();

    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(config.logging.redact_pii);
}

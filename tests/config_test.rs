//! 配置加载集成测试
//!
//! 测试从 YAML / JSON 文件加载配置，以及配置与分发器、日志系统的衔接。

use std::fs;

use messengers::{
    error_code, LoggerConfig, MessengerConfig, MessengerError, Messengers, PrimaryMode,
    RotationStrategy,
};
use tempfile::TempDir;

/// 测试从 YAML 文件加载完整配置
#[test]
fn test_load_yaml_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("messengers.yaml");
    fs::write(
        &path,
        r#"
worker:
  thread_name: io-worker
primary:
  mode: thread
  thread_name: ui
logging:
  level: debug
  json_format: true
  rotation: hourly
"#,
    )
    .unwrap();

    let config = MessengerConfig::from_file(&path).unwrap();
    assert_eq!(config.worker.thread_name, "io-worker");
    assert_eq!(config.primary.mode, PrimaryMode::Thread);
    assert_eq!(config.primary.thread_name, "ui");
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
    assert_eq!(config.config_path.as_deref(), Some(path.as_path()));

    let logger = LoggerConfig::from_log_config(&config.logging);
    assert_eq!(logger.rotation, RotationStrategy::Hourly);
    assert!(logger.json_format);
    assert!(logger.file_output.is_none());
}

/// 测试从 JSON 文件加载部分配置，其余字段使用默认值
#[test]
fn test_load_partial_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("messengers.json");
    fs::write(&path, r#"{ "primary": { "thread_name": "host" } }"#).unwrap();

    let config = MessengerConfig::from_file(&path).unwrap();
    assert_eq!(config.primary.thread_name, "host");
    assert_eq!(config.primary.mode, PrimaryMode::Hosted);
    assert_eq!(config.worker.thread_name, "Messengers");
    assert_eq!(config.logging.level, "info");
}

/// 测试文件日志目录随配置传递
#[test]
fn test_file_logging_config() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("logs");
    let path = temp_dir.path().join("messengers.yaml");
    fs::write(
        &path,
        format!(
            "logging:\n  file_output: true\n  log_dir: {}\n  rotation: never\n",
            log_dir.display()
        ),
    )
    .unwrap();

    let config = MessengerConfig::from_file(&path).unwrap();
    let logger = LoggerConfig::from_log_config(&config.logging);
    assert_eq!(logger.file_output.as_deref(), Some(log_dir.as_path()));
    assert_eq!(logger.rotation, RotationStrategy::Never);
}

#[test]
fn test_missing_file_fails_to_load() {
    let temp_dir = TempDir::new().unwrap();
    let err = MessengerConfig::from_file(temp_dir.path().join("absent.yaml")).unwrap_err();

    assert!(matches!(err, MessengerError::ConfigLoadFailed(_)));
    assert_eq!(err.error_code(), error_code::CONFIG_LOAD_FAILED);
}

#[test]
fn test_malformed_files_report_parser_errors() {
    let temp_dir = TempDir::new().unwrap();

    let yaml = temp_dir.path().join("bad.yaml");
    fs::write(&yaml, "worker: [unclosed").unwrap();
    assert!(matches!(
        MessengerConfig::from_file(&yaml),
        Err(MessengerError::Yaml(_))
    ));

    let json = temp_dir.path().join("bad.json");
    fs::write(&json, "{ \"worker\": ").unwrap();
    assert!(matches!(
        MessengerConfig::from_file(&json),
        Err(MessengerError::Json(_))
    ));
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("messengers.yaml");
    fs::write(&path, "primary:\n  mode: thread\n  thread_name: Messengers\n").unwrap();

    let err = MessengerConfig::from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        MessengerError::InvalidConfigValue { ref key, .. } if key == "primary.thread_name"
    ));
    assert_eq!(err.error_code(), error_code::CONFIG_INVALID_VALUE);
}

#[test]
fn test_unknown_mode_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("messengers.yaml");
    fs::write(&path, "primary:\n  mode: fiber\n").unwrap();

    assert!(MessengerConfig::from_file(&path).is_err());
}

/// 分发器创建时同样校验配置，不会启动任何线程
#[test]
fn test_messengers_rejects_invalid_config() {
    let config = MessengerConfig::builder().log_level("verbose").build();
    let err = Messengers::new(&config).unwrap_err();
    assert!(matches!(err, MessengerError::InvalidConfigValue { .. }));
}

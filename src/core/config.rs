//! 消息通知配置
//!
//! 定义工作线程、主上下文和日志的配置结构及加载逻辑。配置文件可以是
//! YAML 或 JSON（按扩展名判断），所有字段都有默认值。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::logger::RotationStrategy;
use crate::utils::{MessengerError, Result};

/// 工作上下文配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 工作线程名称
    #[serde(default = "default_worker_thread_name")]
    pub thread_name: String,
}

fn default_worker_thread_name() -> String {
    "Messengers".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_worker_thread_name(),
        }
    }
}

/// 主上下文运行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryMode {
    /// 由宿主在指定线程（通常是主线程）上驱动 `MainLooper`
    #[default]
    Hosted,
    /// 为主上下文单独启动一个线程（适用于没有 UI 主线程的服务）
    Thread,
}

/// 主上下文配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// 运行方式
    #[serde(default)]
    pub mode: PrimaryMode,

    /// 消息循环名称（`thread` 模式下也是线程名）
    #[serde(default = "default_primary_thread_name")]
    pub thread_name: String,
}

fn default_primary_thread_name() -> String {
    "Messengers-main".to_string()
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            mode: PrimaryMode::default(),
            thread_name: default_primary_thread_name(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_output: false,
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// 消息通知总配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 工作上下文配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 主上下文配置
    #[serde(default)]
    pub primary: PrimaryConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,
}

impl MessengerConfig {
    /// 创建配置构建器
    pub fn builder() -> MessengerConfigBuilder {
        MessengerConfigBuilder::new()
    }

    /// 从文件加载配置并校验
    ///
    /// 扩展名为 `.json` 时按 JSON 解析，其余按 YAML 解析。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MessengerError::ConfigLoadFailed(format!("{}: {}", path.display(), e))
        })?;

        let mut config: MessengerConfig = if path.extension().map(|e| e == "json").unwrap_or(false)
        {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.validate()?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<()> {
        if self.worker.thread_name.trim().is_empty() {
            return Err(invalid("worker.thread_name", "线程名不能为空"));
        }
        if self.primary.thread_name.trim().is_empty() {
            return Err(invalid("primary.thread_name", "线程名不能为空"));
        }
        if self.primary.mode == PrimaryMode::Thread
            && self.primary.thread_name == self.worker.thread_name
        {
            return Err(invalid(
                "primary.thread_name",
                "thread 模式下主线程名不能与工作线程名相同",
            ));
        }
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            return Err(invalid(
                "logging.level",
                &format!("未知的日志级别 '{}'", self.logging.level),
            ));
        }
        if RotationStrategy::parse(&self.logging.rotation).is_none() {
            return Err(invalid(
                "logging.rotation",
                &format!("未知的轮转策略 '{}'", self.logging.rotation),
            ));
        }
        if self.logging.file_output && self.logging.log_dir.is_none() {
            return Err(invalid("logging.log_dir", "启用文件日志时必须指定目录"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> MessengerError {
    MessengerError::InvalidConfigValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct MessengerConfigBuilder {
    config: MessengerConfig,
}

impl MessengerConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置工作线程名称
    pub fn worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker.thread_name = name.into();
        self
    }

    /// 设置主上下文运行方式
    pub fn primary_mode(mut self, mode: PrimaryMode) -> Self {
        self.config.primary.mode = mode;
        self
    }

    /// 设置主上下文名称
    pub fn primary_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.primary.thread_name = name.into();
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 构建配置
    pub fn build(self) -> MessengerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MessengerConfig::default();
        assert_eq!(config.worker.thread_name, "Messengers");
        assert_eq!(config.primary.mode, PrimaryMode::Hosted);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MessengerConfig::builder()
            .worker_thread_name("bg")
            .primary_mode(PrimaryMode::Thread)
            .primary_thread_name("ui")
            .log_level("debug")
            .json_logging()
            .build();

        assert_eq!(config.worker.thread_name, "bg");
        assert_eq!(config.primary.mode, PrimaryMode::Thread);
        assert_eq!(config.primary.thread_name, "ui");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_thread_name() {
        let config = MessengerConfig::builder().worker_thread_name("  ").build();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MessengerError::InvalidConfigValue { ref key, .. } if key == "worker.thread_name"));
    }

    #[test]
    fn test_validate_rejects_same_thread_names() {
        let config = MessengerConfig::builder()
            .worker_thread_name("same")
            .primary_mode(PrimaryMode::Thread)
            .primary_thread_name("same")
            .build();
        assert!(config.validate().is_err());

        // hosted 模式下名称只用于日志，允许相同
        let config = MessengerConfig::builder()
            .worker_thread_name("same")
            .primary_thread_name("same")
            .build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_level_and_rotation() {
        let config = MessengerConfig::builder().log_level("loud").build();
        assert!(config.validate().is_err());

        let mut config = MessengerConfig::default();
        config.logging.rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_file_logging_requires_dir() {
        let mut config = MessengerConfig::default();
        config.logging.file_output = true;
        assert!(config.validate().is_err());

        let config = MessengerConfig::builder().file_logging("/tmp/logs").build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_yaml_roundtrip_keeps_mode() {
        let config = MessengerConfig::builder()
            .primary_mode(PrimaryMode::Thread)
            .log_level("warn")
            .build();

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("mode: thread"));
        let parsed: MessengerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: MessengerConfig = serde_yaml::from_str("worker:\n  thread_name: io\n").unwrap();
        assert_eq!(parsed.worker.thread_name, "io");
        assert_eq!(parsed.primary, PrimaryConfig::default());
        assert_eq!(parsed.logging, LogConfig::default());
    }
}

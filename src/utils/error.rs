//! 消息通知错误类型定义
//!
//! 本模块定义了消息分发、消息循环、配置与日志初始化中使用的所有错误类型。
//! 监听器已被回收、键已过期等情况不属于错误，不会出现在这里。

use thiserror::Error;

use crate::dispatch::listener::Tag;

/// 消息通知核心错误类型
#[derive(Error, Debug)]
pub enum MessengerError {
    // ==================== 分发错误 ====================
    /// 标识为保留值 0
    #[error("消息标识 {0} 为保留值，不能用于发送")]
    ReservedTag(Tag),

    /// 在非所属线程上驱动消息循环
    #[error("消息循环 '{looper}' 只能在其所属线程上驱动")]
    WrongThread {
        /// 消息循环名称
        looper: String,
    },

    /// 消息循环已停止，无法再投递任务
    #[error("消息循环已停止: '{0}'")]
    LooperStopped(String),

    /// 操作需要手动时钟
    #[error("消息循环 '{looper}' 未使用手动时钟，不能手动推进时间")]
    ManualClockRequired {
        /// 消息循环名称
        looper: String,
    },

    // ==================== 配置错误 ====================
    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        /// 配置项
        key: String,
        /// 原因
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================
    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),
}

/// 操作结果类型别名
pub type Result<T> = std::result::Result<T, MessengerError>;

/// 错误码常量
pub mod error_code {
    // 分发错误 (DISPATCH-xxx)
    /// 使用了保留标识
    pub const DISPATCH_RESERVED_TAG: &str = "DISPATCH-001";
    /// 在非所属线程上驱动消息循环
    pub const DISPATCH_WRONG_THREAD: &str = "DISPATCH-002";
    /// 消息循环已停止
    pub const DISPATCH_LOOPER_STOPPED: &str = "DISPATCH-003";
    /// 操作需要手动时钟
    pub const DISPATCH_MANUAL_CLOCK: &str = "DISPATCH-004";

    // 配置错误 (CONFIG-xxx)
    /// 配置加载失败
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    /// 配置值无效
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";

    // 核心错误 (CORE-xxx)
    /// 初始化失败
    pub const CORE_INIT_FAILED: &str = "CORE-001";
    /// IO 错误
    pub const CORE_IO: &str = "CORE-002";
    /// 序列化错误
    pub const CORE_SERIALIZATION: &str = "CORE-003";
}

impl MessengerError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            MessengerError::ReservedTag(_) => error_code::DISPATCH_RESERVED_TAG,
            MessengerError::WrongThread { .. } => error_code::DISPATCH_WRONG_THREAD,
            MessengerError::LooperStopped(_) => error_code::DISPATCH_LOOPER_STOPPED,
            MessengerError::ManualClockRequired { .. } => error_code::DISPATCH_MANUAL_CLOCK,
            MessengerError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            MessengerError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            MessengerError::Io(_) => error_code::CORE_IO,
            MessengerError::Json(_) | MessengerError::Yaml(_) => error_code::CORE_SERIALIZATION,
            MessengerError::InitFailed(_) => error_code::CORE_INIT_FAILED,
        }
    }

    /// 是否为调用方误用（而非运行环境问题）
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            MessengerError::ReservedTag(_)
                | MessengerError::WrongThread { .. }
                | MessengerError::ManualClockRequired { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MessengerError::ReservedTag(0);
        assert!(err.to_string().contains('0'));

        let err = MessengerError::WrongThread {
            looper: "main".to_string(),
        };
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_error_code() {
        let err = MessengerError::ReservedTag(0);
        assert_eq!(err.error_code(), error_code::DISPATCH_RESERVED_TAG);

        let err = MessengerError::LooperStopped("Messengers".to_string());
        assert_eq!(err.error_code(), error_code::DISPATCH_LOOPER_STOPPED);
    }

    #[test]
    fn test_error_codes_are_unique() {
        let codes = [
            error_code::DISPATCH_RESERVED_TAG,
            error_code::DISPATCH_WRONG_THREAD,
            error_code::DISPATCH_LOOPER_STOPPED,
            error_code::DISPATCH_MANUAL_CLOCK,
            error_code::CONFIG_LOAD_FAILED,
            error_code::CONFIG_INVALID_VALUE,
            error_code::CORE_INIT_FAILED,
            error_code::CORE_IO,
            error_code::CORE_SERIALIZATION,
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_caller_misuse() {
        assert!(MessengerError::ReservedTag(0).is_caller_misuse());
        assert!(!MessengerError::LooperStopped("w".into()).is_caller_misuse());
        assert!(!MessengerError::InitFailed("x".into()).is_caller_misuse());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MessengerError = io_err.into();
        assert!(matches!(err, MessengerError::Io(_)));
        assert_eq!(err.error_code(), error_code::CORE_IO);
    }
}

//! 工具模块
//!
//! 包含错误类型、键生成和日志系统。

pub mod error;
pub mod id;
pub mod logger;

// 重导出常用类型
pub use error::{error_code, MessengerError, Result};
pub use id::{next_key, Key, KeyGenerator, RESERVED_KEY};
pub use logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

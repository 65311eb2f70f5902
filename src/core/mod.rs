//! 核心模块
//!
//! 包含配置结构及加载逻辑。

pub mod config;

pub use config::{
    LogConfig, MessengerConfig, MessengerConfigBuilder, PrimaryConfig, PrimaryMode, WorkerConfig,
};

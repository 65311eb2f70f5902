//! # Messengers - 跨线程消息通知
//!
//! 生产者在任意线程发送带标识的消息（可延时、可携带负载），消息在按标识选出的
//! 线程上恰好投递一次给发送时指定的监听器：
//!
//! - **按奇偶路由**: 偶数标识投递到工作线程，奇数标识投递到主上下文
//! - **弱引用监听器**: 只保存监听器的弱引用，监听器释放后消息静默丢弃
//! - **取消**: 按标识和监听器取消尚未投递的消息，或一次性丢弃全部消息
//! - **消息循环**: 独占线程的 `ThreadLooper` 和由宿主驱动的 `MainLooper`
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use messengers::{payload, MessengerConfig, Messengers, Payload, Tag};
//!
//! fn main() -> messengers::Result<()> {
//!     let messengers = Messengers::new(&MessengerConfig::default())?;
//!     let listener = Arc::new(|tag: Tag, _payload: Option<Payload>| {
//!         println!("收到消息 {tag}");
//!     });
//!
//!     messengers.send(3, Duration::from_millis(50), payload(42_u32), &listener)?;
//!
//!     // 在主线程上驱动主上下文
//!     if let Some(main) = messengers.main_looper() {
//!         main.run_for(Duration::from_millis(100))?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `dispatch` - 分发上下文、消息循环和 `Messengers` 入口
//! - `core` - 配置
//! - `utils` - 错误类型、键生成和日志

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod dispatch;
pub mod utils;

// 重导出常用类型，方便使用
pub use dispatch::{
    payload, ContextStatsSnapshot, DispatchContext, Looper, MainLooper, Messengers,
    OnMessageReceive, Payload, Route, Tag, ThreadLooper,
};

pub use utils::logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
pub use utils::{error_code, next_key, Key, MessengerError, Result};

pub use core::config::{LogConfig, MessengerConfig, MessengerConfigBuilder, PrimaryMode};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
